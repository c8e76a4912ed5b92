//! Per-dimension value ranges, reduced over the tree before clustering.

use serde::{Deserialize, Serialize};

use crate::{PointStore, Result, TdbscanError};

/// The per-dimension minimum and maximum of a set of points.
///
/// The range of no points is `(+inf, -inf)` in every dimension, which is
/// the identity of [`DimensionRange::merge`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionRange {
    /// The minimum value in each dimension.
    mins: Vec<f64>,
    /// The maximum value in each dimension.
    maxs: Vec<f64>,
}

impl DimensionRange {
    /// Creates a new range.
    ///
    /// # Errors
    ///
    /// * If `mins` and `maxs` have different lengths.
    pub fn new(mins: Vec<f64>, maxs: Vec<f64>) -> Result<Self> {
        if mins.len() == maxs.len() {
            Ok(Self { mins, maxs })
        } else {
            Err(TdbscanError::Codec(format!(
                "Range has {} minimums but {} maximums",
                mins.len(),
                maxs.len()
            )))
        }
    }

    /// The range of an empty set of points.
    #[must_use]
    pub fn empty(dimensionality: usize) -> Self {
        Self {
            mins: vec![f64::INFINITY; dimensionality],
            maxs: vec![f64::NEG_INFINITY; dimensionality],
        }
    }

    /// The range of the points in a store.
    #[must_use]
    pub fn of(store: &PointStore) -> Self {
        store
            .iter()
            .fold(Self::empty(store.dimensionality()), |mut range, (_, row)| {
                for ((lo, hi), &v) in range.mins.iter_mut().zip(range.maxs.iter_mut()).zip(row) {
                    *lo = lo.min(v);
                    *hi = hi.max(v);
                }
                range
            })
    }

    /// The number of dimensions.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.mins.len()
    }

    /// The minimum value in each dimension.
    #[must_use]
    pub fn mins(&self) -> &[f64] {
        &self.mins
    }

    /// The maximum value in each dimension.
    #[must_use]
    pub fn maxs(&self) -> &[f64] {
        &self.maxs
    }

    /// Whether no point has contributed to the range.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mins.iter().zip(&self.maxs).all(|(lo, hi)| lo > hi)
    }

    /// Element-wise minimum of the minimums and maximum of the maximums.
    ///
    /// # Errors
    ///
    /// * If the ranges have different dimensionalities.
    pub fn merge(&self, other: &Self) -> Result<Self> {
        if self.dimensionality() != other.dimensionality() {
            return Err(TdbscanError::DataIntegrity(format!(
                "Cannot merge a {}-dimensional range with a {}-dimensional range",
                self.dimensionality(),
                other.dimensionality()
            )));
        }
        let mins = self.mins.iter().zip(&other.mins).map(|(a, b)| a.min(*b)).collect();
        let maxs = self.maxs.iter().zip(&other.maxs).map(|(a, b)| a.max(*b)).collect();
        Ok(Self { mins, maxs })
    }

    /// Rescales one point into `[0, 1]` in every dimension.
    ///
    /// Dimensions with no spread (or no points) map to zero.
    #[must_use]
    pub fn normalize(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mins.iter().zip(&self.maxs))
            .map(|(&v, (&lo, &hi))| {
                let spread = hi - lo;
                if spread.is_finite() && spread > 0.0 {
                    (v - lo) / spread
                } else {
                    0.0
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    use crate::{Point, PointStore};

    use super::DimensionRange;

    #[test]
    fn merge_is_elementwise() -> Result<(), String> {
        let a = DimensionRange::new(vec![0.0, 5.0], vec![1.0, 9.0]).map_err(|e| e.to_string())?;
        let b = DimensionRange::new(vec![-1.0, 6.0], vec![0.5, 12.0]).map_err(|e| e.to_string())?;
        let merged = a.merge(&b).map_err(|e| e.to_string())?;
        assert_eq!(merged.mins(), &[-1.0, 5.0]);
        assert_eq!(merged.maxs(), &[1.0, 12.0]);
        assert_eq!(merged, b.merge(&a).map_err(|e| e.to_string())?);
        Ok(())
    }

    #[test]
    fn empty_is_identity() -> Result<(), String> {
        let a = DimensionRange::new(vec![0.0, 5.0], vec![1.0, 9.0]).map_err(|e| e.to_string())?;
        let empty = DimensionRange::empty(2);
        assert!(empty.is_empty());
        assert!(!a.is_empty());
        assert_eq!(a.merge(&empty).map_err(|e| e.to_string())?, a);
        assert!(a.merge(&DimensionRange::empty(3)).is_err());
        Ok(())
    }

    #[test]
    fn of_store() -> Result<(), String> {
        let store = PointStore::new(
            2,
            vec![Point::new(0, vec![3.0, -1.0]), Point::new(1, vec![1.0, 4.0])],
        )
        .map_err(|e| e.to_string())?;
        let range = DimensionRange::of(&store);
        assert_eq!(range.mins(), &[1.0, -1.0]);
        assert_eq!(range.maxs(), &[3.0, 4.0]);

        let empty = DimensionRange::of(&PointStore::empty(2));
        assert!(empty.is_empty());
        Ok(())
    }

    #[test]
    fn normalize_degenerate_dimension() -> Result<(), String> {
        let range = DimensionRange::new(vec![2.0, 0.0], vec![2.0, 4.0]).map_err(|e| e.to_string())?;
        let row = range.normalize(&[2.0, 1.0]);
        assert!(approx_eq!(f64, row[0], 0.0));
        assert!(approx_eq!(f64, row[1], 0.25));

        let row = DimensionRange::empty(2).normalize(&[7.0, 8.0]);
        assert_eq!(row, vec![0.0, 0.0]);
        Ok(())
    }
}
