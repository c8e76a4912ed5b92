//! Nearest-core-member matching of points against a set of hulls.

use crate::{utils::euclidean, HullModel};

/// The core members of one hull and their bounding box grown by `epsilon`.
#[derive(Debug, Clone)]
struct CoreMembers {
    /// The number of coordinates per member.
    dimensionality: usize,
    /// The coordinates of the core members, row-major.
    coordinates: Vec<f64>,
    /// Lower corner of the grown bounding box.
    lower: Vec<f64>,
    /// Upper corner of the grown bounding box.
    upper: Vec<f64>,
}

impl CoreMembers {
    fn new(hull: &HullModel, epsilon: f64, min_points: usize) -> Self {
        let dimensionality = hull.dimensionality();
        let coordinates = (0..hull.point_count())
            .filter(|&i| hull.is_core_member(i, min_points))
            .flat_map(|i| hull.coordinates(i).iter().copied())
            .collect::<Vec<_>>();

        let mut lower = vec![f64::INFINITY; dimensionality];
        let mut upper = vec![f64::NEG_INFINITY; dimensionality];
        for row in coordinates.chunks_exact(dimensionality.max(1)) {
            for ((lo, hi), &v) in lower.iter_mut().zip(upper.iter_mut()).zip(row) {
                *lo = lo.min(v - epsilon);
                *hi = hi.max(v + epsilon);
            }
        }

        Self {
            dimensionality,
            coordinates,
            lower,
            upper,
        }
    }

    /// Whether `point` lies inside the grown bounding box.
    fn may_contain(&self, point: &[f64]) -> bool {
        !self.coordinates.is_empty()
            && point.len() == self.dimensionality
            && point
                .iter()
                .zip(self.lower.iter().zip(&self.upper))
                .all(|(&v, (&lo, &hi))| lo <= v && v <= hi)
    }

    /// The distance to the nearest core member, if it is within `epsilon`.
    fn nearest(&self, point: &[f64], epsilon: f64) -> Option<f64> {
        if !self.may_contain(point) {
            return None;
        }
        self.coordinates
            .chunks_exact(self.dimensionality)
            .map(|row| euclidean(point, row))
            .filter(|&d| d <= epsilon)
            .min_by(f64::total_cmp)
    }
}

/// Matches points against the core members of a list of hulls.
///
/// A hull matches a point when one of its core members lies within
/// `epsilon`; the closest such member scores the hull. The best match is the
/// hull with the smallest score, ties going to the hull listed first.
#[derive(Debug, Clone)]
pub struct HullMatcher {
    /// The density radius.
    epsilon: f64,
    /// One entry per hull, in the order they were given.
    hulls: Vec<CoreMembers>,
}

impl HullMatcher {
    /// Indexes the core members of the given hulls.
    #[must_use]
    pub fn new(hulls: &[HullModel], epsilon: f64, min_points: usize) -> Self {
        Self {
            epsilon,
            hulls: hulls.iter().map(|h| CoreMembers::new(h, epsilon, min_points)).collect(),
        }
    }

    /// The number of indexed hulls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hulls.len()
    }

    /// Whether no hulls are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hulls.is_empty()
    }

    /// The position of the best matching hull and its score.
    #[must_use]
    pub fn best_match(&self, point: &[f64]) -> Option<(usize, f64)> {
        self.hulls
            .iter()
            .enumerate()
            .filter_map(|(i, h)| h.nearest(point, self.epsilon).map(|d| (i, d)))
            .min_by(|&(ia, da), &(ib, db)| da.total_cmp(&db).then(ia.cmp(&ib)))
    }
}
