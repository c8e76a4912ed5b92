//! The points owned by one worker.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{DimensionRange, Result, TdbscanError};

/// The identifier of a point, unique across all workers of a run.
pub type InstanceId = i64;

/// A feature vector and its instance identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// The instance identifier.
    pub instance: InstanceId,
    /// The coordinates.
    pub coordinates: Vec<f64>,
}

impl Point {
    /// Creates a new `Point`.
    #[must_use]
    pub const fn new(instance: InstanceId, coordinates: Vec<f64>) -> Self {
        Self { instance, coordinates }
    }
}

/// The points held by one worker.
///
/// The coordinates are stored as one flat, row-major vector that is
/// index-aligned with the instance identifiers. A `PointStore` is immutable
/// once built; normalization produces a new store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointStore {
    /// The number of coordinates of every point.
    dimensionality: usize,
    /// The instance identifiers.
    instances: Vec<InstanceId>,
    /// The coordinates, `dimensionality` values per point.
    coordinates: Vec<f64>,
}

impl PointStore {
    /// Creates a new `PointStore`.
    ///
    /// # Errors
    ///
    /// * If `dimensionality` is zero.
    /// * If a point does not have `dimensionality` coordinates.
    /// * If a coordinate is not finite.
    /// * If two points share an instance identifier.
    pub fn new(dimensionality: usize, points: Vec<Point>) -> Result<Self> {
        let mut instances = Vec::with_capacity(points.len());
        let mut coordinates = Vec::with_capacity(points.len() * dimensionality);
        for p in points {
            if p.coordinates.len() != dimensionality {
                return Err(TdbscanError::DataIntegrity(format!(
                    "Instance {} has {} coordinates, expected {dimensionality}",
                    p.instance,
                    p.coordinates.len()
                )));
            }
            instances.push(p.instance);
            coordinates.extend(p.coordinates);
        }
        Self::from_flat(dimensionality, instances, coordinates)
    }

    /// Creates a new `PointStore` from already flattened coordinates.
    ///
    /// # Errors
    ///
    /// See [`PointStore::new`].
    pub fn from_flat(dimensionality: usize, instances: Vec<InstanceId>, coordinates: Vec<f64>) -> Result<Self> {
        if dimensionality == 0 {
            return Err(TdbscanError::DataIntegrity(
                "Points must have at least one dimension".to_string(),
            ));
        }
        if coordinates.len() != instances.len() * dimensionality {
            return Err(TdbscanError::DataIntegrity(format!(
                "{} coordinates do not fit {} points of dimensionality {dimensionality}",
                coordinates.len(),
                instances.len()
            )));
        }
        if let Some(i) = coordinates.iter().position(|c| !c.is_finite()) {
            return Err(TdbscanError::DataIntegrity(format!(
                "Instance {} has a non-finite coordinate",
                instances[i / dimensionality]
            )));
        }

        let mut seen = HashSet::with_capacity(instances.len());
        if let Some(&dup) = instances.iter().find(|&&id| !seen.insert(id)) {
            return Err(TdbscanError::DataIntegrity(format!(
                "Instance identifier {dup} appears more than once"
            )));
        }

        Ok(Self {
            dimensionality,
            instances,
            coordinates,
        })
    }

    /// Creates an empty `PointStore`.
    #[must_use]
    pub const fn empty(dimensionality: usize) -> Self {
        Self {
            dimensionality,
            instances: Vec::new(),
            coordinates: Vec::new(),
        }
    }

    /// The number of points.
    #[must_use]
    pub fn cardinality(&self) -> usize {
        self.instances.len()
    }

    /// Whether there are no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// The number of coordinates of every point.
    #[must_use]
    pub const fn dimensionality(&self) -> usize {
        self.dimensionality
    }

    /// The instance identifiers, in storage order.
    #[must_use]
    pub fn instances(&self) -> &[InstanceId] {
        &self.instances
    }

    /// The instance identifier of the `i`-th point.
    #[must_use]
    pub fn instance(&self, i: usize) -> InstanceId {
        self.instances[i]
    }

    /// The coordinates of the `i`-th point.
    #[must_use]
    pub fn coordinates(&self, i: usize) -> &[f64] {
        &self.coordinates[i * self.dimensionality..(i + 1) * self.dimensionality]
    }

    /// The flat coordinate buffer.
    #[must_use]
    pub fn flat_coordinates(&self) -> &[f64] {
        &self.coordinates
    }

    /// Iterates over `(instance, coordinates)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, &[f64])> + '_ {
        self.instances
            .iter()
            .copied()
            .zip(self.coordinates.chunks_exact(self.dimensionality))
    }

    /// The per-dimension minimum and maximum of the points.
    #[must_use]
    pub fn range(&self) -> DimensionRange {
        DimensionRange::of(self)
    }

    /// Returns a new store with every coordinate rescaled into `[0, 1]` by
    /// the given range.
    ///
    /// # Errors
    ///
    /// * If the range does not have the dimensionality of the points.
    pub fn normalized(&self, range: &DimensionRange) -> Result<Self> {
        if range.dimensionality() != self.dimensionality {
            return Err(TdbscanError::DataIntegrity(format!(
                "Cannot normalize {}-dimensional points with a {}-dimensional range",
                self.dimensionality,
                range.dimensionality()
            )));
        }
        let coordinates = self
            .coordinates
            .chunks_exact(self.dimensionality)
            .flat_map(|row| range.normalize(row))
            .collect();
        Ok(Self {
            dimensionality: self.dimensionality,
            instances: self.instances.clone(),
            coordinates,
        })
    }

    /// Reads a `PointStore` from a `.csv` file.
    ///
    /// Every record holds the instance identifier followed by the
    /// coordinates.
    ///
    /// # Arguments
    ///
    /// - `path`: The path to the `.csv` file.
    /// - `has_headers`: Whether to treat the first row as headers.
    /// - `dimensionality`: The expected dimensionality. When `None`, it is
    ///   inferred from the headers or from the first record.
    ///
    /// # Errors
    ///
    /// * If the file cannot be read.
    /// * If a field cannot be parsed.
    /// * If the dimensionality cannot be determined or is inconsistent.
    /// * If the points violate the invariants of [`PointStore::new`].
    pub fn read_csv<P: AsRef<std::path::Path>>(
        path: P,
        has_headers: bool,
        dimensionality: Option<usize>,
    ) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(has_headers)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let mut dimensionality = dimensionality;
        if dimensionality.is_none() && has_headers {
            let width = reader.headers()?.len();
            if width > 1 {
                dimensionality = Some(width - 1);
            }
        }

        let points = reader
            .records()
            .map(|record| {
                let record = record?;
                let mut fields = record.iter();
                let instance = fields
                    .next()
                    .ok_or_else(|| TdbscanError::DataIntegrity("Empty record in csv".to_string()))?
                    .parse::<InstanceId>()
                    .map_err(|e| TdbscanError::DataIntegrity(format!("Bad instance identifier: {e}")))?;
                let coordinates = fields
                    .map(|field| {
                        field
                            .parse::<f64>()
                            .map_err(|e| TdbscanError::DataIntegrity(format!("Bad coordinate {field:?}: {e}")))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Point::new(instance, coordinates))
            })
            .collect::<Result<Vec<_>>>()?;

        let dimensionality = dimensionality
            .or_else(|| points.first().map(|p| p.coordinates.len()))
            .ok_or_else(|| TdbscanError::DataIntegrity("Cannot infer dimensionality of an empty csv".to_string()))?;
        Self::new(dimensionality, points)
    }

    /// Writes the points to a `.csv` file in the format read by
    /// [`PointStore::read_csv`], without headers.
    ///
    /// # Errors
    ///
    /// * If the file cannot be created or written.
    pub fn write_csv<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
        for (instance, coordinates) in self.iter() {
            let record = core::iter::once(instance.to_string()).chain(coordinates.iter().map(f64::to_string));
            writer.write_record(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{DimensionRange, TdbscanError};

    use super::{Point, PointStore};

    fn sample() -> Vec<Point> {
        vec![
            Point::new(10, vec![0.0, 2.0]),
            Point::new(11, vec![4.0, 6.0]),
            Point::new(12, vec![2.0, 4.0]),
        ]
    }

    #[test]
    fn creation() -> Result<(), String> {
        let store = PointStore::new(2, sample()).map_err(|e| e.to_string())?;
        assert_eq!(store.cardinality(), 3);
        assert_eq!(store.dimensionality(), 2);
        assert_eq!(store.instance(1), 11);
        assert_eq!(store.coordinates(2), &[2.0, 4.0]);
        assert_eq!(store.iter().count(), 3);
        Ok(())
    }

    #[test]
    fn duplicate_instances_are_fatal() {
        let mut points = sample();
        points.push(Point::new(11, vec![1.0, 1.0]));
        assert!(matches!(
            PointStore::new(2, points),
            Err(TdbscanError::DataIntegrity(_))
        ));
    }

    #[test]
    fn wrong_dimensionality() {
        let mut points = sample();
        points.push(Point::new(13, vec![1.0]));
        assert!(PointStore::new(2, points).is_err());
        assert!(PointStore::new(0, Vec::new()).is_err());
    }

    #[test]
    fn normalization() -> Result<(), String> {
        let store = PointStore::new(2, sample()).map_err(|e| e.to_string())?;
        let range = store.range();
        let normalized = store.normalized(&range).map_err(|e| e.to_string())?;
        assert_eq!(normalized.coordinates(0), &[0.0, 0.0]);
        assert_eq!(normalized.coordinates(1), &[1.0, 1.0]);
        assert_eq!(normalized.coordinates(2), &[0.5, 0.5]);
        assert_eq!(normalized.instances(), store.instances());

        let wrong = DimensionRange::empty(3);
        assert!(store.normalized(&wrong).is_err());
        Ok(())
    }

    #[test]
    fn csv_io() -> Result<(), String> {
        let store = PointStore::new(2, sample()).map_err(|e| e.to_string())?;
        let tmp_dir = tempdir::TempDir::new("points").map_err(|e| e.to_string())?;
        let path = tmp_dir.path().join("worker-0.csv");
        store.write_csv(&path).map_err(|e| e.to_string())?;

        let read = PointStore::read_csv(&path, false, None).map_err(|e| e.to_string())?;
        assert_eq!(read, store);

        let read = PointStore::read_csv(&path, false, Some(3));
        assert!(read.is_err());
        Ok(())
    }
}
