//! The transportable summary of one cluster.

use core::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::{dbscan::Clustering, DimensionRange, InstanceId, PointStore, Result, TdbscanError};

/// A compact summary of one cluster: its weight, its members and their
/// coordinates.
///
/// `instances`, `neighbourhood_sizes` and the rows of `coordinates` are
/// index-aligned. A `HullModel` is never mutated once built; merging and
/// absorbing noise produce new hulls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
pub struct HullModel {
    /// The point mass of the cluster.
    density: u64,
    /// The number of coordinates per member.
    dimensionality: usize,
    /// The instance identifiers of the members.
    instances: Vec<InstanceId>,
    /// The epsilon-neighbourhood size of each member, as seen by the worker
    /// that clustered it.
    neighbourhood_sizes: Vec<u64>,
    /// The coordinates of the members, row-major.
    coordinates: Vec<f64>,
    /// The instances this hull gave up to other hulls while merging, sorted.
    ceded: Vec<InstanceId>,
}

/// The key that puts hulls in canonical order: heavier hulls first, then the
/// hull holding the smaller instance identifiers.
pub type CanonicalKey = (Reverse<u64>, Vec<InstanceId>);

impl HullModel {
    /// Creates a new `HullModel`.
    ///
    /// # Errors
    ///
    /// * If the member arrays are not index-aligned.
    /// * If the dimensionality is zero while there are members.
    pub fn new(
        density: u64,
        dimensionality: usize,
        instances: Vec<InstanceId>,
        neighbourhood_sizes: Vec<u64>,
        coordinates: Vec<f64>,
    ) -> Result<Self> {
        if neighbourhood_sizes.len() != instances.len() {
            return Err(TdbscanError::DataIntegrity(format!(
                "Hull has {} instances but {} neighbourhood sizes",
                instances.len(),
                neighbourhood_sizes.len()
            )));
        }
        if coordinates.len() != instances.len() * dimensionality {
            return Err(TdbscanError::DataIntegrity(format!(
                "Hull has {} coordinates for {} points of dimensionality {dimensionality}",
                coordinates.len(),
                instances.len()
            )));
        }
        if dimensionality == 0 && !instances.is_empty() {
            return Err(TdbscanError::DataIntegrity(
                "Hull members must have at least one dimension".to_string(),
            ));
        }
        Ok(Self {
            density,
            dimensionality,
            instances,
            neighbourhood_sizes,
            coordinates,
            ceded: Vec::new(),
        })
    }

    /// Records instances this hull has already given up to other hulls.
    #[must_use]
    pub fn with_ceded(mut self, mut ceded: Vec<InstanceId>) -> Self {
        ceded.sort_unstable();
        ceded.dedup();
        self.ceded = ceded;
        self
    }

    /// A hull with no members and zero density.
    #[must_use]
    pub const fn empty(dimensionality: usize) -> Self {
        Self {
            density: 0,
            dimensionality,
            instances: Vec::new(),
            neighbourhood_sizes: Vec::new(),
            coordinates: Vec::new(),
            ceded: Vec::new(),
        }
    }

    /// Builds the hull of the points at the given storage indices.
    ///
    /// The density is the number of points and the neighbourhood sizes are
    /// those computed during clustering.
    #[must_use]
    pub fn from_members(store: &PointStore, clustering: &Clustering, indices: &[usize]) -> Self {
        let sizes = clustering.neighbourhood_sizes();
        Self {
            density: indices.len() as u64,
            dimensionality: store.dimensionality(),
            instances: indices.iter().map(|&i| store.instance(i)).collect(),
            neighbourhood_sizes: indices.iter().map(|&i| sizes[i] as u64).collect(),
            coordinates: indices.iter().flat_map(|&i| store.coordinates(i).iter().copied()).collect(),
            ceded: Vec::new(),
        }
    }

    /// The point mass of the cluster.
    #[must_use]
    pub const fn density(&self) -> u64 {
        self.density
    }

    /// The number of members.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.instances.len()
    }

    /// Whether the hull has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// The number of coordinates per member.
    #[must_use]
    pub const fn dimensionality(&self) -> usize {
        self.dimensionality
    }

    /// The instance identifiers of the members.
    #[must_use]
    pub fn instances(&self) -> &[InstanceId] {
        &self.instances
    }

    /// The neighbourhood size of each member.
    #[must_use]
    pub fn neighbourhood_sizes(&self) -> &[u64] {
        &self.neighbourhood_sizes
    }

    /// The flat coordinate buffer.
    #[must_use]
    pub fn flat_coordinates(&self) -> &[f64] {
        &self.coordinates
    }

    /// The coordinates of the `i`-th member.
    #[must_use]
    pub fn coordinates(&self, i: usize) -> &[f64] {
        &self.coordinates[i * self.dimensionality..(i + 1) * self.dimensionality]
    }

    /// Whether the `i`-th member is a core point for `min_points`.
    #[must_use]
    pub fn is_core_member(&self, i: usize, min_points: usize) -> bool {
        self.neighbourhood_sizes[i] >= min_points as u64
    }

    /// Iterates over `(instance, neighbourhood size, coordinates)` triples.
    pub fn members(&self) -> impl Iterator<Item = (InstanceId, u64, &[f64])> + '_ {
        self.instances
            .iter()
            .zip(&self.neighbourhood_sizes)
            .enumerate()
            .map(|(i, (&id, &size))| (id, size, self.coordinates(i)))
    }

    /// The bounding box of the members.
    #[must_use]
    pub fn extent(&self) -> DimensionRange {
        let mut mins = vec![f64::INFINITY; self.dimensionality];
        let mut maxs = vec![f64::NEG_INFINITY; self.dimensionality];
        for (_, _, row) in self.members() {
            for ((lo, hi), &v) in mins.iter_mut().zip(maxs.iter_mut()).zip(row) {
                *lo = lo.min(v);
                *hi = hi.max(v);
            }
        }
        DimensionRange::new(mins, maxs).unwrap_or_else(|e| unreachable!("{e}"))
    }

    /// The instances this hull gave up to other hulls while merging.
    #[must_use]
    pub fn ceded(&self) -> &[InstanceId] {
        &self.ceded
    }

    /// Every instance this hull has held: its members and the instances it
    /// ceded, sorted.
    ///
    /// Losing members to other hulls does not change the lineage.
    #[must_use]
    pub fn lineage(&self) -> Vec<InstanceId> {
        let mut lineage = self.instances.iter().chain(&self.ceded).copied().collect::<Vec<_>>();
        lineage.sort_unstable();
        lineage.dedup();
        lineage
    }

    /// The smallest instance identifier among the members.
    #[must_use]
    pub fn min_instance(&self) -> Option<InstanceId> {
        self.instances.iter().copied().min()
    }

    /// The key of this hull in canonical order.
    #[must_use]
    pub fn canonical_key(&self) -> CanonicalKey {
        let mut instances = self.instances.clone();
        instances.sort_unstable();
        (Reverse(self.density), instances)
    }

    /// Returns a new hull keeping only the members for which `keep` is true.
    ///
    /// The density drops by the number of removed members, and the removed
    /// instances are recorded as ceded.
    #[must_use]
    pub fn retain_members<F: Fn(usize) -> bool>(&self, keep: F) -> Self {
        let (kept, removed): (Vec<_>, Vec<_>) = (0..self.point_count()).partition(|&i| keep(i));
        let mut ceded = self.ceded.clone();
        ceded.extend(removed.iter().map(|&i| self.instances[i]));
        ceded.sort_unstable();
        ceded.dedup();
        Self {
            density: self.density.saturating_sub(removed.len() as u64),
            dimensionality: self.dimensionality,
            instances: kept.iter().map(|&i| self.instances[i]).collect(),
            neighbourhood_sizes: kept.iter().map(|&i| self.neighbourhood_sizes[i]).collect(),
            coordinates: kept.iter().flat_map(|&i| self.coordinates(i).iter().copied()).collect(),
            ceded,
        }
    }

    /// Returns a new hull with the given noise points appended as members.
    ///
    /// The density grows by the number of added points.
    ///
    /// # Errors
    ///
    /// * If a point does not have the dimensionality of the hull.
    pub fn with_members(&self, points: &[NoisePoint]) -> Result<Self> {
        let mut hull = self.clone();
        for p in points {
            if p.coordinates.len() != self.dimensionality {
                return Err(TdbscanError::DataIntegrity(format!(
                    "Cannot add {}-dimensional instance {} to a {}-dimensional hull",
                    p.coordinates.len(),
                    p.instance,
                    self.dimensionality
                )));
            }
            hull.instances.push(p.instance);
            hull.neighbourhood_sizes.push(p.neighbourhood_size);
            hull.coordinates.extend_from_slice(&p.coordinates);
        }
        hull.density += points.len() as u64;
        Ok(hull)
    }
}

/// A point left unclustered by its worker, forwarded up the tree so that an
/// ancestor can attach it to a hull.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoisePoint {
    /// The instance identifier.
    pub instance: InstanceId,
    /// The epsilon-neighbourhood size seen by the owning worker.
    pub neighbourhood_size: u64,
    /// The coordinates.
    pub coordinates: Vec<f64>,
}

/// Builds one hull per local cluster, in cluster-identifier order.
#[must_use]
pub fn build_hulls(store: &PointStore, clustering: &Clustering) -> Vec<HullModel> {
    clustering
        .partition()
        .members()
        .values()
        .map(|indices| HullModel::from_members(store, clustering, indices))
        .collect()
}

/// Collects the noise points of a local clustering.
#[must_use]
pub fn noise_points(store: &PointStore, clustering: &Clustering) -> Vec<NoisePoint> {
    let sizes = clustering.neighbourhood_sizes();
    clustering
        .partition()
        .labels()
        .iter()
        .enumerate()
        .filter(|(_, l)| l.is_noise())
        .map(|(i, _)| NoisePoint {
            instance: store.instance(i),
            neighbourhood_size: sizes[i] as u64,
            coordinates: store.coordinates(i).to_vec(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::{dbscan::LocalDensityClusterer, Point, PointStore};

    use super::{build_hulls, noise_points, HullModel, NoisePoint};

    fn store() -> PointStore {
        PointStore::new(
            2,
            vec![
                Point::new(1, vec![0.0, 0.0]),
                Point::new(2, vec![0.0, 1.0]),
                Point::new(3, vec![5.0, 5.0]),
                Point::new(4, vec![5.0, 5.5]),
                Point::new(5, vec![20.0, 20.0]),
            ],
        )
        .unwrap_or_else(|e| unreachable!("{e}"))
    }

    #[test]
    fn hulls_from_clustering() -> Result<(), String> {
        let store = store();
        let clustering = LocalDensityClusterer::new(1.5, 2).map_err(|e| e.to_string())?.cluster(&store);
        let hulls = build_hulls(&store, &clustering);
        assert_eq!(hulls.len(), 2);
        assert_eq!(hulls[0].instances(), &[1, 2]);
        assert_eq!(hulls[0].density(), 2);
        assert_eq!(hulls[0].neighbourhood_sizes(), &[2, 2]);
        assert_eq!(hulls[1].coordinates(1), &[5.0, 5.5]);

        let extent = hulls[1].extent();
        assert_eq!(extent.mins(), &[5.0, 5.0]);
        assert_eq!(extent.maxs(), &[5.0, 5.5]);

        let noise = noise_points(&store, &clustering);
        assert_eq!(noise.len(), 1);
        assert_eq!(noise[0].instance, 5);
        assert_eq!(noise[0].neighbourhood_size, 1);
        Ok(())
    }

    #[test]
    fn invariants_are_checked() {
        assert!(HullModel::new(2, 2, vec![1, 2], vec![2], vec![0.0; 4]).is_err());
        assert!(HullModel::new(2, 2, vec![1, 2], vec![2, 2], vec![0.0; 3]).is_err());
        assert!(HullModel::new(1, 0, vec![1], vec![1], Vec::new()).is_err());
        assert!(HullModel::new(0, 0, Vec::new(), Vec::new(), Vec::new()).is_ok());
        assert_eq!(HullModel::empty(3).density(), 0);
    }

    #[test]
    fn retain_and_extend_build_new_hulls() -> Result<(), String> {
        let hull = HullModel::new(3, 1, vec![7, 8, 9], vec![3, 2, 3], vec![0.0, 1.0, 2.0]).map_err(|e| e.to_string())?;
        let smaller = hull.retain_members(|i| i != 1);
        assert_eq!(smaller.instances(), &[7, 9]);
        assert_eq!(smaller.density(), 2);
        assert_eq!(smaller.ceded(), &[8]);
        assert_eq!(smaller.lineage(), hull.lineage());
        assert_eq!(hull.density(), 3);

        let bigger = smaller
            .with_members(&[NoisePoint {
                instance: 11,
                neighbourhood_size: 1,
                coordinates: vec![2.5],
            }])
            .map_err(|e| e.to_string())?;
        assert_eq!(bigger.instances(), &[7, 9, 11]);
        assert_eq!(bigger.density(), 3);
        assert!(bigger.is_core_member(0, 3));
        assert!(!bigger.is_core_member(2, 3));

        let bad = NoisePoint {
            instance: 12,
            neighbourhood_size: 1,
            coordinates: vec![1.0, 1.0],
        };
        assert!(smaller.with_members(&[bad]).is_err());
        Ok(())
    }
}
