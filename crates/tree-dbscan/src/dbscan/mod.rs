//! Local DBSCAN clustering of the points held by one worker.
//!
//! A point is a core point when at least `min_points` points, itself
//! included, lie within `epsilon` of it. Core points within `epsilon` of each
//! other share a cluster. A non-core point within `epsilon` of some core
//! point is a border point and joins the cluster of its nearest core
//! neighbour, ties going to the neighbour stored first. Everything else is
//! noise.
//!
//! Clusters are numbered from 1, in order of their first core point, so the
//! result depends only on the points, their order and the parameters.

mod partition;
pub(crate) mod sweep;

use std::collections::HashMap;

use rayon::prelude::*;

pub use partition::{ClusterLabel, Partition};
use sweep::SweepIndex;

use crate::{ClusteringConfig, PointStore, Result, TdbscanError};

/// Runs DBSCAN over the points of one worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalDensityClusterer {
    /// The density radius.
    epsilon: f64,
    /// The core-point threshold, the point itself included.
    min_points: usize,
}

impl LocalDensityClusterer {
    /// Creates a new clusterer.
    ///
    /// # Errors
    ///
    /// * If `epsilon` is not positive and finite, or `min_points` is zero.
    pub fn new(epsilon: f64, min_points: usize) -> Result<Self> {
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(TdbscanError::Config(format!("Invalid epsilon {epsilon}")));
        }
        if min_points == 0 {
            return Err(TdbscanError::Config("min_points must be at least 1".to_string()));
        }
        Ok(Self { epsilon, min_points })
    }

    /// Creates a clusterer with the parameters of a configuration.
    ///
    /// # Errors
    ///
    /// See [`LocalDensityClusterer::new`].
    pub fn from_config(config: &ClusteringConfig) -> Result<Self> {
        Self::new(config.epsilon, config.min_points)
    }

    /// The density radius.
    #[must_use]
    pub const fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// The core-point threshold.
    #[must_use]
    pub const fn min_points(&self) -> usize {
        self.min_points
    }

    /// Clusters the points.
    ///
    /// Fewer points than `min_points`, and in particular no points at all,
    /// yield an all-noise result.
    #[must_use]
    pub fn cluster(&self, store: &PointStore) -> Clustering {
        let n = store.cardinality();
        if n < self.min_points {
            ftlog::debug!(
                "Only {n} points for min_points = {}; everything is noise.",
                self.min_points
            );
            return Clustering {
                partition: Partition::new(store.instances().to_vec(), vec![ClusterLabel::Noise; n])
                    .unwrap_or_else(|e| unreachable!("{e}")),
                neighbourhood_sizes: self.neighbourhood_sizes(store),
                core: vec![false; n],
                num_clusters: 0,
            };
        }

        let coordinates = store.flat_coordinates();
        let index = &SweepIndex::new(coordinates, store.dimensionality());
        let epsilon = self.epsilon;
        let neighbours = move |i: usize| index.within(coordinates, store.coordinates(i), epsilon);

        let neighbourhood_sizes = (0..n).into_par_iter().map(|i| neighbours(i).count()).collect::<Vec<_>>();
        let core = neighbourhood_sizes
            .iter()
            .map(|&size| size >= self.min_points)
            .collect::<Vec<_>>();

        // Edges between core points, each listed once from its lower end.
        let core_edges = (0..n)
            .into_par_iter()
            .map(|i| {
                if core[i] {
                    neighbours(i).filter(|&(j, _)| j > i && core[j]).map(|(j, _)| j).collect()
                } else {
                    Vec::new()
                }
            })
            .collect::<Vec<Vec<_>>>();

        let mut components = DisjointSet::new(n);
        for (i, js) in core_edges.iter().enumerate() {
            for &j in js {
                components.union(i, j);
            }
        }

        let mut labels = vec![ClusterLabel::Noise; n];
        let mut ids = HashMap::new();
        for i in (0..n).filter(|&i| core[i]) {
            let root = components.find(i);
            let next = ids.len() + 1;
            let id = *ids.entry(root).or_insert(next);
            labels[i] = ClusterLabel::Cluster(id);
        }

        // Nearest core neighbour of each non-core point.
        let borders = (0..n)
            .into_par_iter()
            .map(|i| {
                if core[i] {
                    None
                } else {
                    neighbours(i)
                        .filter(|&(j, _)| core[j])
                        .min_by(|&(ja, da), &(jb, db)| da.total_cmp(&db).then(ja.cmp(&jb)))
                        .map(|(j, _)| j)
                }
            })
            .collect::<Vec<_>>();
        for (i, nearest) in borders.into_iter().enumerate() {
            if let Some(j) = nearest {
                labels[i] = labels[j];
            }
        }

        let num_clusters = ids.len();
        ftlog::debug!(
            "Clustered {n} points into {num_clusters} clusters with {} core points.",
            core.iter().filter(|&&c| c).count()
        );

        Clustering {
            partition: Partition::new(store.instances().to_vec(), labels).unwrap_or_else(|e| unreachable!("{e}")),
            neighbourhood_sizes,
            core,
            num_clusters,
        }
    }

    /// The number of points within `epsilon` of each point, itself included.
    fn neighbourhood_sizes(&self, store: &PointStore) -> Vec<usize> {
        let coordinates = store.flat_coordinates();
        let index = SweepIndex::new(coordinates, store.dimensionality());
        (0..store.cardinality())
            .into_par_iter()
            .map(|i| index.within(coordinates, store.coordinates(i), self.epsilon).count())
            .collect()
    }
}

/// The result of clustering the points of one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clustering {
    /// The label of every point.
    partition: Partition,
    /// The epsilon-neighbourhood size of every point, itself included.
    neighbourhood_sizes: Vec<usize>,
    /// Whether each point is a core point.
    core: Vec<bool>,
    /// The number of clusters found.
    num_clusters: usize,
}

impl Clustering {
    /// The label of every point.
    #[must_use]
    pub const fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Consumes the clustering, returning the partition.
    #[must_use]
    pub fn into_partition(self) -> Partition {
        self.partition
    }

    /// The epsilon-neighbourhood size of every point.
    #[must_use]
    pub fn neighbourhood_sizes(&self) -> &[usize] {
        &self.neighbourhood_sizes
    }

    /// Whether the `i`-th point is a core point.
    #[must_use]
    pub fn is_core(&self, i: usize) -> bool {
        self.core[i]
    }

    /// The number of clusters found.
    #[must_use]
    pub const fn num_clusters(&self) -> usize {
        self.num_clusters
    }

    /// The number of noise points.
    #[must_use]
    pub fn noise_count(&self) -> usize {
        self.partition.noise_count()
    }
}

/// Union-find over point indices.
struct DisjointSet {
    /// The parent of each element; roots are their own parent.
    parents: Vec<usize>,
    /// An upper bound on the height of each root's tree.
    ranks: Vec<u8>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parents: (0..n).collect(),
            ranks: vec![0; n],
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parents[i] != i {
            self.parents[i] = self.parents[self.parents[i]];
            i = self.parents[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (a, b) = (self.find(a), self.find(b));
        if a == b {
            return;
        }
        match self.ranks[a].cmp(&self.ranks[b]) {
            core::cmp::Ordering::Less => self.parents[a] = b,
            core::cmp::Ordering::Greater => self.parents[b] = a,
            core::cmp::Ordering::Equal => {
                self.parents[b] = a;
                self.ranks[a] = self.ranks[a].saturating_add(1);
            }
        }
    }
}
