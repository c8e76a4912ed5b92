//! Assignments of points to clusters.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{InstanceId, Result, TdbscanError};

/// The cluster a point belongs to.
///
/// Cluster identifiers start at 1. Exported files use 0 for noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClusterLabel {
    /// The point is not part of any cluster.
    Noise,
    /// The point belongs to the cluster with this identifier.
    Cluster(usize),
}

impl ClusterLabel {
    /// Whether the point is noise.
    #[must_use]
    pub const fn is_noise(self) -> bool {
        matches!(self, Self::Noise)
    }

    /// The cluster identifier, or `None` for noise.
    #[must_use]
    pub const fn cluster_id(self) -> Option<usize> {
        match self {
            Self::Noise => None,
            Self::Cluster(id) => Some(id),
        }
    }

    /// The numeric label written to output files.
    #[must_use]
    pub const fn as_export_id(self) -> usize {
        match self {
            Self::Noise => 0,
            Self::Cluster(id) => id,
        }
    }
}

/// The label of every point of one worker, in storage order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Partition {
    /// The instance identifiers.
    instances: Vec<InstanceId>,
    /// The label of each instance.
    labels: Vec<ClusterLabel>,
}

impl Partition {
    /// Creates a new `Partition`.
    ///
    /// # Errors
    ///
    /// * If the instances and labels have different lengths.
    pub fn new(instances: Vec<InstanceId>, labels: Vec<ClusterLabel>) -> Result<Self> {
        if instances.len() == labels.len() {
            Ok(Self { instances, labels })
        } else {
            Err(TdbscanError::DataIntegrity(format!(
                "{} instances but {} labels",
                instances.len(),
                labels.len()
            )))
        }
    }

    /// The number of labelled points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the partition is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// The instance identifiers, in storage order.
    #[must_use]
    pub fn instances(&self) -> &[InstanceId] {
        &self.instances
    }

    /// The labels, in storage order.
    #[must_use]
    pub fn labels(&self) -> &[ClusterLabel] {
        &self.labels
    }

    /// Iterates over `(instance, label)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, ClusterLabel)> + '_ {
        self.instances.iter().copied().zip(self.labels.iter().copied())
    }

    /// The label of an instance, if it is part of this partition.
    #[must_use]
    pub fn label_of(&self, instance: InstanceId) -> Option<ClusterLabel> {
        self.iter().find(|&(i, _)| i == instance).map(|(_, l)| l)
    }

    /// The number of noise points.
    #[must_use]
    pub fn noise_count(&self) -> usize {
        self.labels.iter().filter(|l| l.is_noise()).count()
    }

    /// The number of distinct clusters.
    #[must_use]
    pub fn num_clusters(&self) -> usize {
        self.cluster_sizes().len()
    }

    /// The number of points in each cluster, keyed by cluster identifier.
    #[must_use]
    pub fn cluster_sizes(&self) -> BTreeMap<usize, usize> {
        self.labels
            .iter()
            .filter_map(|l| l.cluster_id())
            .fold(BTreeMap::new(), |mut sizes, id| {
                *sizes.entry(id).or_insert(0) += 1;
                sizes
            })
    }

    /// The storage indices of the members of each cluster, keyed by cluster
    /// identifier.
    #[must_use]
    pub fn members(&self) -> BTreeMap<usize, Vec<usize>> {
        self.labels
            .iter()
            .enumerate()
            .filter_map(|(i, l)| l.cluster_id().map(|id| (id, i)))
            .fold(BTreeMap::new(), |mut members, (id, i)| {
                members.entry(id).or_insert_with(Vec::new).push(i);
                members
            })
    }

    /// The instance sets of the clusters, independent of cluster numbering.
    #[must_use]
    pub fn membership_sets(&self) -> BTreeSet<BTreeSet<InstanceId>> {
        self.members()
            .into_values()
            .map(|indices| indices.into_iter().map(|i| self.instances[i]).collect())
            .collect()
    }
}
