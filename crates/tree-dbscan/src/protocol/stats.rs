//! Counters and timings recorded by each worker and reduced to the root.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What one worker did during a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
pub struct NodeStatistics {
    /// The rank of the worker.
    pub rank: u64,
    /// The number of points the worker held.
    pub input_points: u64,
    /// The number of clusters found locally.
    pub local_clusters: u64,
    /// The number of local noise points.
    pub local_noise: u64,
    /// The number of hulls received from children.
    pub received_hulls: u64,
    /// The number of noise points received from children.
    pub received_noise: u64,
    /// The number of hulls sent to the parent, or kept by the root.
    pub forwarded_hulls: u64,
    /// The number of noise points sent to the parent, or left over at the
    /// root.
    pub forwarded_noise: u64,
    /// The number of noise points attached to hulls by this worker.
    pub absorbed_noise: u64,
    /// The number of points assigned to a global cluster.
    pub classified_points: u64,
    /// The number of points left as noise by classification.
    pub unclassified_points: u64,
    /// Seconds spent in local clustering.
    pub clustering_secs: f64,
    /// Seconds spent merging hulls and absorbing noise.
    pub merge_secs: f64,
    /// Seconds spent in classification.
    pub classification_secs: f64,
}

/// The statistics of a subtree, and of the whole run once at the root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
pub struct RunStatistics {
    /// One entry per worker of the subtree, ordered by rank.
    pub nodes: Vec<NodeStatistics>,
    /// The number of points classified into each global cluster.
    pub cluster_sizes: BTreeMap<u64, u64>,
}

impl RunStatistics {
    /// The statistics of a single worker.
    #[must_use]
    pub fn of_node(node: NodeStatistics, cluster_sizes: BTreeMap<u64, u64>) -> Self {
        Self {
            nodes: vec![node],
            cluster_sizes,
        }
    }

    /// Folds the statistics of a child subtree into these.
    pub fn absorb(&mut self, other: Self) {
        self.nodes.extend(other.nodes);
        self.nodes.sort_by_key(|n| n.rank);
        for (id, size) in other.cluster_sizes {
            *self.cluster_sizes.entry(id).or_insert(0) += size;
        }
    }

    /// The total number of input points.
    #[must_use]
    pub fn input_points(&self) -> u64 {
        self.nodes.iter().map(|n| n.input_points).sum()
    }

    /// The total number of points classified as noise.
    #[must_use]
    pub fn noise_points(&self) -> u64 {
        self.nodes.iter().map(|n| n.unclassified_points).sum()
    }

    /// The encoded form sent in a `STATISTICS` message.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        bitcode::encode(self)
    }

    /// Decodes a `STATISTICS` payload.
    ///
    /// # Errors
    ///
    /// * If the payload is not a valid encoding.
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        Ok(bitcode::decode(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{NodeStatistics, RunStatistics};

    fn node(rank: u64, input: u64, noise: u64) -> NodeStatistics {
        NodeStatistics {
            rank,
            input_points: input,
            unclassified_points: noise,
            classified_points: input - noise,
            ..NodeStatistics::default()
        }
    }

    #[test]
    fn subtrees_fold() -> Result<(), String> {
        let mut root = RunStatistics::of_node(node(0, 10, 2), BTreeMap::from([(1, 5), (2, 3)]));
        let child = RunStatistics::of_node(node(3, 4, 1), BTreeMap::from([(1, 3)]));
        let bytes = child.to_bytes();
        root.absorb(RunStatistics::from_bytes(&bytes).map_err(|e| e.to_string())?);

        assert_eq!(root.nodes.len(), 2);
        assert_eq!(root.input_points(), 14);
        assert_eq!(root.noise_points(), 3);
        assert_eq!(root.cluster_sizes.get(&1), Some(&8));
        Ok(())
    }
}
