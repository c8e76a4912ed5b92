//! The merged, tree-wide clustering result.

use serde::{Deserialize, Serialize};

use crate::{
    codec::{put_i32, ByteReader},
    hull::{canonical_cmp, HullCodec, HullModel},
    utils::len_to_i32,
    DimensionRange, Result, TdbscanError,
};

/// The hulls produced by one full tree reduction, in canonical order.
///
/// The hull at position `i` is the cluster with global identifier `i + 1`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
pub struct GlobalModel {
    /// The hulls, heaviest first.
    hulls: Vec<HullModel>,
}

/// What the report writer needs to know about one global cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    /// The global cluster identifier.
    pub cluster_id: usize,
    /// The point mass of the cluster.
    pub density: u64,
    /// The number of members of its hull.
    pub point_count: usize,
    /// The bounding box of its members.
    pub extent: DimensionRange,
}

impl GlobalModel {
    /// Creates a model from merged hulls, putting them in canonical order.
    ///
    /// Empty hulls are dropped.
    #[must_use]
    pub fn new(mut hulls: Vec<HullModel>) -> Self {
        hulls.retain(|h| !h.is_empty());
        hulls.sort_by(canonical_cmp);
        Self { hulls }
    }

    /// The hulls, in cluster-identifier order.
    #[must_use]
    pub fn hulls(&self) -> &[HullModel] {
        &self.hulls
    }

    /// The number of global clusters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hulls.len()
    }

    /// Whether there are no global clusters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hulls.is_empty()
    }

    /// The hull of the cluster with the given global identifier.
    #[must_use]
    pub fn hull(&self, cluster_id: usize) -> Option<&HullModel> {
        cluster_id.checked_sub(1).and_then(|i| self.hulls.get(i))
    }

    /// The total number of hull members.
    #[must_use]
    pub fn total_points(&self) -> usize {
        self.hulls.iter().map(HullModel::point_count).sum()
    }

    /// The total point mass.
    #[must_use]
    pub fn total_density(&self) -> u64 {
        self.hulls.iter().map(HullModel::density).sum()
    }

    /// One summary per cluster, in identifier order.
    #[must_use]
    pub fn summaries(&self) -> Vec<ClusterSummary> {
        self.hulls
            .iter()
            .enumerate()
            .map(|(i, h)| ClusterSummary {
                cluster_id: i + 1,
                density: h.density(),
                point_count: h.point_count(),
                extent: h.extent(),
            })
            .collect()
    }

    /// Encodes the model as `count: i32` followed by that many hulls.
    ///
    /// # Errors
    ///
    /// * If a count does not fit its wire width.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(4 + self.hulls.iter().map(HullCodec::encoded_len).sum::<usize>());
        put_i32(&mut buf, len_to_i32(self.hulls.len())?);
        for hull in &self.hulls {
            HullCodec::encode_into(hull, &mut buf)?;
        }
        Ok(buf)
    }

    /// Decodes a model written by [`GlobalModel::to_bytes`].
    ///
    /// # Errors
    ///
    /// * If the payload is malformed.
    /// * If the hulls are not in canonical order.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let count = reader.read_len("hull count")?;
        reader.check_remaining(count, 16)?;
        let hulls = (0..count)
            .map(|_| HullCodec::decode_from(&mut reader))
            .collect::<Result<Vec<_>>>()?;
        reader.finish()?;

        if hulls.windows(2).any(|w| canonical_cmp(&w[0], &w[1]).is_gt()) {
            return Err(TdbscanError::Codec("Global model hulls are out of order".to_string()));
        }
        Ok(Self { hulls })
    }
}
