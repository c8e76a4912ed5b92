//! Assigning points to the clusters of a global model.

use rayon::prelude::*;

use super::GlobalModel;
use crate::{
    hull::HullMatcher, ClusterLabel, ClusteringConfig, Partition, PointStore, Result, TdbscanError,
};

/// Classifies points against a [`GlobalModel`].
///
/// A point joins the cluster whose nearest core member is closest, provided
/// that member is within `epsilon`. Equidistant clusters resolve to the lowest
/// cluster identifier. A point matching no cluster is noise.
#[derive(Debug, Clone)]
pub struct Classifier {
    /// Core members of the global hulls, in cluster-identifier order.
    matcher: HullMatcher,
    /// The dimensionality of the model, if it has any hulls.
    dimensionality: Option<usize>,
}

impl Classifier {
    /// Prepares the model for classification with the given parameters.
    #[must_use]
    pub fn new(model: &GlobalModel, epsilon: f64, min_points: usize) -> Self {
        Self {
            matcher: HullMatcher::new(model.hulls(), epsilon, min_points),
            dimensionality: model.hulls().first().map(crate::HullModel::dimensionality),
        }
    }

    /// Prepares the model for classification with the parameters of a run.
    #[must_use]
    pub fn from_config(model: &GlobalModel, config: &ClusteringConfig) -> Self {
        Self::new(model, config.epsilon, config.min_points)
    }

    /// The label of a single point.
    #[must_use]
    pub fn classify_point(&self, coordinates: &[f64]) -> ClusterLabel {
        self.matcher
            .best_match(coordinates)
            .map_or(ClusterLabel::Noise, |(i, _)| ClusterLabel::Cluster(i + 1))
    }

    /// Labels every point of a store.
    ///
    /// # Errors
    ///
    /// * If the store and the model have different dimensionalities.
    pub fn classify(&self, store: &PointStore) -> Result<Partition> {
        if let Some(d) = self.dimensionality {
            if !store.is_empty() && d != store.dimensionality() {
                return Err(TdbscanError::DataIntegrity(format!(
                    "Cannot classify {}-dimensional points against a {d}-dimensional model",
                    store.dimensionality()
                )));
            }
        }

        let labels = (0..store.cardinality())
            .into_par_iter()
            .map(|i| self.classify_point(store.coordinates(i)))
            .collect::<Vec<_>>();
        Partition::new(store.instances().to_vec(), labels)
    }
}
