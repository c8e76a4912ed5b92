//! Clustering parameters and the position of a worker in the tree.

use serde::{Deserialize, Serialize};

use crate::{Result, TdbscanError};

/// The parameters of one clustering run.
///
/// This is sent once from the front-end to every worker (the `CONFIG`
/// message) and passed explicitly to the clusterer and the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// The density radius.
    pub epsilon: f64,
    /// The minimum neighbourhood size, the point itself included, for a
    /// point to be a core point.
    pub min_points: usize,
    /// Reference to the clustering definition used to extract the points.
    pub clustering_definition: String,
    /// Path of the input the points were extracted from.
    pub input_path: String,
    /// Prefix for the output files.
    pub output_path: String,
    /// Whether to log at debug level.
    pub verbose: bool,
    /// Whether the output writer should reconstruct the input trace.
    pub reconstruct_trace: bool,
    /// Whether to normalize coordinates with the global dimension ranges
    /// before clustering. `epsilon` is then measured in normalized units.
    pub normalize: bool,
}

impl ClusteringConfig {
    /// Creates a new configuration with the given density parameters.
    ///
    /// The remaining fields take their default values. Normalization is
    /// disabled, so `epsilon` is measured in the units of the input.
    ///
    /// # Errors
    ///
    /// * If `epsilon` is not a positive, finite number.
    /// * If `min_points` is zero.
    pub fn new(epsilon: f64, min_points: usize) -> Result<Self> {
        let config = Self {
            epsilon,
            min_points,
            clustering_definition: String::new(),
            input_path: String::new(),
            output_path: String::new(),
            verbose: false,
            reconstruct_trace: false,
            normalize: false,
        };
        config.validate()?;
        Ok(config)
    }

    /// Sets the reference to the clustering definition.
    #[must_use]
    pub fn with_definition(mut self, definition: &str) -> Self {
        self.clustering_definition = definition.to_string();
        self
    }

    /// Sets the input and output paths.
    #[must_use]
    pub fn with_paths(mut self, input_path: &str, output_path: &str) -> Self {
        self.input_path = input_path.to_string();
        self.output_path = output_path.to_string();
        self
    }

    /// Sets the verbosity flag.
    #[must_use]
    pub const fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Sets the trace reconstruction flag.
    #[must_use]
    pub const fn with_reconstruct_trace(mut self, reconstruct_trace: bool) -> Self {
        self.reconstruct_trace = reconstruct_trace;
        self
    }

    /// Enables or disables normalization.
    #[must_use]
    pub const fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Checks the density parameters.
    ///
    /// # Errors
    ///
    /// * If `epsilon` is not a positive, finite number.
    /// * If `min_points` is zero.
    pub fn validate(&self) -> Result<()> {
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(TdbscanError::Config(format!(
                "epsilon must be positive and finite, got {}",
                self.epsilon
            )));
        }
        if self.min_points < 1 {
            return Err(TdbscanError::Config("min_points must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Where a worker sits in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreePosition {
    /// The rank of the worker, in `0..num_workers`.
    pub rank: usize,
    /// Whether the worker is the root of the tree.
    pub is_root: bool,
    /// The total number of workers in the tree.
    pub num_workers: usize,
}

impl TreePosition {
    /// Creates a new position.
    ///
    /// # Errors
    ///
    /// * If there are no workers.
    /// * If the rank is out of range.
    pub fn new(rank: usize, is_root: bool, num_workers: usize) -> Result<Self> {
        if num_workers == 0 {
            return Err(TdbscanError::Config("the tree has no workers".to_string()));
        }
        if rank >= num_workers {
            return Err(TdbscanError::Config(format!(
                "rank {rank} is out of range for {num_workers} workers"
            )));
        }
        Ok(Self {
            rank,
            is_root,
            num_workers,
        })
    }
}
