#![doc = include_str!("../README.md")]

pub(crate) mod codec;
mod config;
pub mod dbscan;
mod error;
pub mod hull;
pub mod model;
mod points;
pub mod protocol;
mod range;
mod topology;
pub mod utils;

pub use config::{ClusteringConfig, TreePosition};
pub use dbscan::{ClusterLabel, Clustering, LocalDensityClusterer, Partition};
pub use error::{Result, TdbscanError};
pub use hull::{HullCodec, HullModel, NoisePoint};
pub use model::{Classifier, ClusterSummary, GlobalModel};
pub use points::{InstanceId, Point, PointStore};
pub use range::DimensionRange;
pub use topology::Topology;

/// The current version of the crate.
pub const VERSION: &str = "0.1.0";
