//! The global model and classification against it.

mod classifier;
mod global;

pub use classifier::Classifier;
pub use global::{ClusterSummary, GlobalModel};
