//! Hull models: building them from local clusters, merging them up the tree
//! and moving them over the wire.

mod codec;
mod matcher;
mod merge;
mod model;

pub use codec::HullCodec;
pub use matcher::HullMatcher;
pub use merge::{absorb_noise, canonical_cmp, merge_hulls};
pub use model::{build_hulls, noise_points, CanonicalKey, HullModel, NoisePoint};
