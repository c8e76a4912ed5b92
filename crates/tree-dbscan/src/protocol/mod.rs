//! Moving hulls up and the global model down a tree of workers.
//!
//! Each phase of a run is a reduction, where every worker waits for a
//! sentinel-terminated stream from each child before forwarding to its
//! parent, or a broadcast, where every worker forwards what its parent sent
//! to its children:
//!
//! 1. `CONFIG` is broadcast from the root.
//! 2. `RANGE` frames are reduced and `GLOBAL_RANGE` is broadcast.
//! 3. `HULLS` and `NOISE` frames are reduced into the global model.
//! 4. `GLOBAL_MODEL` is broadcast, byte for byte.
//! 5. `STATISTICS` are reduced.
//!
//! A failing worker sends `ABORT` to its neighbours, which fail in turn.

mod exchange;
mod frame;
mod link;
mod local;
mod message;
mod role;
mod stats;
mod tcp;
mod tdbscan;
pub mod tree;

pub use exchange::exchange_ranges;
pub use frame::{Frame, Tag, MAX_PAYLOAD};
pub use link::{Envelope, Link};
pub use local::{LocalLink, LocalNetwork};
pub use message::Message;
pub use role::{run_worker, WorkerRole};
pub use stats::{NodeStatistics, RunStatistics};
pub use tcp::TcpLink;
pub use tdbscan::{TreeDbscan, WorkerOutput};
pub use tree::ReductionState;
