//! The phases every tree-distributed analysis goes through, and the driver
//! that runs them on one worker.

use super::{tree::broadcast_abort, Link};
use crate::{Result, TdbscanError};

/// A tree-distributed analysis: configure, reduce a model to the root,
/// broadcast it back, then use it locally.
pub trait WorkerRole {
    /// What the reduction produces and the broadcast distributes.
    type Model;
    /// What the worker returns at the end of a run.
    type Output;

    /// Receives (or, at the root, distributes) the run parameters and
    /// prepares the local data.
    ///
    /// # Errors
    ///
    /// * On invalid parameters or data, or a protocol failure.
    fn configure(&mut self, link: &dyn Link) -> Result<()>;

    /// Builds the local contribution, merges it with the children's and
    /// forwards the result. Returns the complete model at the root and
    /// `None` elsewhere.
    ///
    /// # Errors
    ///
    /// * On a protocol failure.
    fn run_reduction_phase(&mut self, link: &dyn Link) -> Result<Option<Self::Model>>;

    /// Sends the model down the tree, receiving it first unless this is the
    /// root.
    ///
    /// # Errors
    ///
    /// * On a protocol failure, or if the root has no model.
    fn run_broadcast_phase(&mut self, link: &dyn Link, model: Option<Self::Model>) -> Result<Self::Model>;

    /// Applies the model to the local data.
    ///
    /// # Errors
    ///
    /// * If the model does not fit the local data.
    fn classify(&mut self, model: &Self::Model) -> Result<()>;

    /// Finishes the run, e.g. by reducing statistics, and returns the
    /// worker's results.
    ///
    /// # Errors
    ///
    /// * On a protocol failure.
    fn report(self, link: &dyn Link) -> Result<Self::Output>;
}

/// Runs every phase of a role on one worker.
///
/// On failure the worker tells its neighbours to abort before returning
/// the error, so that no worker waits forever on a failed one.
///
/// # Errors
///
/// * The first error raised by any phase.
pub fn run_worker<R: WorkerRole>(mut role: R, link: &dyn Link) -> Result<R::Output> {
    let rank = link.rank();
    let run = || -> Result<R::Output> {
        role.configure(link)?;
        let model = role.run_reduction_phase(link)?;
        let model = role.run_broadcast_phase(link, model)?;
        role.classify(&model)?;
        role.report(link)
    };

    run().map_err(|e| {
        let reason = match &e {
            TdbscanError::Aborted(reason) => {
                ftlog::warn!("Worker {rank} aborts: {reason}");
                reason.clone()
            }
            e => {
                ftlog::error!("Worker {rank} failed: {e}");
                format!("worker {rank}: {e}")
            }
        };
        broadcast_abort(link, &reason);
        e
    })
}
