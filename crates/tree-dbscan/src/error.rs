//! Errors raised while configuring, clustering and reconciling models.

use thiserror::Error;

/// Errors that can occur during a Tree-DBSCAN run.
///
/// Local, recoverable conditions (empty inputs, points matching no hull) are
/// not errors: they resolve to noise or to empty results. Everything here
/// aborts the run.
#[derive(Debug, Error)]
pub enum TdbscanError {
    /// Invalid clustering parameters or tree position.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The points held by one worker violate an invariant, e.g. a repeated
    /// instance identifier.
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// A peer broke the message sequence of the tree protocol.
    #[error("Protocol error on worker {rank}: {message}")]
    Protocol {
        /// Rank of the worker that detected the violation.
        rank: usize,
        /// What went wrong.
        message: String,
    },

    /// A payload could not be encoded or decoded.
    #[error("Codec error: {0}")]
    Codec(String),

    /// The underlying transport failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking receive expired.
    #[error("Worker {rank} timed out waiting for {waiting_for}")]
    Timeout {
        /// Rank of the worker that gave up.
        rank: usize,
        /// The phase the worker was blocked in.
        waiting_for: String,
    },

    /// Another worker aborted the run.
    #[error("Run aborted: {0}")]
    Aborted(String),
}

impl TdbscanError {
    /// Shorthand for a protocol violation detected by `rank`.
    pub fn protocol<S: Into<String>>(rank: usize, message: S) -> Self {
        Self::Protocol {
            rank,
            message: message.into(),
        }
    }
}

impl From<csv::Error> for TdbscanError {
    fn from(e: csv::Error) -> Self {
        Self::DataIntegrity(e.to_string())
    }
}

impl From<bitcode::Error> for TdbscanError {
    fn from(e: bitcode::Error) -> Self {
        Self::Codec(e.to_string())
    }
}

/// The result type used throughout the crate.
pub type Result<T> = core::result::Result<T, TdbscanError>;
