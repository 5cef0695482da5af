//! Error taxonomy shared across the crate.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, BasaltError>;

/// Errors surfaced by graph construction and algorithm execution.
///
/// Programming-contract violations (out-of-range indexes, use of released
/// storage, malformed compressed bytes) are not represented here; those
/// panic instead of returning an error.
#[derive(Debug, Error)]
pub enum BasaltError {
    /// Invalid or conflicting configuration, reported before any work starts.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Estimated peak memory exceeds the configured budget even at the
    /// lowest admissible concurrency.
    #[error("estimated peak memory of {required} bytes exceeds budget of {budget} bytes")]
    MemoryExhausted {
        /// Bytes the computation needs at the lowest admissible concurrency.
        required: u64,
        /// Configured budget in bytes.
        budget: u64,
    },
    /// The cooperative termination flag was raised while work was pending.
    #[error("terminated before completion")]
    Terminated,
    /// The worker pool stayed saturated through every submission retry.
    #[error("worker pool still saturated after {0} submission attempts")]
    ExecutorSaturated(usize),
    /// A parallel task aborted without reporting a result, usually because
    /// it panicked on its worker thread.
    #[error("parallel task aborted without reporting a result")]
    TaskAborted,
    /// One or more parallel tasks failed.
    #[error(transparent)]
    Tasks(#[from] TaskErrors),
}

/// Aggregate of every error raised by one batch of parallel tasks.
///
/// Failures are kept in completion order; none is dropped.
#[derive(Debug)]
pub struct TaskErrors(pub Vec<BasaltError>);

impl fmt::Display for TaskErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.first() {
            Some(first) => write!(f, "{} parallel task(s) failed, first: {first}", self.0.len()),
            None => write!(f, "task batch failed without a recorded cause"),
        }
    }
}

impl StdError for TaskErrors {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.first().map(|err| err as &(dyn StdError + 'static))
    }
}
