use tremor_bd::DatabaseError;
use tremor_kernel::{AccumulationError, DedupError, KernelError, ScheduleError};
use tremor_transport::TransportError;

/// Anything that ends a run. Every variant is fatal for the whole job.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Dedup(#[from] DedupError),

    #[error(transparent)]
    Accumulation(#[from] AccumulationError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("{skipped} pairs had no canonical entry within tolerance (threshold {threshold})")]
    SkipThreshold { skipped: usize, threshold: usize },

    #[error("{what} index {index} out of range ({len} available)")]
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("scenario mismatch: {0}")]
    Scenario(String),

    #[error("station writer failed: {0}")]
    Writer(String),
}
