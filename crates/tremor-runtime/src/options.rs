use serde::{Deserialize, Serialize};
use tremor_kernel::LookupStrategy;

pub const DEFAULT_SKIP_THRESHOLD: usize = 500;
pub const DEFAULT_PROGRESS_EVERY: usize = 1000;

/// Knobs shared by the run modes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Canonical entry chosen for a pair during lookup.
    pub lookup: LookupStrategy,
    /// Pairs without a canonical entry a rank may skip before the job aborts.
    pub skip_threshold: usize,
    /// Coordinator progress line every this many units; zero disables.
    pub progress_every: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            lookup: LookupStrategy::default(),
            skip_threshold: DEFAULT_SKIP_THRESHOLD,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }
}
