//! Error types for tremor kernel operations.

/// Errors raised while preparing or invoking the Green's-function kernel.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// A solver parameter is out of its admissible range.
    #[error("invalid solver parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// The crust model has no layers at all.
    #[error("crust model has no layers")]
    EmptyCrust,

    /// A layer carries non-physical properties.
    #[error("invalid crust layer {index}: {reason}")]
    InvalidLayer { index: usize, reason: String },

    /// A point lies above the free surface (depths are positive down).
    #[error("depth {depth} lies above the free surface")]
    DepthAboveSurface { depth: f64 },

    /// A raw tensor does not have the expected shape.
    #[error("raw tensor shape mismatch: expected {expected} values, got {actual}")]
    TensorShape { expected: usize, actual: usize },

    /// The solver itself failed.
    #[error("kernel failure: {0}")]
    Solver(String),
}

/// Errors raised by the geometry deduplicator.
#[derive(Debug, thiserror::Error)]
pub enum DedupError {
    /// Tolerances must be finite and non-negative.
    #[error("tolerance {name} must be finite and non-negative (got {value})")]
    InvalidTolerance { name: &'static str, value: f64 },

    /// Bin factors shrink the bin width below the tolerance.
    #[error("bin factor {name} must lie in (0, 1) (got {value})")]
    InvalidBinFactor { name: &'static str, value: f64 },

    /// A refinement iteration failed to shrink the uncovered set.
    #[error("coverage stalled at iteration {iteration}: {uncovered} pairs remain uncovered")]
    CoverageStalled { iteration: usize, uncovered: usize },

    /// The refinement loop hit its iteration bound.
    #[error("coverage refinement exceeded {limit} iterations with {uncovered} pairs uncovered")]
    RefinementLimit { limit: usize, uncovered: usize },

    /// More canonical entries were needed than the configured maximum.
    #[error("canonical set exceeded the configured maximum of {max} entries")]
    CanonicalOverflow { max: usize },

    /// An index referred to a pair outside the table.
    #[error("pair index {index} outside table range {start}..{end}")]
    IndexOutOfRange {
        index: usize,
        start: usize,
        end: usize,
    },
}

/// Errors raised while folding traces into a station response.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AccumulationError {
    /// Component series and time axis differ in length.
    #[error("component lengths differ: z={z} e={e} n={n} t={t}")]
    LengthMismatch { z: usize, e: usize, n: usize, t: usize },

    /// A contribution needs at least two samples to be interpolated.
    #[error("trace has {0} samples; at least two are required")]
    TooShort(usize),

    /// The time axis must increase strictly.
    #[error("time axis is not strictly increasing at sample {0}")]
    NonMonotonicTime(usize),

    /// NaN or infinity in a component or the time axis.
    #[error("non-finite value at sample {index} of component {component}")]
    NonFinite { component: &'static str, index: usize },

    /// A pre-gridded response does not match the station grid.
    #[error("response grid mismatch: expected {expected} samples, got {actual}")]
    GridMismatch { expected: usize, actual: usize },

    /// The output window cannot produce a grid.
    #[error("invalid output window: {0}")]
    InvalidWindow(String),
}

/// Errors raised when describing a process layout.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("a run needs at least one process")]
    NoProcesses,

    #[error("rank {rank} out of range for {nprocs} processes")]
    RankOutOfRange { rank: usize, nprocs: usize },
}
