//! # Tremor Kernel
//!
//! Synthetic seismograms are sums over every (station, source) pair of a
//! Green's function convolved with a source time function. Evaluating the
//! Green's function is expensive, so the kernel crate decides *which* pairs
//! need it, *who* evaluates them, and *how* the results add up.
//!
//! This crate is **transport-agnostic**: it never sends a message. Process
//! ownership is a pure function of `(rank, nprocs, unit index)`, so every
//! process can derive the whole schedule on its own.
//!
//! ## Architecture
//!
//! ```text
//! PointSource / Station     ← Immutable positions (z positive down)
//!     │
//! GeometryKey               ← (dh, z_rec, z_src) projection of a pair
//!     │
//! PairEnumerator            ← Stations outer, sources inner
//!     │
//! PairSchedule / Station-   ← Round-robin ownership per process
//! Schedule / BlockPartition
//!     │
//! Deduplicator              ← Greedy tolerance cover + refinement loop
//!     │
//! GreenKernel               ← External solver (trait) + reference kernel
//!     │
//! StationResponse           ← Order-independent accumulation on a grid
//! ```

pub mod crust;
pub mod dedup;
pub mod enumerate;
pub mod error;
pub mod geometry;
pub mod green;
pub mod response;
pub mod schedule;
pub mod stf;

pub use crust::{CrustModel, Layer};
pub use dedup::{
    CanonicalPair, CanonicalSet, CoverageStep, CoverageTracker, DedupConfig, DedupOutcome,
    Deduplicator, IterationReport, LookupStrategy, PairTable, bin_candidates, uncovered_in,
};
pub use enumerate::{Pair, PairEnumerator, PairIter};
pub use error::{AccumulationError, DedupError, KernelError, ScheduleError};
pub use geometry::{GeometryKey, PairGeometry, PointSource, Position, Station, Tolerance};
pub use green::{
    ComponentTraces, GREEN_COMPONENTS, GreenKernel, GreenTensor, KernelOutput, KernelRequest,
    PulseKernel, SolverParams, Synthesis,
};
pub use response::{OutputWindow, StationResponse, TimedTraces};
pub use schedule::{
    BlockPartition, COORDINATOR, Cursor, PairSchedule, ProcessLayout, ProcessRole,
    StationSchedule,
};
pub use stf::SourceTimeFunction;
