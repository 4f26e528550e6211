//! # tremor-runtime
//!
//! Run modes of a tremor job. Every entry point takes the rank's
//! [`ExecutionContext`](tremor_transport::ExecutionContext) and must be
//! entered by every rank of the job; results come back on the coordinator
//! as `Some(report)` and as `None` everywhere else.
//!
//! ```text
//! build_pairs      scenario ──dedup──▶ pairs.json
//! build_database   pairs.json ──kernel──▶ tdata_dict.jsonl
//! check_pairs      scenario × pairs.json ──▶ uncovered pairs
//! run_direct       scenario ──kernel──▶ stations
//! run_fast         scenario × database ──pair round robin──▶ stations
//! run_faster       scenario × database ──station round robin──▶ stations
//! ```
//!
//! Wrap a rank's work in [`run_job`] so that any error aborts the other
//! ranks instead of leaving them blocked on a receive.

pub mod check;
pub mod database;
pub mod error;
pub mod job;
pub mod options;
pub mod pairs;
pub mod perf;
pub mod progress;
pub mod run;
pub mod scenario;
pub mod writer;

pub use check::{CheckReport, UncoveredPair, check_pairs};
pub use database::{DatabaseReport, build_database};
pub use error::RunError;
pub use job::run_job;
pub use options::{DEFAULT_PROGRESS_EVERY, DEFAULT_SKIP_THRESHOLD, RunOptions};
pub use pairs::{PairsReport, build_pairs, distributed_dedup};
pub use perf::{Phase, PerfCounters, PerfReport, PhaseStat};
pub use progress::{ProgressMeter, ProgressSnapshot};
pub use run::{RunMode, RunReport, run_direct, run_fast, run_faster};
pub use scenario::Scenario;
pub use writer::{MemoryWriter, StationWriter};
