//! Message passing for tremor jobs.
//!
//! A job is `P` processes with ranks `0..P`; rank 0 coordinates. Components
//! never look up a global rank: they receive an [`ExecutionContext`] wrapping
//! a [`Communicator`] and the job's [`ProcessLayout`](tremor_kernel::ProcessLayout).
//!
//! Two communicators are provided. [`LocalCluster`] runs every rank on its
//! own thread inside one process; [`TcpEndpoint`] connects separate
//! processes in a star around the coordinator.

pub mod comm;
pub mod context;
pub mod error;
pub mod exchange;
pub mod local;
pub mod tags;
pub mod tcp;
pub mod wire;

pub use comm::Communicator;
pub use context::{DEFAULT_MAX_IN_FLIGHT, ExecutionContext, ReduceOp, SendMode};
pub use error::TransportError;
pub use exchange::{recv_green, recv_traces, send_green, send_skip, send_traces};
pub use local::{LocalCluster, LocalEndpoint};
pub use tags::{COLLECTIVE_BASE, TagScheme};
pub use tcp::{DEFAULT_MAX_PENDING, TcpEndpoint};
