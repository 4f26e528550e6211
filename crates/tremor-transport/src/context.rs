use crate::comm::Communicator;
use crate::error::TransportError;
use crate::tags::COLLECTIVE_BASE;
use crate::wire;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use tremor_kernel::{COORDINATOR, ProcessLayout, ProcessRole};

pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

/// How point-to-point sends leave the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum SendMode {
    /// Every send is handed to the communicator before returning.
    #[default]
    Blocking,
    /// Sends queue in an in-flight list, drained when it reaches
    /// `max_in_flight` and before any receive, collective or finish.
    Buffered { max_in_flight: usize },
}

impl SendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendMode::Blocking => "blocking",
            SendMode::Buffered { .. } => "buffered",
        }
    }
}

impl fmt::Display for SendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SendMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "blocking" => Ok(SendMode::Blocking),
            "buffered" => Ok(SendMode::Buffered {
                max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            }),
            other => Err(format!(
                "unknown send mode `{other}` (expected `blocking` or `buffered`)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Max,
    Min,
    Sum,
}

impl ReduceOp {
    fn fold(&self, acc: f64, value: f64) -> f64 {
        match self {
            ReduceOp::Max => acc.max(value),
            ReduceOp::Min => acc.min(value),
            ReduceOp::Sum => acc + value,
        }
    }

    fn fold_count(&self, acc: usize, value: usize) -> usize {
        match self {
            ReduceOp::Max => acc.max(value),
            ReduceOp::Min => acc.min(value),
            ReduceOp::Sum => acc.saturating_add(value),
        }
    }
}

/// Per-process execution state handed to every distributed component.
///
/// Collectives are rooted at the coordinator and must be entered by every
/// rank in the same order; each call draws a fresh tag above
/// `COLLECTIVE_BASE` so consecutive collectives never cross.
pub struct ExecutionContext<C: Communicator> {
    comm: C,
    layout: ProcessLayout,
    send_mode: SendMode,
    in_flight: VecDeque<(usize, u64, Vec<u8>)>,
    collective_seq: u64,
}

impl<C: Communicator> ExecutionContext<C> {
    pub fn new(comm: C, send_mode: SendMode) -> Result<Self, TransportError> {
        let layout = ProcessLayout::new(comm.rank(), comm.size())?;
        Ok(Self {
            comm,
            layout,
            send_mode,
            in_flight: VecDeque::new(),
            collective_seq: 0,
        })
    }

    pub fn rank(&self) -> usize {
        self.layout.rank()
    }

    pub fn nprocs(&self) -> usize {
        self.layout.nprocs()
    }

    pub fn layout(&self) -> ProcessLayout {
        self.layout
    }

    pub fn role(&self) -> ProcessRole {
        self.layout.role()
    }

    pub fn is_coordinator(&self) -> bool {
        self.layout.is_coordinator()
    }

    pub fn send_mode(&self) -> SendMode {
        self.send_mode
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn send(&mut self, dest: usize, tag: u64, payload: Vec<u8>) -> Result<(), TransportError> {
        match self.send_mode {
            SendMode::Blocking => self.comm.send(dest, tag, payload),
            SendMode::Buffered { max_in_flight } => {
                self.in_flight.push_back((dest, tag, payload));
                if self.in_flight.len() >= max_in_flight.max(1) {
                    self.flush()?;
                }
                Ok(())
            }
        }
    }

    pub fn recv(&mut self, source: usize, tag: u64) -> Result<Vec<u8>, TransportError> {
        self.flush()?;
        self.comm.recv(source, tag)
    }

    /// Hands every queued send to the communicator.
    pub fn flush(&mut self) -> Result<(), TransportError> {
        if self.in_flight.is_empty() {
            return Ok(());
        }
        tracing::trace!(rank = self.rank(), queued = self.in_flight.len(), "draining sends");
        while let Some((dest, tag, payload)) = self.in_flight.pop_front() {
            self.comm.send(dest, tag, payload)?;
        }
        Ok(())
    }

    fn collective_tag(&mut self) -> Result<u64, TransportError> {
        self.flush()?;
        let tag = COLLECTIVE_BASE + self.collective_seq;
        self.collective_seq += 1;
        Ok(tag)
    }

    fn workers(&self) -> std::ops::Range<usize> {
        1..self.nprocs()
    }

    pub fn barrier(&mut self) -> Result<(), TransportError> {
        let tag = self.collective_tag()?;
        if self.is_coordinator() {
            for worker in self.workers() {
                self.comm.recv(worker, tag)?;
            }
            for worker in self.workers() {
                self.comm.send(worker, tag, Vec::new())?;
            }
        } else {
            self.comm.send(COORDINATOR, tag, Vec::new())?;
            self.comm.recv(COORDINATOR, tag)?;
        }
        Ok(())
    }

    /// Every rank returns the coordinator's payload; workers' arguments are
    /// ignored.
    pub fn broadcast(&mut self, payload: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        let tag = self.collective_tag()?;
        if self.is_coordinator() {
            for worker in self.workers() {
                self.comm.send(worker, tag, payload.clone())?;
            }
            Ok(payload)
        } else {
            self.comm.recv(COORDINATOR, tag)
        }
    }

    /// Rank-ordered payloads on the coordinator, `None` elsewhere.
    pub fn gather(&mut self, payload: Vec<u8>) -> Result<Option<Vec<Vec<u8>>>, TransportError> {
        let tag = self.collective_tag()?;
        if self.is_coordinator() {
            let mut all = Vec::with_capacity(self.nprocs());
            all.push(payload);
            for worker in self.workers() {
                all.push(self.comm.recv(worker, tag)?);
            }
            Ok(Some(all))
        } else {
            self.comm.send(COORDINATOR, tag, payload)?;
            Ok(None)
        }
    }

    /// Variable-length gather: sizes first, then the lists, concatenated in
    /// rank order on the coordinator.
    pub fn gatherv_indices(
        &mut self,
        values: &[usize],
    ) -> Result<Option<Vec<usize>>, TransportError> {
        let sizes = self.gather(wire::encode_indices(&[values.len()]))?;
        let lists = self.gather(wire::encode_indices(values))?;
        let (Some(sizes), Some(lists)) = (sizes, lists) else {
            return Ok(None);
        };
        let mut out = Vec::new();
        for (rank, (size, list)) in sizes.iter().zip(lists.iter()).enumerate() {
            let expected = match wire::decode_indices(size)?.as_slice() {
                [n] => *n,
                _ => {
                    return Err(TransportError::Decode(format!(
                        "rank {rank} sent a malformed size"
                    )));
                }
            };
            let decoded = wire::decode_indices(list)?;
            if decoded.len() != expected {
                return Err(TransportError::Protocol(format!(
                    "rank {rank} announced {expected} indices but sent {}",
                    decoded.len()
                )));
            }
            out.extend(decoded);
        }
        Ok(Some(out))
    }

    pub fn reduce_f64(&mut self, value: f64, op: ReduceOp) -> Result<Option<f64>, TransportError> {
        let Some(all) = self.gather(wire::encode_f64(value))? else {
            return Ok(None);
        };
        let mut acc: Option<f64> = None;
        for bytes in &all {
            let value = wire::decode_f64(bytes)?;
            acc = Some(match acc {
                Some(acc) => op.fold(acc, value),
                None => value,
            });
        }
        Ok(acc)
    }

    /// Integer reduction, exact for counts of any size.
    pub fn reduce_usize(
        &mut self,
        value: usize,
        op: ReduceOp,
    ) -> Result<Option<usize>, TransportError> {
        let Some(all) = self.gather(wire::encode_indices(&[value]))? else {
            return Ok(None);
        };
        let mut acc: Option<usize> = None;
        for (rank, bytes) in all.iter().enumerate() {
            let value = match wire::decode_indices(bytes)?.as_slice() {
                [value] => *value,
                _ => {
                    return Err(TransportError::Decode(format!(
                        "rank {rank} sent a malformed count"
                    )));
                }
            };
            acc = Some(match acc {
                Some(acc) => op.fold_count(acc, value),
                None => value,
            });
        }
        Ok(acc)
    }

    /// Tears down every process of the job.
    pub fn abort(&mut self, reason: &str) {
        tracing::error!(rank = self.rank(), reason, "aborting job");
        self.in_flight.clear();
        self.comm.abort(reason);
    }

    /// Drains pending sends and marks a clean shutdown.
    pub fn finish(mut self) -> Result<(), TransportError> {
        self.flush()?;
        self.comm.finish();
        Ok(())
    }
}
