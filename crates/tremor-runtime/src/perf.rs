//! Per-process phase timers, reduced across the job on the coordinator.

use serde::Serialize;
use std::time::{Duration, Instant};
use tremor_transport::{Communicator, ExecutionContext, ReduceOp, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Kernel evaluation or re-synthesis.
    Core,
    Send,
    Recv,
    /// Source time-function convolution.
    Conv,
    /// Accumulation into station responses.
    Add,
}

impl Phase {
    pub const ALL: [Phase; 5] = [Phase::Core, Phase::Send, Phase::Recv, Phase::Conv, Phase::Add];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Core => "core",
            Phase::Send => "send",
            Phase::Recv => "recv",
            Phase::Conv => "conv",
            Phase::Add => "add",
        }
    }

    fn slot(&self) -> usize {
        *self as usize
    }
}

#[derive(Debug, Clone)]
pub struct PerfCounters {
    started: Instant,
    totals: [Duration; 5],
}

impl Default for PerfCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            totals: [Duration::ZERO; 5],
        }
    }

    pub fn time<T>(&mut self, phase: Phase, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.totals[phase.slot()] += start.elapsed();
        out
    }

    pub fn elapsed(&self, phase: Phase) -> Duration {
        self.totals[phase.slot()]
    }

    pub fn wall(&self) -> Duration {
        self.started.elapsed()
    }

    /// Collective: every rank must call it. Returns the report on the
    /// coordinator.
    pub fn reduce<C: Communicator>(
        &self,
        ctx: &mut ExecutionContext<C>,
    ) -> Result<Option<PerfReport>, TransportError> {
        let wall = ctx.reduce_f64(self.wall().as_secs_f64(), ReduceOp::Max)?;
        let mut phases = Vec::with_capacity(Phase::ALL.len());
        for phase in Phase::ALL {
            let seconds = self.elapsed(phase).as_secs_f64();
            let max = ctx.reduce_f64(seconds, ReduceOp::Max)?;
            let min = ctx.reduce_f64(seconds, ReduceOp::Min)?;
            if let (Some(max), Some(min)) = (max, min) {
                phases.push(PhaseStat {
                    phase,
                    max_seconds: max,
                    min_seconds: min,
                    max_percent: 0.0,
                });
            }
        }
        Ok(wall.map(|wall_seconds| {
            for stat in &mut phases {
                stat.max_percent = if wall_seconds > 0.0 {
                    100.0 * stat.max_seconds / wall_seconds
                } else {
                    0.0
                };
            }
            PerfReport {
                wall_seconds,
                phases,
            }
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseStat {
    pub phase: Phase,
    pub max_seconds: f64,
    pub min_seconds: f64,
    /// `max_seconds` as a share of the slowest rank's wall time.
    pub max_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerfReport {
    pub wall_seconds: f64,
    pub phases: Vec<PhaseStat>,
}

impl PerfReport {
    pub fn log(&self) {
        for stat in &self.phases {
            tracing::info!(
                rank = 0,
                phase = stat.phase.as_str(),
                max_s = format_args!("{:.3}", stat.max_seconds),
                min_s = format_args!("{:.3}", stat.min_seconds),
                percent = format_args!("{:.1}", stat.max_percent),
                "timing"
            );
        }
        tracing::info!(
            rank = 0,
            wall_s = format_args!("{:.3}", self.wall_seconds),
            "total wall time"
        );
    }
}
