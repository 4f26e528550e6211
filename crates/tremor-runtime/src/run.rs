//! The three ways of producing station responses.
//!
//! - `run_direct`: pair-level round robin, kernel evaluated for every pair.
//! - `run_fast`: pair-level round robin, traces re-synthesized from the
//!   closest canonical entry of a prebuilt database.
//! - `run_faster`: station-level round robin with database lookup; each
//!   rank accumulates whole stations and ships one response per station.
//!
//! In the pair-level modes the coordinator computes nothing once there is
//! more than one process; it visits every pair in enumeration order and
//! receives it from the rank that owns it.

use crate::error::RunError;
use crate::options::RunOptions;
use crate::perf::{Phase, PerfCounters, PerfReport};
use crate::progress::ProgressMeter;
use crate::scenario::{RawTraces, Scenario, compute_pair, synthesize_pair};
use crate::writer::StationWriter;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tremor_bd::{AccessMode, GreenDatabase};
use tremor_kernel::{
    COORDINATOR, CanonicalSet, GeometryKey, GreenKernel, LookupStrategy, Pair, PairSchedule,
    StationResponse, StationSchedule, TimedTraces,
};
use tremor_transport::{
    Communicator, ExecutionContext, ReduceOp, recv_traces, send_skip, send_traces,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Direct,
    Fast,
    Faster,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Direct => "direct",
            RunMode::Fast => "fast",
            RunMode::Faster => "faster",
        }
    }
}

/// Coordinator summary of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub nprocs: usize,
    pub stations: usize,
    pub pairs: usize,
    /// Pairs with no canonical entry, summed over ranks.
    pub skipped: usize,
    pub perf: PerfReport,
}

/// Where traces for a pair come from.
enum Resolver<'a> {
    Direct(&'a dyn GreenKernel),
    Lookup(Lookup<'a>),
}

struct Lookup<'a> {
    kernel: &'a dyn GreenKernel,
    db: GreenDatabase,
    set: CanonicalSet,
    strategy: LookupStrategy,
    threshold: usize,
    skipped: usize,
}

impl<'a> Lookup<'a> {
    fn open(
        kernel: &'a dyn GreenKernel,
        scenario: &Scenario,
        dir: &Path,
        options: &RunOptions,
    ) -> Result<Self, RunError> {
        let db = GreenDatabase::open(dir, AccessMode::ReadOnly)?;
        let header = db.require_header()?;
        let digest = scenario.digest(&header.tolerance())?;
        if header.ensure_scenario(&digest).is_err() {
            tracing::warn!(
                database = %header.scenario_digest,
                scenario = %digest,
                "database was built for another scenario; matching by geometry only"
            );
        }
        let set = header.canonical_set();
        Ok(Self {
            kernel,
            db,
            set,
            strategy: options.lookup,
            threshold: options.skip_threshold,
            skipped: 0,
        })
    }
}

impl Resolver<'_> {
    /// `None` when the pair has no canonical entry and was skipped.
    fn resolve(
        &mut self,
        scenario: &Scenario,
        pair: Pair,
        perf: &mut PerfCounters,
        rank: usize,
    ) -> Result<Option<RawTraces>, RunError> {
        match self {
            Resolver::Direct(kernel) => {
                let (raw, _) = perf.time(Phase::Core, || {
                    compute_pair(scenario, *kernel, pair.station, pair.source)
                })?;
                Ok(Some(raw))
            }
            Resolver::Lookup(lookup) => {
                let key = GeometryKey::between(
                    &scenario.source(pair.source)?.position,
                    &scenario.station(pair.station)?.position,
                );
                let Some(entry) = lookup.set.lookup(&key, lookup.strategy) else {
                    lookup.skipped += 1;
                    tracing::warn!(
                        rank,
                        pair = pair.index,
                        station = pair.station,
                        source = pair.source,
                        skipped = lookup.skipped,
                        "no canonical entry within tolerance"
                    );
                    if lookup.skipped > lookup.threshold {
                        return Err(RunError::SkipThreshold {
                            skipped: lookup.skipped,
                            threshold: lookup.threshold,
                        });
                    }
                    return Ok(None);
                };
                let tdata = lookup.db.tdata(entry)?;
                let kernel = lookup.kernel;
                let raw = perf.time(Phase::Core, || {
                    synthesize_pair(scenario, kernel, pair.station, pair.source, &tdata)
                })?;
                Ok(Some(raw))
            }
        }
    }

    fn skipped(&self) -> usize {
        match self {
            Resolver::Direct(_) => 0,
            Resolver::Lookup(lookup) => lookup.skipped,
        }
    }
}

/// Shaped traces are validated here so that malformed kernel output fails
/// the same way whether it is added locally or shipped to the coordinator.
fn shape(
    scenario: &Scenario,
    pair: Pair,
    raw: RawTraces,
    perf: &mut PerfCounters,
) -> Result<TimedTraces, RunError> {
    let source = scenario.source(pair.source)?;
    let traces = perf.time(Phase::Conv, || {
        scenario.shape_traces(source, raw.traces, raw.t0)
    });
    traces.validate()?;
    Ok(traces)
}

/// Every pair evaluated by the kernel.
pub fn run_direct<C: Communicator>(
    ctx: &mut ExecutionContext<C>,
    scenario: &Scenario,
    kernel: &dyn GreenKernel,
    writer: &mut dyn StationWriter,
    options: &RunOptions,
) -> Result<Option<RunReport>, RunError> {
    let mut resolver = Resolver::Direct(kernel);
    pair_level(ctx, scenario, &mut resolver, writer, options, RunMode::Direct)
}

/// Pair-level run against the database in `dir`.
pub fn run_fast<C: Communicator>(
    ctx: &mut ExecutionContext<C>,
    scenario: &Scenario,
    kernel: &dyn GreenKernel,
    dir: &Path,
    writer: &mut dyn StationWriter,
    options: &RunOptions,
) -> Result<Option<RunReport>, RunError> {
    let schedule = PairSchedule::new(ctx.layout());
    let mut resolver = if schedule.computes() {
        Resolver::Lookup(Lookup::open(kernel, scenario, dir, options)?)
    } else {
        Resolver::Direct(kernel)
    };
    pair_level(ctx, scenario, &mut resolver, writer, options, RunMode::Fast)
}

fn pair_level<C: Communicator>(
    ctx: &mut ExecutionContext<C>,
    scenario: &Scenario,
    resolver: &mut Resolver<'_>,
    writer: &mut dyn StationWriter,
    options: &RunOptions,
    mode: RunMode,
) -> Result<Option<RunReport>, RunError> {
    let rank = ctx.rank();
    let distributed = ctx.layout().is_distributed();
    let schedule = PairSchedule::new(ctx.layout());
    let pairs = scenario.enumerator();
    let mut perf = PerfCounters::new();
    let mut progress = ProgressMeter::new(mode.as_str(), rank, pairs.len(), options.progress_every);
    let mut cursor = schedule.cursor();
    tracing::info!(rank, mode = mode.as_str(), pairs = pairs.len(), "run started");

    for station in 0..scenario.nstations() {
        let mut response = ctx
            .is_coordinator()
            .then(|| StationResponse::new(scenario.window));
        for pair in pairs.station_pairs(station) {
            if !cursor.is_due(pair.index) {
                continue;
            }
            cursor.advance();

            let traces = if schedule.computes() {
                let traces = match resolver.resolve(scenario, pair, &mut perf, rank)? {
                    Some(raw) => Some(shape(scenario, pair, raw, &mut perf)?),
                    None => None,
                };
                if distributed {
                    perf.time(Phase::Send, || match &traces {
                        Some(traces) => send_traces(ctx, COORDINATOR, pair.index, traces),
                        None => send_skip(ctx, COORDINATOR, pair.index),
                    })?;
                    continue;
                }
                traces
            } else {
                let sender = schedule.sender_of(pair.index);
                perf.time(Phase::Recv, || recv_traces(ctx, sender, pair.index))?
            };

            if let (Some(response), Some(traces)) = (response.as_mut(), traces.as_ref()) {
                perf.time(Phase::Add, || response.add(traces))?;
            }
            if ctx.is_coordinator() {
                progress.tick();
            }
        }
        if let Some(response) = response {
            writer.write_station(station, scenario.station(station)?, &response)?;
        }
    }
    if ctx.is_coordinator() {
        writer.finish()?;
    }

    conclude(ctx, scenario, mode, resolver.skipped(), perf)
}

/// Station-level run against the database in `dir`.
pub fn run_faster<C: Communicator>(
    ctx: &mut ExecutionContext<C>,
    scenario: &Scenario,
    kernel: &dyn GreenKernel,
    dir: &Path,
    writer: &mut dyn StationWriter,
    options: &RunOptions,
) -> Result<Option<RunReport>, RunError> {
    let rank = ctx.rank();
    let nstations = scenario.nstations();
    let schedule = StationSchedule::new(ctx.layout());
    let pairs = scenario.enumerator();
    let mut resolver = Resolver::Lookup(Lookup::open(kernel, scenario, dir, options)?);
    let mut perf = PerfCounters::new();
    let owned: Vec<usize> = schedule.owned(nstations).collect();
    let mut progress = ProgressMeter::new("faster", rank, owned.len(), options.progress_every);
    tracing::info!(rank, stations = owned.len(), "run started");

    let mut mine = BTreeMap::new();
    for &station in &owned {
        let mut response = StationResponse::new(scenario.window);
        for pair in pairs.station_pairs(station) {
            if let Some(raw) = resolver.resolve(scenario, pair, &mut perf, rank)? {
                let traces = shape(scenario, pair, raw, &mut perf)?;
                perf.time(Phase::Add, || response.add(&traces))?;
            }
        }
        if ctx.is_coordinator() {
            mine.insert(station, response);
        } else {
            let timed = response.as_timed();
            perf.time(Phase::Send, || send_traces(ctx, COORDINATOR, station, &timed))?;
        }
        progress.tick();
    }

    if ctx.is_coordinator() {
        for worker in 1..ctx.nprocs() {
            for station in schedule.owned_by(worker, nstations) {
                let received = perf.time(Phase::Recv, || recv_traces(ctx, worker, station))?;
                let mut response = StationResponse::new(scenario.window);
                if let Some(traces) = received {
                    perf.time(Phase::Add, || response.absorb(&traces))?;
                }
                writer.write_station(station, scenario.station(station)?, &response)?;
            }
        }
        for (station, response) in &mine {
            writer.write_station(*station, scenario.station(*station)?, response)?;
        }
        writer.finish()?;
    }

    conclude(ctx, scenario, RunMode::Faster, resolver.skipped(), perf)
}

fn conclude<C: Communicator>(
    ctx: &mut ExecutionContext<C>,
    scenario: &Scenario,
    mode: RunMode,
    skipped: usize,
    perf: PerfCounters,
) -> Result<Option<RunReport>, RunError> {
    let skipped = ctx.reduce_usize(skipped, ReduceOp::Sum)?;
    let report = perf.reduce(ctx)?;
    let (Some(skipped), Some(perf)) = (skipped, report) else {
        return Ok(None);
    };
    perf.log();
    let report = RunReport {
        mode,
        nprocs: ctx.nprocs(),
        stations: scenario.nstations(),
        pairs: scenario.nstations() * scenario.nsources(),
        skipped,
        perf,
    };
    tracing::info!(
        rank = ctx.rank(),
        mode = mode.as_str(),
        stations = report.stations,
        skipped = report.skipped,
        "run finished"
    );
    Ok(Some(report))
}
