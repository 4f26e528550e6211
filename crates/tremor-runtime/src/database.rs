//! Raw tensors for every canonical entry.
//!
//! Entries are dealt out with the pair-level round robin. Workers ship
//! `(nt, t0, tensor)` triples to the coordinator, the only writer.

use crate::error::RunError;
use crate::perf::{Phase, PerfCounters, PerfReport};
use crate::progress::ProgressMeter;
use crate::scenario::{Scenario, compute_pair};
use serde::Serialize;
use std::path::Path;
use tremor_bd::{AccessMode, GreenDatabase, read_pairs};
use tremor_kernel::{COORDINATOR, GreenKernel, PairSchedule};
use tremor_transport::{Communicator, ExecutionContext, recv_green, send_green};

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseReport {
    pub entries: usize,
    pub perf: PerfReport,
}

pub fn build_database<C: Communicator>(
    ctx: &mut ExecutionContext<C>,
    scenario: &Scenario,
    kernel: &dyn GreenKernel,
    dir: &Path,
    progress_every: usize,
) -> Result<Option<DatabaseReport>, RunError> {
    let rank = ctx.rank();
    let header = read_pairs(dir)?;
    header.ensure_scenario(&scenario.digest(&header.tolerance())?)?;

    let schedule = PairSchedule::new(ctx.layout());
    let mut db = if ctx.is_coordinator() {
        let mut db = GreenDatabase::open(dir, AccessMode::ReadWrite)?;
        db.reset_group()?;
        Some(db)
    } else {
        None
    };

    let total = header.len();
    let mut perf = PerfCounters::new();
    let mut progress = ProgressMeter::new("database", rank, total, progress_every);
    let mut cursor = schedule.cursor();
    for (entry, &[station, source]) in header.pairs_to_compute.iter().enumerate() {
        if !cursor.is_due(entry) {
            continue;
        }
        cursor.advance();

        let (t0, tdata) = if schedule.computes() {
            let (raw, tdata) =
                perf.time(Phase::Core, || compute_pair(scenario, kernel, station, source))?;
            if ctx.layout().is_distributed() {
                perf.time(Phase::Send, || {
                    send_green(ctx, COORDINATOR, entry, raw.t0, &tdata)
                })?;
                continue;
            }
            (raw.t0, tdata)
        } else {
            let sender = schedule.sender_of(entry);
            perf.time(Phase::Recv, || recv_green(ctx, sender, entry))?
        };

        if let Some(db) = db.as_mut() {
            perf.time(Phase::Add, || db.put_entry(entry, t0, &tdata))?;
            progress.tick();
        }
    }

    if let Some(db) = &db {
        db.flush()?;
    }
    let perf = perf.reduce(ctx)?;
    Ok(perf.map(|perf| {
        perf.log();
        tracing::info!(rank, entries = total, dir = %dir.display(), "database built");
        DatabaseReport {
            entries: total,
            perf,
        }
    }))
}
