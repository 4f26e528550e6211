//! Distributed construction of the canonical pair set.
//!
//! The coordinator owns the deduplicator and the full pair table. Coverage
//! verification is split over every rank with a block partition: after
//! each acceptance round the coordinator broadcasts the new keys, every
//! rank checks its slice against its mirror of the canonical set, and the
//! uncovered indices are gathered back in rank order. The gathered list is
//! ascending, so the result is identical to a single-process run.

use crate::error::RunError;
use crate::scenario::Scenario;
use serde::Serialize;
use std::path::Path;
use tremor_bd::{PairsHeader, write_pairs};
use tremor_kernel::{
    BlockPartition, CanonicalSet, CoverageStep, CoverageTracker, DedupConfig, DedupOutcome,
    Deduplicator, IterationReport, PairTable, uncovered_in,
};
use tremor_transport::{Communicator, ExecutionContext, TransportError, wire};

const STATUS_DONE: u8 = 0;
const STATUS_REFINE: u8 = 1;

struct Driver {
    dedup: Deduplicator,
    table: PairTable,
    tracker: CoverageTracker,
    last: (usize, usize),
}

pub fn distributed_dedup<C: Communicator>(
    ctx: &mut ExecutionContext<C>,
    scenario: &Scenario,
    config: &DedupConfig,
) -> Result<Option<DedupOutcome>, RunError> {
    config.validate()?;
    let rank = ctx.rank();
    let total = scenario.nstations() * scenario.nsources();
    let partition = BlockPartition::new(total, ctx.nprocs())?;
    let local = PairTable::build_range(
        &scenario.stations,
        &scenario.sources,
        partition.range(rank),
    );
    tracing::debug!(rank, slice = ?local.indices(), "coverage slice");

    let mut driver = if ctx.is_coordinator() {
        let table = scenario.pair_table();
        let mut dedup = Deduplicator::new(*config)?;
        let last = dedup.first_pass(&table)?;
        tracing::info!(
            rank,
            pairs = total,
            candidates = last.0,
            accepted = last.1,
            "first pass"
        );
        Some(Driver {
            dedup,
            table,
            tracker: CoverageTracker::new(config.max_refinements),
            last,
        })
    } else {
        None
    };

    let mut mirror = CanonicalSet::new(config.tolerance);
    let mut pending: Vec<usize> = local.indices().collect();
    loop {
        let fresh = match &driver {
            Some(d) => d.dedup.keys_since(mirror.len()).to_vec(),
            None => Vec::new(),
        };
        let count = decode_count(&ctx.broadcast(wire::encode_indices(&[fresh.len()]))?)?;
        let keys = wire::decode_keys(&ctx.broadcast(wire::encode_keys(&fresh))?)?;
        if keys.len() != count {
            return Err(TransportError::Protocol(format!(
                "announced {count} canonical keys, received {}",
                keys.len()
            ))
            .into());
        }
        for key in keys {
            mirror.push(key);
        }

        pending = uncovered_in(&mirror, &local, pending)?;
        let gathered = ctx.gatherv_indices(&pending)?;

        let status = match (&mut driver, gathered) {
            (Some(d), Some(uncovered)) => {
                d.dedup.record(IterationReport {
                    iteration: d.tracker.iteration(),
                    candidates: d.last.0,
                    accepted: d.last.1,
                    canonical: d.dedup.set().len(),
                    uncovered: uncovered.len(),
                });
                match d.tracker.observe(uncovered.len())? {
                    CoverageStep::Complete => STATUS_DONE,
                    CoverageStep::Refine => {
                        d.last = d.dedup.refine(&d.table, &uncovered)?;
                        tracing::info!(
                            rank,
                            iteration = d.tracker.iteration(),
                            uncovered = uncovered.len(),
                            accepted = d.last.1,
                            "refinement"
                        );
                        STATUS_REFINE
                    }
                }
            }
            _ => STATUS_DONE,
        };
        match ctx.broadcast(vec![status])?.as_slice() {
            [STATUS_DONE] => break,
            [STATUS_REFINE] => continue,
            other => {
                return Err(TransportError::Protocol(format!(
                    "unexpected dedup status {other:?}"
                ))
                .into());
            }
        }
    }

    Ok(driver.map(|d| d.dedup.into_outcome()))
}

fn decode_count(bytes: &[u8]) -> Result<usize, TransportError> {
    match wire::decode_indices(bytes)?.as_slice() {
        [n] => Ok(*n),
        other => Err(TransportError::Decode(format!(
            "expected one count, got {} values",
            other.len()
        ))),
    }
}

/// Coordinator summary of a pairs build.
#[derive(Debug, Clone, Serialize)]
pub struct PairsReport {
    pub pairs: usize,
    pub canonical: usize,
    pub scenario_digest: String,
    pub iterations: Vec<IterationReport>,
}

/// Deduplicate and write `pairs.json` into `dir`.
pub fn build_pairs<C: Communicator>(
    ctx: &mut ExecutionContext<C>,
    scenario: &Scenario,
    config: &DedupConfig,
    dir: &Path,
) -> Result<Option<PairsReport>, RunError> {
    let Some(outcome) = distributed_dedup(ctx, scenario, config)? else {
        return Ok(None);
    };
    let digest = scenario.digest(&config.tolerance)?;
    let header = PairsHeader::from_canonical(
        &outcome.canonical,
        &config.tolerance,
        digest.clone(),
        scenario.nstations(),
        scenario.nsources(),
    );
    std::fs::create_dir_all(dir).map_err(|e| {
        RunError::Database(tremor_bd::DatabaseError::Io {
            path: dir.display().to_string(),
            message: e.to_string(),
        })
    })?;
    write_pairs(dir, &header)?;
    tracing::info!(
        rank = ctx.rank(),
        canonical = outcome.len(),
        dir = %dir.display(),
        "wrote canonical pairs"
    );
    Ok(Some(PairsReport {
        pairs: scenario.nstations() * scenario.nsources(),
        canonical: outcome.len(),
        scenario_digest: digest,
        iterations: outcome.reports,
    }))
}
