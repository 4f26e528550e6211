//! Which pairs of the current scenario the database does not cover.

use crate::error::RunError;
use crate::scenario::Scenario;
use serde::Serialize;
use std::path::Path;
use tremor_bd::read_pairs;
use tremor_kernel::{BlockPartition, PairTable, uncovered_in};
use tremor_transport::{Communicator, ExecutionContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UncoveredPair {
    pub index: usize,
    pub station: usize,
    pub source: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub pairs: usize,
    pub canonical: usize,
    pub uncovered: Vec<UncoveredPair>,
}

impl CheckReport {
    pub fn is_covered(&self) -> bool {
        self.uncovered.is_empty()
    }
}

/// Every rank checks a contiguous slice of the pair sequence against the
/// stored keys; the coordinator gathers the uncovered indices in order.
pub fn check_pairs<C: Communicator>(
    ctx: &mut ExecutionContext<C>,
    scenario: &Scenario,
    dir: &Path,
) -> Result<Option<CheckReport>, RunError> {
    let rank = ctx.rank();
    let header = read_pairs(dir)?;
    let set = header.canonical_set();
    let total = scenario.nstations() * scenario.nsources();
    let partition = BlockPartition::new(total, ctx.nprocs())?;
    let local = PairTable::build_range(
        &scenario.stations,
        &scenario.sources,
        partition.range(rank),
    );
    let missing = uncovered_in(&set, &local, local.indices())?;
    tracing::debug!(rank, checked = local.len(), uncovered = missing.len(), "slice checked");

    let Some(gathered) = ctx.gatherv_indices(&missing)? else {
        return Ok(None);
    };
    let pairs = scenario.enumerator();
    let uncovered = gathered
        .into_iter()
        .map(|index| {
            pairs
                .pair_at(index)
                .map(|p| UncoveredPair {
                    index,
                    station: p.station,
                    source: p.source,
                })
                .ok_or(RunError::OutOfRange {
                    what: "pair",
                    index,
                    len: total,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if uncovered.is_empty() {
        tracing::info!(rank, pairs = total, canonical = set.len(), "every pair is covered");
    } else {
        tracing::warn!(
            rank,
            pairs = total,
            uncovered = uncovered.len(),
            "pairs without a canonical entry within tolerance"
        );
    }
    Ok(Some(CheckReport {
        pairs: total,
        canonical: set.len(),
        uncovered,
    }))
}
