//! Tolerance-based geometry deduplication.
//!
//! Reduces the full pair set to canonical entries such that every pair is
//! strictly within tolerance of at least one of them on all three axes:
//!
//! 1. optional binning keeps the first pair of every occupied bin,
//! 2. a greedy pass accepts a candidate unless an accepted entry already
//!    covers it,
//! 3. coverage is verified over the whole pair set,
//! 4. uncovered pairs are re-binned with a tighter factor and accepted
//!    greedily until none remain.
//!
//! Each refinement accepts at least the first uncovered candidate, so for
//! positive tolerances the uncovered set shrinks every round. Zero
//! tolerances cannot cover anything and end in `CoverageStalled`.
//!
//! `Deduplicator::run` is the single-process driver. The distributed driver
//! in the runtime crate calls the same steps with the verification spread
//! over block partitions.

mod binning;
mod canonical;
mod coverage;
mod table;

pub use binning::bin_candidates;
pub use canonical::{CanonicalPair, CanonicalSet, LookupStrategy};
pub use coverage::{CoverageStep, CoverageTracker, uncovered_in};
pub use table::PairTable;

use crate::error::DedupError;
use crate::geometry::{GeometryKey, Tolerance};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub tolerance: Tolerance,
    /// Bin width as a fraction of the tolerance for the first pass;
    /// `None` sends every pair to the greedy pass.
    pub bin_factor: Option<f64>,
    pub refine_factor: f64,
    pub max_refinements: usize,
    pub max_canonical: Option<usize>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            bin_factor: Some(0.5),
            refine_factor: 0.99,
            max_refinements: 1000,
            max_canonical: None,
        }
    }
}

impl DedupConfig {
    pub fn validate(&self) -> Result<(), DedupError> {
        self.tolerance.validate()?;
        let factors = [
            ("bin_factor", self.bin_factor),
            ("refine_factor", Some(self.refine_factor)),
        ];
        for (name, value) in factors.into_iter().filter_map(|(n, f)| f.map(|v| (n, v))) {
            if !(value > 0.0 && value < 1.0) {
                return Err(DedupError::InvalidBinFactor { name, value });
            }
        }
        Ok(())
    }
}

/// One verification round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationReport {
    pub iteration: usize,
    pub candidates: usize,
    pub accepted: usize,
    pub canonical: usize,
    pub uncovered: usize,
}

#[derive(Debug, Clone)]
pub struct DedupOutcome {
    pub canonical: Vec<CanonicalPair>,
    pub set: CanonicalSet,
    pub reports: Vec<IterationReport>,
}

impl DedupOutcome {
    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }
}

/// Accumulates canonical entries across passes.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    config: DedupConfig,
    set: CanonicalSet,
    canonical: Vec<CanonicalPair>,
    reports: Vec<IterationReport>,
}

impl Deduplicator {
    pub fn new(config: DedupConfig) -> Result<Self, DedupError> {
        config.validate()?;
        Ok(Self {
            config,
            set: CanonicalSet::new(config.tolerance),
            canonical: Vec::new(),
            reports: Vec::new(),
        })
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    pub fn set(&self) -> &CanonicalSet {
        &self.set
    }

    pub fn canonical(&self) -> &[CanonicalPair] {
        &self.canonical
    }

    /// Keys accepted since entry `from`, for shipping to other ranks.
    pub fn keys_since(&self, from: usize) -> &[GeometryKey] {
        &self.set.keys()[from.min(self.set.len())..]
    }

    pub fn candidates(
        &self,
        table: &PairTable,
        indices: &[usize],
        factor: Option<f64>,
    ) -> Result<Vec<usize>, DedupError> {
        match factor {
            Some(f) => bin_candidates(table, indices, &self.config.tolerance, f),
            None => Ok(indices.to_vec()),
        }
    }

    /// Greedy acceptance in candidate order; returns how many were taken.
    pub fn accept(&mut self, table: &PairTable, candidates: &[usize]) -> Result<usize, DedupError> {
        let mut accepted = 0;
        for &index in candidates {
            let geometry = table.geometry(index)?;
            if self.set.covers(&geometry.key) {
                continue;
            }
            if let Some(max) = self.config.max_canonical.filter(|&max| self.set.len() >= max) {
                return Err(DedupError::CanonicalOverflow { max });
            }
            self.set.push(geometry.key);
            self.canonical.push(CanonicalPair {
                pair: table.pair(index)?,
                geometry,
            });
            accepted += 1;
        }
        Ok(accepted)
    }

    /// Binning plus greedy acceptance over every pair of `table`.
    pub fn first_pass(&mut self, table: &PairTable) -> Result<(usize, usize), DedupError> {
        let all: Vec<usize> = table.indices().collect();
        let candidates = self.candidates(table, &all, self.config.bin_factor)?;
        let accepted = self.accept(table, &candidates)?;
        Ok((candidates.len(), accepted))
    }

    /// Re-bin the uncovered subset and accept among it.
    pub fn refine(
        &mut self,
        table: &PairTable,
        uncovered: &[usize],
    ) -> Result<(usize, usize), DedupError> {
        let candidates = self.candidates(table, uncovered, Some(self.config.refine_factor))?;
        let accepted = self.accept(table, &candidates)?;
        Ok((candidates.len(), accepted))
    }

    pub fn record(&mut self, report: IterationReport) {
        self.reports.push(report);
    }

    pub fn reports(&self) -> &[IterationReport] {
        &self.reports
    }

    pub fn into_outcome(self) -> DedupOutcome {
        DedupOutcome {
            canonical: self.canonical,
            set: self.set,
            reports: self.reports,
        }
    }

    /// Single-process deduplication of `table`.
    pub fn run(config: DedupConfig, table: &PairTable) -> Result<DedupOutcome, DedupError> {
        let mut dedup = Self::new(config)?;
        let mut tracker = CoverageTracker::new(config.max_refinements);
        let (mut candidates, mut accepted) = dedup.first_pass(table)?;
        let mut uncovered = uncovered_in(&dedup.set, table, table.indices())?;
        loop {
            dedup.record(IterationReport {
                iteration: tracker.iteration(),
                candidates,
                accepted,
                canonical: dedup.set.len(),
                uncovered: uncovered.len(),
            });
            match tracker.observe(uncovered.len())? {
                CoverageStep::Complete => break,
                CoverageStep::Refine => {
                    (candidates, accepted) = dedup.refine(table, &uncovered)?;
                    uncovered = uncovered_in(&dedup.set, table, uncovered)?;
                }
            }
        }
        Ok(dedup.into_outcome())
    }
}
