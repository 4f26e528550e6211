//! Coverage verification and refinement progress.

use crate::dedup::canonical::CanonicalSet;
use crate::dedup::table::PairTable;
use crate::error::DedupError;
use serde::Serialize;

/// Indices among `indices` with no canonical entry within tolerance.
pub fn uncovered_in(
    set: &CanonicalSet,
    table: &PairTable,
    indices: impl IntoIterator<Item = usize>,
) -> Result<Vec<usize>, DedupError> {
    let mut uncovered = Vec::new();
    for index in indices {
        if !set.covers(&table.key(index)?) {
            uncovered.push(index);
        }
    }
    Ok(uncovered)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageStep {
    Complete,
    Refine,
}

/// Guards the refinement loop: the uncovered count must strictly shrink
/// and the number of refinements is bounded.
#[derive(Debug, Clone)]
pub struct CoverageTracker {
    limit: usize,
    iteration: usize,
    previous: Option<usize>,
}

impl CoverageTracker {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            iteration: 0,
            previous: None,
        }
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Record one verification result and decide what happens next.
    pub fn observe(&mut self, uncovered: usize) -> Result<CoverageStep, DedupError> {
        if uncovered == 0 {
            return Ok(CoverageStep::Complete);
        }
        if self.previous.is_some_and(|p| uncovered >= p) {
            return Err(DedupError::CoverageStalled {
                iteration: self.iteration,
                uncovered,
            });
        }
        if self.iteration >= self.limit {
            return Err(DedupError::RefinementLimit {
                limit: self.limit,
                uncovered,
            });
        }
        self.previous = Some(uncovered);
        self.iteration += 1;
        Ok(CoverageStep::Refine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shrinking_sets_refine_until_complete() {
        let mut t = CoverageTracker::new(10);
        assert_eq!(t.observe(5).expect("first"), CoverageStep::Refine);
        assert_eq!(t.observe(2).expect("second"), CoverageStep::Refine);
        assert_eq!(t.observe(0).expect("third"), CoverageStep::Complete);
        assert_eq!(t.iteration(), 2);
    }

    #[test]
    fn stall_is_an_error() {
        let mut t = CoverageTracker::new(10);
        t.observe(3).expect("first");
        assert!(matches!(
            t.observe(3),
            Err(DedupError::CoverageStalled { iteration: 1, uncovered: 3 })
        ));
    }

    #[test]
    fn limit_is_enforced() {
        let mut t = CoverageTracker::new(1);
        t.observe(3).expect("first");
        assert!(matches!(
            t.observe(2),
            Err(DedupError::RefinementLimit { limit: 1, uncovered: 2 })
        ));
    }
}
