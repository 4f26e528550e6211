//! Work ownership.
//!
//! Three policies, all pure functions of `(rank, nprocs, index)`:
//!
//! - **pair-level round robin**: with one process it owns everything; with
//!   more, the coordinator visits every pair to receive while worker `r`
//!   owns pair `i` iff `i % (P-1) == r-1`.
//! - **station-level round robin**: process `r` owns station `i` iff
//!   `i % P == r`, coordinator included.
//! - **block partition**: rank `r` owns `[r*N/P, (r+1)*N/P)`.
//!
//! No process ever needs to ask another what it owns.

use crate::error::ScheduleError;
use serde::Serialize;
use std::ops::Range;

pub const COORDINATOR: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessRole {
    Coordinator,
    Worker,
}

/// Rank and process count of one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessLayout {
    rank: usize,
    nprocs: usize,
}

impl ProcessLayout {
    pub fn new(rank: usize, nprocs: usize) -> Result<Self, ScheduleError> {
        if nprocs == 0 {
            return Err(ScheduleError::NoProcesses);
        }
        if rank >= nprocs {
            return Err(ScheduleError::RankOutOfRange { rank, nprocs });
        }
        Ok(Self { rank, nprocs })
    }

    pub fn single() -> Self {
        Self { rank: 0, nprocs: 1 }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn nprocs(&self) -> usize {
        self.nprocs
    }

    pub fn role(&self) -> ProcessRole {
        if self.rank == COORDINATOR {
            ProcessRole::Coordinator
        } else {
            ProcessRole::Worker
        }
    }

    pub fn is_coordinator(&self) -> bool {
        self.rank == COORDINATOR
    }

    pub fn is_distributed(&self) -> bool {
        self.nprocs > 1
    }
}

/// Pair-level round robin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PairSchedule {
    layout: ProcessLayout,
    offset: usize,
    skip: usize,
}

impl PairSchedule {
    pub fn new(layout: ProcessLayout) -> Self {
        let (offset, skip) = if layout.nprocs == 1 || layout.is_coordinator() {
            (0, 1)
        } else {
            (layout.rank - 1, layout.nprocs - 1)
        };
        Self {
            layout,
            offset,
            skip,
        }
    }

    pub fn layout(&self) -> ProcessLayout {
        self.layout
    }

    /// Whether this process evaluates kernels at all.
    pub fn computes(&self) -> bool {
        !self.layout.is_distributed() || !self.layout.is_coordinator()
    }

    /// Whether this process handles unit `i`: computes it, or receives it.
    pub fn visits(&self, i: usize) -> bool {
        i % self.skip == self.offset
    }

    /// Whether this process computes unit `i`.
    pub fn owns(&self, i: usize) -> bool {
        self.computes() && self.visits(i)
    }

    /// Rank that computes unit `i`.
    pub fn sender_of(&self, i: usize) -> usize {
        if self.layout.is_distributed() {
            i % (self.layout.nprocs - 1) + 1
        } else {
            COORDINATOR
        }
    }

    pub fn cursor(&self) -> Cursor {
        Cursor {
            next: self.offset,
            skip: self.skip,
        }
    }

    /// Units this process computes, in enumeration order.
    pub fn owned(&self, total: usize) -> impl Iterator<Item = usize> + '_ {
        (0..total).filter(move |&i| self.owns(i))
    }
}

/// Next-unit cursor advanced without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cursor {
    next: usize,
    skip: usize,
}

impl Cursor {
    pub fn next_unit(&self) -> usize {
        self.next
    }

    pub fn is_due(&self, i: usize) -> bool {
        i == self.next
    }

    pub fn advance(&mut self) {
        self.next += self.skip;
    }
}

/// Station-level round robin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StationSchedule {
    layout: ProcessLayout,
}

impl StationSchedule {
    pub fn new(layout: ProcessLayout) -> Self {
        Self { layout }
    }

    pub fn owns(&self, station: usize) -> bool {
        self.owner_of(station) == self.layout.rank
    }

    pub fn owner_of(&self, station: usize) -> usize {
        station % self.layout.nprocs
    }

    pub fn owned(&self, nstations: usize) -> impl Iterator<Item = usize> {
        (self.layout.rank..nstations).step_by(self.layout.nprocs)
    }

    /// Stations owned by `rank`, for the coordinator's gather loop.
    pub fn owned_by(&self, rank: usize, nstations: usize) -> impl Iterator<Item = usize> {
        (rank..nstations).step_by(self.layout.nprocs)
    }
}

/// Contiguous block partition of `0..total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockPartition {
    total: usize,
    nprocs: usize,
}

impl BlockPartition {
    pub fn new(total: usize, nprocs: usize) -> Result<Self, ScheduleError> {
        if nprocs == 0 {
            return Err(ScheduleError::NoProcesses);
        }
        Ok(Self { total, nprocs })
    }

    fn bound(&self, rank: usize) -> usize {
        (rank as u128 * self.total as u128 / self.nprocs as u128) as usize
    }

    pub fn range(&self, rank: usize) -> Range<usize> {
        let rank = rank.min(self.nprocs);
        self.bound(rank)..self.bound((rank + 1).min(self.nprocs))
    }

    pub fn owner_of(&self, i: usize) -> Option<usize> {
        if i >= self.total {
            return None;
        }
        (0..self.nprocs).find(|&r| self.range(r).contains(&i))
    }

    pub fn ranges(&self) -> Vec<Range<usize>> {
        (0..self.nprocs).map(|r| self.range(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(rank: usize, nprocs: usize) -> ProcessLayout {
        ProcessLayout::new(rank, nprocs).expect("layout should be valid")
    }

    #[test]
    fn single_process_owns_everything() {
        let s = PairSchedule::new(ProcessLayout::single());
        assert!(s.computes());
        assert_eq!(s.owned(5).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
        assert_eq!(s.sender_of(3), 0);
    }

    #[test]
    fn coordinator_visits_but_never_computes() {
        let s = PairSchedule::new(layout(0, 3));
        assert!(!s.computes());
        assert!((0..10).all(|i| s.visits(i)));
        assert_eq!(s.owned(10).count(), 0);
    }

    #[test]
    fn workers_partition_pairs_and_senders_agree() {
        let n = 17;
        let workers: Vec<PairSchedule> = (1..4).map(|r| PairSchedule::new(layout(r, 4))).collect();
        let coord = PairSchedule::new(layout(0, 4));
        for i in 0..n {
            let owners: Vec<usize> = workers
                .iter()
                .filter(|w| w.owns(i))
                .map(|w| w.layout().rank())
                .collect();
            assert_eq!(owners, vec![coord.sender_of(i)]);
        }
    }

    #[test]
    fn cursor_walks_owned_units() {
        let s = PairSchedule::new(layout(2, 3));
        let mut cursor = s.cursor();
        let mut seen = Vec::new();
        for i in 0..8 {
            if cursor.is_due(i) {
                seen.push(i);
                cursor.advance();
            }
        }
        assert_eq!(seen, s.owned(8).collect::<Vec<_>>());
        assert_eq!(seen, vec![1, 3, 5, 7]);
    }

    #[test]
    fn station_schedule_includes_coordinator() {
        let s = StationSchedule::new(layout(0, 3));
        assert_eq!(s.owned(7).collect::<Vec<_>>(), vec![0, 3, 6]);
        assert_eq!(s.owned_by(2, 7).collect::<Vec<_>>(), vec![2, 5]);
        assert_eq!(s.owner_of(4), 1);
    }

    #[test]
    fn block_partition_is_contiguous_and_exact() {
        let b = BlockPartition::new(10, 3).expect("partition should build");
        assert_eq!(b.ranges(), vec![0..3, 3..6, 6..10]);
        assert_eq!(b.owner_of(6), Some(2));
        assert_eq!(b.owner_of(10), None);
        let tiny = BlockPartition::new(1, 4).expect("partition should build");
        assert_eq!(tiny.ranges().iter().map(|r| r.len()).sum::<usize>(), 1);
    }

    #[test]
    fn layout_rejects_bad_ranks() {
        assert_eq!(ProcessLayout::new(0, 0), Err(ScheduleError::NoProcesses));
        assert_eq!(
            ProcessLayout::new(3, 3),
            Err(ScheduleError::RankOutOfRange { rank: 3, nprocs: 3 })
        );
    }
}
