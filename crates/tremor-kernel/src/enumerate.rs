//! Deterministic pair enumeration.
//!
//! Stations form the outer loop and sources the inner one, so the pair
//! index is `station * nsources + source`. Every process enumerates the
//! same sequence without communication.

use serde::{Deserialize, Serialize};

/// One (station, source) combination and its global index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pair {
    pub index: usize,
    pub station: usize,
    pub source: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairEnumerator {
    nstations: usize,
    nsources: usize,
}

impl PairEnumerator {
    pub fn new(nstations: usize, nsources: usize) -> Self {
        Self {
            nstations,
            nsources,
        }
    }

    pub fn nstations(&self) -> usize {
        self.nstations
    }

    pub fn nsources(&self) -> usize {
        self.nsources
    }

    pub fn len(&self) -> usize {
        self.nstations * self.nsources
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode a global index; `None` past the end.
    pub fn pair_at(&self, index: usize) -> Option<Pair> {
        if index >= self.len() {
            return None;
        }
        Some(Pair {
            index,
            station: index / self.nsources,
            source: index % self.nsources,
        })
    }

    pub fn index_of(&self, station: usize, source: usize) -> Option<usize> {
        (station < self.nstations && source < self.nsources)
            .then(|| station * self.nsources + source)
    }

    pub fn iter(&self) -> PairIter {
        PairIter {
            enumerator: *self,
            next: 0,
        }
    }

    /// The pairs of one station, in source order.
    pub fn station_pairs(&self, station: usize) -> impl Iterator<Item = Pair> + '_ {
        let start = station.min(self.nstations) * self.nsources;
        let end = if station < self.nstations {
            start + self.nsources
        } else {
            start
        };
        (start..end).filter_map(move |index| self.pair_at(index))
    }
}

impl IntoIterator for &PairEnumerator {
    type Item = Pair;
    type IntoIter = PairIter;

    fn into_iter(self) -> PairIter {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct PairIter {
    enumerator: PairEnumerator,
    next: usize,
}

impl Iterator for PairIter {
    type Item = Pair;

    fn next(&mut self) -> Option<Pair> {
        let pair = self.enumerator.pair_at(self.next)?;
        self.next += 1;
        Some(pair)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.enumerator.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PairIter {}
