//! The canonical set and lookups against it.

use crate::enumerate::Pair;
use crate::geometry::{GeometryKey, PairGeometry, Tolerance};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// A representative pair chosen by the deduplicator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPair {
    pub pair: Pair,
    pub geometry: PairGeometry,
}

/// How a pair is matched to a canonical entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupStrategy {
    /// Lowest-index entry within tolerance.
    First,
    /// Entry within tolerance with the smallest L1 distance.
    #[default]
    Best,
    /// Smallest L1 distance, tolerance ignored.
    Nearest,
}

impl LookupStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupStrategy::First => "first",
            LookupStrategy::Best => "best",
            LookupStrategy::Nearest => "nearest",
        }
    }
}

impl fmt::Display for LookupStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LookupStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(LookupStrategy::First),
            "best" => Ok(LookupStrategy::Best),
            "nearest" => Ok(LookupStrategy::Nearest),
            other => Err(format!(
                "unknown lookup strategy `{other}` (expected first, best or nearest)"
            )),
        }
    }
}

type Cell = (i64, i64, i64);

/// Accepted keys plus a uniform grid over them.
///
/// Grid cells are two tolerances wide per axis, so anything strictly within
/// tolerance of a key sits in the key's cell or a neighbour. With any
/// non-positive tolerance the grid is off and lookups scan linearly.
#[derive(Debug, Clone)]
pub struct CanonicalSet {
    tolerance: Tolerance,
    keys: Vec<GeometryKey>,
    grid: Option<HashMap<Cell, Vec<usize>>>,
}

impl CanonicalSet {
    pub fn new(tolerance: Tolerance) -> Self {
        Self {
            tolerance,
            keys: Vec::new(),
            grid: tolerance.is_positive().then(HashMap::new),
        }
    }

    pub fn from_keys(tolerance: Tolerance, keys: impl IntoIterator<Item = GeometryKey>) -> Self {
        let mut set = Self::new(tolerance);
        for key in keys {
            set.push(key);
        }
        set
    }

    pub fn tolerance(&self) -> &Tolerance {
        &self.tolerance
    }

    pub fn keys(&self) -> &[GeometryKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn cell(&self, key: &GeometryKey) -> Cell {
        let t = &self.tolerance;
        (
            (key.dh / (2.0 * t.delta_h)).floor() as i64,
            (key.z_rec / (2.0 * t.delta_v_rec)).floor() as i64,
            (key.z_src / (2.0 * t.delta_v_src)).floor() as i64,
        )
    }

    /// Append a key; returns its entry index.
    pub fn push(&mut self, key: GeometryKey) -> usize {
        let index = self.keys.len();
        let cell = self.tolerance.is_positive().then(|| self.cell(&key));
        if let (Some(grid), Some(cell)) = (self.grid.as_mut(), cell) {
            grid.entry(cell).or_default().push(index);
        }
        self.keys.push(key);
        index
    }

    /// Entry indices that may lie within tolerance of `key`, ascending.
    fn neighbours(&self, key: &GeometryKey) -> Vec<usize> {
        let Some(grid) = &self.grid else {
            return (0..self.keys.len()).collect();
        };
        let (a, b, c) = self.cell(key);
        let mut found = Vec::new();
        for da in -1..=1 {
            for db in -1..=1 {
                for dc in -1..=1 {
                    if let Some(bucket) = grid.get(&(a + da, b + db, c + dc)) {
                        found.extend_from_slice(bucket);
                    }
                }
            }
        }
        found.sort_unstable();
        found
    }

    pub fn covers(&self, key: &GeometryKey) -> bool {
        self.lookup(key, LookupStrategy::First).is_some()
    }

    /// Entry index matching `key` under `strategy`.
    pub fn lookup(&self, key: &GeometryKey, strategy: LookupStrategy) -> Option<usize> {
        match strategy {
            LookupStrategy::First => self
                .neighbours(key)
                .into_iter()
                .find(|&i| self.keys[i].within(key, &self.tolerance)),
            LookupStrategy::Best => {
                let within = self
                    .neighbours(key)
                    .into_iter()
                    .filter(|&i| self.keys[i].within(key, &self.tolerance));
                closest(within, &self.keys, key)
            }
            LookupStrategy::Nearest => closest(0..self.keys.len(), &self.keys, key),
        }
    }
}

/// Minimum L1 distance; the lowest index wins ties.
fn closest(
    indices: impl Iterator<Item = usize>,
    keys: &[GeometryKey],
    key: &GeometryKey,
) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for i in indices {
        let d = keys[i].l1_distance(key);
        if best.is_none_or(|(_, bd)| d < bd) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}
