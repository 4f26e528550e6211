//! Uniform binning used to thin candidates before the precise pass.

use crate::dedup::table::PairTable;
use crate::error::DedupError;
use crate::geometry::Tolerance;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct Axis {
    min: f64,
    width: f64,
}

impl Axis {
    fn over(values: impl Iterator<Item = f64>, width: f64) -> Self {
        Self {
            min: values.fold(f64::INFINITY, f64::min),
            width,
        }
    }

    fn bin(&self, value: f64) -> u64 {
        if self.width > 0.0 && self.width.is_finite() {
            ((value - self.min) / self.width).floor() as u64
        } else {
            value.to_bits()
        }
    }
}

/// First index of every occupied bin, in ascending index order.
///
/// `indices` must be ascending. Bin widths are `tolerance * factor` per
/// axis; an axis whose width is not positive puts every distinct value in
/// its own bin.
pub fn bin_candidates(
    table: &PairTable,
    indices: &[usize],
    tolerance: &Tolerance,
    factor: f64,
) -> Result<Vec<usize>, DedupError> {
    if indices.is_empty() {
        return Ok(Vec::new());
    }
    let keys = indices
        .iter()
        .map(|&i| table.key(i))
        .collect::<Result<Vec<_>, _>>()?;

    let dh = Axis::over(keys.iter().map(|k| k.dh), tolerance.delta_h * factor);
    let zr = Axis::over(keys.iter().map(|k| k.z_rec), tolerance.delta_v_rec * factor);
    let zs = Axis::over(keys.iter().map(|k| k.z_src), tolerance.delta_v_src * factor);

    let mut first: HashMap<(u64, u64, u64), usize> = HashMap::new();
    for (&index, key) in indices.iter().zip(&keys) {
        first
            .entry((dh.bin(key.dh), zr.bin(key.z_rec), zs.bin(key.z_src)))
            .or_insert(index);
    }
    let mut candidates: Vec<usize> = first.into_values().collect();
    candidates.sort_unstable();
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{PointSource, Station};

    fn line_table(xs: &[f64]) -> PairTable {
        let stations: Vec<Station> = xs.iter().map(|&x| Station::new([x, 0.0, 0.0])).collect();
        let sources = vec![PointSource::new([0.0, 0.0, 1.0], [0.0; 3])];
        PairTable::build(&stations, &sources)
    }

    #[test]
    fn keeps_first_pair_per_bin() {
        let table = line_table(&[0.0, 0.01, 0.5, 0.51, 0.02]);
        let tol = Tolerance::new(0.1, 0.2, 0.002);
        let all: Vec<usize> = table.indices().collect();
        let candidates = bin_candidates(&table, &all, &tol, 0.5).expect("binning should work");
        assert_eq!(candidates, vec![0, 2]);
    }

    #[test]
    fn zero_width_falls_back_to_exact_values() {
        let table = line_table(&[0.0, 0.0, 0.3]);
        let tol = Tolerance::new(0.0, 0.0, 0.0);
        let all: Vec<usize> = table.indices().collect();
        let candidates = bin_candidates(&table, &all, &tol, 0.5).expect("binning should work");
        assert_eq!(candidates, vec![0, 2]);
    }

    #[test]
    fn subset_binning_only_sees_the_subset() {
        let table = line_table(&[0.0, 0.01, 0.5, 0.51]);
        let tol = Tolerance::new(0.1, 0.2, 0.002);
        let candidates = bin_candidates(&table, &[1, 3], &tol, 0.99).expect("binning should work");
        assert_eq!(candidates, vec![1, 3]);
    }
}
