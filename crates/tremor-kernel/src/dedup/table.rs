//! Per-pair geometry arrays.

use crate::enumerate::{Pair, PairEnumerator};
use crate::error::DedupError;
use crate::geometry::{GeometryKey, PairGeometry, PointSource, Station};
use std::ops::Range;

/// Struct-of-arrays geometry for a contiguous range of pair indices.
///
/// Indices passed to accessors are global pair indices, so a rank holding
/// only its block slice uses the same numbering as the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct PairTable {
    enumerator: PairEnumerator,
    start: usize,
    dh: Vec<f64>,
    z_rec: Vec<f64>,
    z_src: Vec<f64>,
    dd: Vec<f64>,
    dv: Vec<f64>,
}

impl PairTable {
    pub fn build(stations: &[Station], sources: &[PointSource]) -> Self {
        let total = stations.len() * sources.len();
        Self::build_range(stations, sources, 0..total)
    }

    pub fn build_range(stations: &[Station], sources: &[PointSource], range: Range<usize>) -> Self {
        let enumerator = PairEnumerator::new(stations.len(), sources.len());
        let end = range.end.min(enumerator.len());
        let start = range.start.min(end);
        let n = end - start;
        let mut table = Self {
            enumerator,
            start,
            dh: Vec::with_capacity(n),
            z_rec: Vec::with_capacity(n),
            z_src: Vec::with_capacity(n),
            dd: Vec::with_capacity(n),
            dv: Vec::with_capacity(n),
        };
        for pair in (start..end).filter_map(|i| enumerator.pair_at(i)) {
            let g = PairGeometry::between(
                &sources[pair.source].position,
                &stations[pair.station].position,
            );
            table.dh.push(g.key.dh);
            table.z_rec.push(g.key.z_rec);
            table.z_src.push(g.key.z_src);
            table.dd.push(g.dd);
            table.dv.push(g.dv);
        }
        table
    }

    pub fn enumerator(&self) -> PairEnumerator {
        self.enumerator
    }

    pub fn indices(&self) -> Range<usize> {
        self.start..self.start + self.dh.len()
    }

    pub fn len(&self) -> usize {
        self.dh.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dh.is_empty()
    }

    fn local(&self, index: usize) -> Result<usize, DedupError> {
        let range = self.indices();
        if !range.contains(&index) {
            return Err(DedupError::IndexOutOfRange {
                index,
                start: range.start,
                end: range.end,
            });
        }
        Ok(index - self.start)
    }

    pub fn key(&self, index: usize) -> Result<GeometryKey, DedupError> {
        let k = self.local(index)?;
        Ok(GeometryKey::new(self.dh[k], self.z_rec[k], self.z_src[k]))
    }

    pub fn geometry(&self, index: usize) -> Result<PairGeometry, DedupError> {
        let k = self.local(index)?;
        Ok(PairGeometry {
            key: GeometryKey::new(self.dh[k], self.z_rec[k], self.z_src[k]),
            dd: self.dd[k],
            dv: self.dv[k],
        })
    }

    pub fn pair(&self, index: usize) -> Result<Pair, DedupError> {
        self.local(index)?;
        self.enumerator
            .pair_at(index)
            .ok_or(DedupError::IndexOutOfRange {
                index,
                start: 0,
                end: self.enumerator.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene() -> (Vec<Station>, Vec<PointSource>) {
        let stations = vec![Station::new([1.0, 0.0, 0.0]), Station::new([0.0, 2.0, 0.1])];
        let sources = vec![
            PointSource::new([0.0, 0.0, 1.0], [0.0; 3]),
            PointSource::new([0.0, 0.0, 2.0], [0.0; 3]),
        ];
        (stations, sources)
    }

    #[test]
    fn range_table_uses_global_indices() {
        let (stations, sources) = scene();
        let full = PairTable::build(&stations, &sources);
        let part = PairTable::build_range(&stations, &sources, 2..4);
        assert_eq!(full.len(), 4);
        assert_eq!(part.indices(), 2..4);
        assert_eq!(part.key(3).expect("in range"), full.key(3).expect("in range"));
        assert_eq!(part.key(3).expect("in range").dh, 2.0);
        assert!(matches!(
            part.key(1),
            Err(DedupError::IndexOutOfRange { index: 1, start: 2, end: 4 })
        ));
    }

    #[test]
    fn pair_decodes_station_and_source() {
        let (stations, sources) = scene();
        let table = PairTable::build(&stations, &sources);
        let pair = table.pair(3).expect("pair 3");
        assert_eq!((pair.station, pair.source), (1, 1));
        let g = table.geometry(1).expect("geometry 1");
        assert_eq!(g.dv, 2.0);
    }
}
