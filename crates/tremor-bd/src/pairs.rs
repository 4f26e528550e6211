//! `pairs.json`: the canonical pair set and its geometry arrays.

use crate::database::GROUP_FILE;
use crate::error::DatabaseError;
use crate::jsonl::{read_json, write_json_atomic};
use crate::lock::DatabaseLockGuard;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tremor_kernel::{CanonicalPair, CanonicalSet, GeometryKey, PointSource, Station, Tolerance};

pub const PAIRS_FILE: &str = "pairs.json";
pub const PAIRS_SCHEMA: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairsHeader {
    pub schema: u32,
    pub created_at: DateTime<Utc>,
    pub scenario_digest: String,
    pub nstations: usize,
    pub nsources: usize,
    /// `[station, source]` of every canonical entry, in entry order.
    pub pairs_to_compute: Vec<[usize; 2]>,
    pub dd_of_pairs: Vec<f64>,
    pub dh_of_pairs: Vec<f64>,
    pub dv_of_pairs: Vec<f64>,
    pub zrec_of_pairs: Vec<f64>,
    pub zsrc_of_pairs: Vec<f64>,
    pub delta_h: f64,
    pub delta_v_rec: f64,
    pub delta_v_src: f64,
}

impl PairsHeader {
    pub fn from_canonical(
        canonical: &[CanonicalPair],
        tolerance: &Tolerance,
        scenario_digest: String,
        nstations: usize,
        nsources: usize,
    ) -> Self {
        Self {
            schema: PAIRS_SCHEMA,
            created_at: Utc::now(),
            scenario_digest,
            nstations,
            nsources,
            pairs_to_compute: canonical
                .iter()
                .map(|c| [c.pair.station, c.pair.source])
                .collect(),
            dd_of_pairs: column(canonical, |c| c.geometry.dd),
            dh_of_pairs: column(canonical, |c| c.geometry.key.dh),
            dv_of_pairs: column(canonical, |c| c.geometry.dv),
            zrec_of_pairs: column(canonical, |c| c.geometry.key.z_rec),
            zsrc_of_pairs: column(canonical, |c| c.geometry.key.z_src),
            delta_h: tolerance.delta_h,
            delta_v_rec: tolerance.delta_v_rec,
            delta_v_src: tolerance.delta_v_src,
        }
    }

    pub fn len(&self) -> usize {
        self.pairs_to_compute.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs_to_compute.is_empty()
    }

    pub fn tolerance(&self) -> Tolerance {
        Tolerance::new(self.delta_h, self.delta_v_src, self.delta_v_rec)
    }

    pub fn key(&self, entry: usize) -> Option<GeometryKey> {
        Some(GeometryKey::new(
            *self.dh_of_pairs.get(entry)?,
            *self.zrec_of_pairs.get(entry)?,
            *self.zsrc_of_pairs.get(entry)?,
        ))
    }

    /// Lookup structure over the stored keys with the stored tolerances.
    pub fn canonical_set(&self) -> CanonicalSet {
        CanonicalSet::from_keys(
            self.tolerance(),
            (0..self.len()).filter_map(|entry| self.key(entry)),
        )
    }

    pub fn validate(&self) -> Result<(), DatabaseError> {
        if self.schema != PAIRS_SCHEMA {
            return Err(DatabaseError::Malformed(format!(
                "unsupported schema {} (expected {PAIRS_SCHEMA})",
                self.schema
            )));
        }
        let n = self.pairs_to_compute.len();
        for (name, len) in [
            ("dd_of_pairs", self.dd_of_pairs.len()),
            ("dh_of_pairs", self.dh_of_pairs.len()),
            ("dv_of_pairs", self.dv_of_pairs.len()),
            ("zrec_of_pairs", self.zrec_of_pairs.len()),
            ("zsrc_of_pairs", self.zsrc_of_pairs.len()),
        ] {
            if len != n {
                return Err(DatabaseError::Malformed(format!(
                    "{name} has {len} entries, pairs_to_compute has {n}"
                )));
            }
        }
        if let Some([station, source]) = self
            .pairs_to_compute
            .iter()
            .copied()
            .find(|&[st, so]| st >= self.nstations || so >= self.nsources)
        {
            return Err(DatabaseError::Malformed(format!(
                "pair ({station}, {source}) outside {}x{} scenario",
                self.nstations, self.nsources
            )));
        }
        Ok(())
    }

    pub fn ensure_scenario(&self, expected: &str) -> Result<(), DatabaseError> {
        if self.scenario_digest != expected {
            return Err(DatabaseError::ScenarioMismatch {
                expected: expected.to_string(),
                found: self.scenario_digest.clone(),
            });
        }
        Ok(())
    }
}

fn column(canonical: &[CanonicalPair], f: impl Fn(&CanonicalPair) -> f64) -> Vec<f64> {
    canonical.iter().map(f).collect()
}

/// SHA-256 over the canonical JSON of the stations, sources and tolerance.
pub fn scenario_digest(
    stations: &[Station],
    sources: &[PointSource],
    tolerance: &Tolerance,
) -> Result<String, DatabaseError> {
    let mut hasher = Sha256::new();
    for part in [
        serde_json::to_vec(stations),
        serde_json::to_vec(sources),
        serde_json::to_vec(tolerance),
    ] {
        let bytes = part.map_err(|e| DatabaseError::Serialize(e.to_string()))?;
        hasher.update(&bytes);
        hasher.update([0]);
    }
    Ok(format!("sha256:{:x}", hasher.finalize()))
}

/// Write `pairs.json` under the directory lock.
pub fn write_pairs(dir: &Path, header: &PairsHeader) -> Result<(), DatabaseError> {
    let _guard = DatabaseLockGuard::acquire(&dir.join(GROUP_FILE))?;
    write_json_atomic(&dir.join(PAIRS_FILE), header)
}

pub fn read_pairs(dir: &Path) -> Result<PairsHeader, DatabaseError> {
    let path = dir.join(PAIRS_FILE);
    if !path.exists() {
        return Err(DatabaseError::MissingHeader(path.display().to_string()));
    }
    let header: PairsHeader = read_json(&path)?;
    header.validate()?;
    Ok(header)
}
