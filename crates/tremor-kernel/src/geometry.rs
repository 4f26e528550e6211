//! Sources, stations and the reduced geometry of a pair.
//!
//! Positions are `[x, y, z]` with `z` positive down. Under a fixed layered
//! medium the kernel output for a pair depends on the pair only through its
//! horizontal distance and the two depths, so `GeometryKey` keeps exactly
//! those three numbers.

use crate::error::DedupError;
use crate::stf::SourceTimeFunction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `[x, y, z]`, `z` positive down.
pub type Position = [f64; 3];

/// A point source: position, orientation, time function and travel-time shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSource {
    pub position: Position,

    /// Strike, dip and rake in degrees.
    #[serde(default)]
    pub angles: [f64; 3],

    /// Time shift added to every trace this source produces.
    #[serde(default)]
    pub tt: f64,

    #[serde(default)]
    pub stf: SourceTimeFunction,
}

impl PointSource {
    pub fn new(position: Position, angles: [f64; 3]) -> Self {
        Self {
            position,
            angles,
            tt: 0.0,
            stf: SourceTimeFunction::default(),
        }
    }

    pub fn with_tt(mut self, tt: f64) -> Self {
        self.tt = tt;
        self
    }

    pub fn with_stf(mut self, stf: SourceTimeFunction) -> Self {
        self.stf = stf;
        self
    }
}

/// A receiver station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub position: Position,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Free-form metadata passed through to station writers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Station {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            name: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Per-axis equivalence tolerances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub delta_h: f64,
    pub delta_v_src: f64,
    pub delta_v_rec: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            delta_h: 0.04,
            delta_v_src: 0.2,
            delta_v_rec: 0.002,
        }
    }
}

impl Tolerance {
    pub fn new(delta_h: f64, delta_v_src: f64, delta_v_rec: f64) -> Self {
        Self {
            delta_h,
            delta_v_src,
            delta_v_rec,
        }
    }

    /// Reject negative or non-finite tolerances.
    ///
    /// Zero is accepted here: it is legal input that can never cover
    /// anything, and the refinement loop reports it as a stall.
    pub fn validate(&self) -> Result<(), DedupError> {
        for (name, value) in [
            ("delta_h", self.delta_h),
            ("delta_v_src", self.delta_v_src),
            ("delta_v_rec", self.delta_v_rec),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DedupError::InvalidTolerance { name, value });
            }
        }
        Ok(())
    }

    /// Whether every axis has a strictly positive tolerance.
    pub fn is_positive(&self) -> bool {
        self.delta_h > 0.0 && self.delta_v_src > 0.0 && self.delta_v_rec > 0.0
    }
}

/// The reduced descriptor used for tolerance comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryKey {
    pub dh: f64,
    pub z_rec: f64,
    pub z_src: f64,
}

impl GeometryKey {
    pub fn new(dh: f64, z_rec: f64, z_src: f64) -> Self {
        Self { dh, z_rec, z_src }
    }

    pub fn between(source: &Position, receiver: &Position) -> Self {
        let dx = receiver[0] - source[0];
        let dy = receiver[1] - source[1];
        Self {
            dh: (dx * dx + dy * dy).sqrt(),
            z_rec: receiver[2],
            z_src: source[2],
        }
    }

    /// Strictly within tolerance on all three axes at once.
    pub fn within(&self, other: &GeometryKey, tolerance: &Tolerance) -> bool {
        (self.dh - other.dh).abs() < tolerance.delta_h
            && (self.z_src - other.z_src).abs() < tolerance.delta_v_src
            && (self.z_rec - other.z_rec).abs() < tolerance.delta_v_rec
    }

    /// Summed absolute axis differences.
    pub fn l1_distance(&self, other: &GeometryKey) -> f64 {
        (self.dh - other.dh).abs()
            + (self.z_src - other.z_src).abs()
            + (self.z_rec - other.z_rec).abs()
    }
}

/// Key plus the auxiliary distances persisted alongside canonical pairs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairGeometry {
    pub key: GeometryKey,
    /// 3D distance.
    pub dd: f64,
    /// Vertical distance.
    pub dv: f64,
}

impl PairGeometry {
    pub fn between(source: &Position, receiver: &Position) -> Self {
        let key = GeometryKey::between(source, receiver);
        let dv = (receiver[2] - source[2]).abs();
        Self {
            key,
            dd: (key.dh * key.dh + dv * dv).sqrt(),
            dv,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_projects_horizontal_distance_and_depths() {
        let key = GeometryKey::between(&[0.0, 0.0, 2.0], &[3.0, 4.0, 0.5]);
        assert_eq!(key.dh, 5.0);
        assert_eq!(key.z_src, 2.0);
        assert_eq!(key.z_rec, 0.5);
    }

    #[test]
    fn within_requires_every_axis() {
        let tol = Tolerance::new(0.1, 0.1, 0.1);
        let a = GeometryKey::new(1.0, 0.0, 1.0);
        assert!(a.within(&GeometryKey::new(1.05, 0.05, 0.95), &tol));
        assert!(!a.within(&GeometryKey::new(1.05, 0.2, 0.95), &tol));
        assert!(!a.within(&a, &Tolerance::new(0.0, 0.1, 0.1)));
    }

    #[test]
    fn validate_rejects_negative_and_nan() {
        assert!(Tolerance::default().validate().is_ok());
        assert!(Tolerance::new(0.0, 0.0, 0.0).validate().is_ok());
        assert!(Tolerance::new(-0.1, 0.2, 0.002).validate().is_err());
        assert!(Tolerance::new(0.1, f64::NAN, 0.002).validate().is_err());
    }

    #[test]
    fn pair_geometry_distances() {
        let g = PairGeometry::between(&[0.0, 0.0, 4.0], &[3.0, 0.0, 0.0]);
        assert_eq!(g.key.dh, 3.0);
        assert_eq!(g.dv, 4.0);
        assert_eq!(g.dd, 5.0);
    }
}
