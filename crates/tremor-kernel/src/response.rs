//! Station response accumulation.
//!
//! A station's response lives on a grid fixed at construction. Each
//! contribution is linearly interpolated onto that grid, zero outside its
//! own time span, and added. Addition is the only mutation, so the result
//! does not depend on arrival order beyond floating-point rounding.

use crate::error::AccumulationError;
use crate::green::ComponentTraces;
use serde::{Deserialize, Serialize};

/// Output grid `t_k = tmin + k*dt` for every `t_k < tmax`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputWindow {
    pub tmin: f64,
    pub tmax: f64,
    pub dt: f64,
}

impl OutputWindow {
    pub fn new(tmin: f64, tmax: f64, dt: f64) -> Result<Self, AccumulationError> {
        let window = Self { tmin, tmax, dt };
        window.validate()?;
        Ok(window)
    }

    pub fn validate(&self) -> Result<(), AccumulationError> {
        if !(self.tmin.is_finite() && self.tmax.is_finite()) {
            return Err(AccumulationError::InvalidWindow(
                "tmin and tmax must be finite".to_string(),
            ));
        }
        if self.tmax <= self.tmin {
            return Err(AccumulationError::InvalidWindow(format!(
                "tmax {} must exceed tmin {}",
                self.tmax, self.tmin
            )));
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(AccumulationError::InvalidWindow(format!(
                "dt {} must be positive",
                self.dt
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        let steps = (self.tmax - self.tmin) / self.dt;
        // absorb rounding so 100/0.05 does not grow an extra sample
        (steps - 1e-9).ceil().max(0.0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn time_at(&self, k: usize) -> f64 {
        self.tmin + k as f64 * self.dt
    }

    pub fn grid(&self) -> Vec<f64> {
        (0..self.len()).map(|k| self.time_at(k)).collect()
    }
}

/// Component series with their absolute time axis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimedTraces {
    pub z: Vec<f64>,
    pub e: Vec<f64>,
    pub n: Vec<f64>,
    pub t: Vec<f64>,
}

impl TimedTraces {
    /// Attach the time axis `start + k*dt`.
    pub fn from_traces(traces: ComponentTraces, start: f64, dt: f64) -> Self {
        let t = (0..traces.z.len()).map(|k| start + k as f64 * dt).collect();
        Self {
            z: traces.z,
            e: traces.e,
            n: traces.n,
            t,
        }
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn validate(&self) -> Result<(), AccumulationError> {
        let (z, e, n, t) = (self.z.len(), self.e.len(), self.n.len(), self.t.len());
        if z != t || e != t || n != t {
            return Err(AccumulationError::LengthMismatch { z, e, n, t });
        }
        if t < 2 {
            return Err(AccumulationError::TooShort(t));
        }
        for (component, series) in [("z", &self.z), ("e", &self.e), ("n", &self.n), ("t", &self.t)] {
            if let Some(index) = series.iter().position(|v| !v.is_finite()) {
                return Err(AccumulationError::NonFinite { component, index });
            }
        }
        if let Some(k) = self.t.windows(2).position(|w| w[1] <= w[0]) {
            return Err(AccumulationError::NonMonotonicTime(k + 1));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationResponse {
    window: OutputWindow,
    z: Vec<f64>,
    e: Vec<f64>,
    n: Vec<f64>,
    contributions: usize,
}

impl StationResponse {
    pub fn new(window: OutputWindow) -> Self {
        let len = window.len();
        Self {
            window,
            z: vec![0.0; len],
            e: vec![0.0; len],
            n: vec![0.0; len],
            contributions: 0,
        }
    }

    pub fn window(&self) -> &OutputWindow {
        &self.window
    }

    pub fn len(&self) -> usize {
        self.z.len()
    }

    pub fn is_empty(&self) -> bool {
        self.z.is_empty()
    }

    pub fn z(&self) -> &[f64] {
        &self.z
    }

    pub fn e(&self) -> &[f64] {
        &self.e
    }

    pub fn n(&self) -> &[f64] {
        &self.n
    }

    pub fn contributions(&self) -> usize {
        self.contributions
    }

    /// Interpolate `traces` onto the grid and add.
    pub fn add(&mut self, traces: &TimedTraces) -> Result<(), AccumulationError> {
        traces.validate()?;
        let t = &traces.t;
        let (first, last) = (t[0], t[t.len() - 1]);
        let mut seg = 0;
        for k in 0..self.len() {
            let g = self.window.time_at(k);
            if g < first || g > last {
                continue;
            }
            while seg + 2 < t.len() && t[seg + 1] < g {
                seg += 1;
            }
            let (t0, t1) = (t[seg], t[seg + 1]);
            let w = ((g - t0) / (t1 - t0)).clamp(0.0, 1.0);
            let lerp = |s: &[f64]| s[seg] + w * (s[seg + 1] - s[seg]);
            self.z[k] += lerp(&traces.z);
            self.e[k] += lerp(&traces.e);
            self.n[k] += lerp(&traces.n);
        }
        self.contributions += 1;
        Ok(())
    }

    /// Add a contribution already sampled on this station's grid.
    pub fn absorb(&mut self, traces: &TimedTraces) -> Result<(), AccumulationError> {
        traces.validate()?;
        if traces.len() != self.len() {
            return Err(AccumulationError::GridMismatch {
                expected: self.len(),
                actual: traces.len(),
            });
        }
        for k in 0..self.len() {
            self.z[k] += traces.z[k];
            self.e[k] += traces.e[k];
            self.n[k] += traces.n[k];
        }
        self.contributions += 1;
        Ok(())
    }

    /// Fold another response on the same grid into this one.
    pub fn merge(&mut self, other: &StationResponse) -> Result<(), AccumulationError> {
        if other.len() != self.len() {
            return Err(AccumulationError::GridMismatch {
                expected: self.len(),
                actual: other.len(),
            });
        }
        for k in 0..self.len() {
            self.z[k] += other.z[k];
            self.e[k] += other.e[k];
            self.n[k] += other.n[k];
        }
        self.contributions += other.contributions;
        Ok(())
    }

    pub fn as_timed(&self) -> TimedTraces {
        TimedTraces {
            z: self.z.clone(),
            e: self.e.clone(),
            n: self.n.clone(),
            t: self.window.grid(),
        }
    }
}
