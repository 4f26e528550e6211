//! Green's-function kernel boundary.
//!
//! The solver is an opaque collaborator behind `GreenKernel`. It returns a
//! raw `nt x 9` tensor that can be stored, the z/e/n traces synthesized
//! from that tensor for one source orientation and azimuth, and a time
//! offset `t0`. `synthesize` replays the second half from a stored tensor,
//! which is what database-backed runs do.
//!
//! `PulseKernel` is a deterministic stand-in used by tests and by the CLI
//! when no external solver is linked.

use crate::crust::CrustModel;
use crate::error::KernelError;
use crate::geometry::{PointSource, Station};
use serde::{Deserialize, Serialize};

/// Columns of a raw Green's tensor.
pub const GREEN_COMPONENTS: usize = 9;

/// Solver tuning scalars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    pub dt: f64,
    pub nfft: usize,
    pub tb: usize,
    pub smth: f64,
    pub sigma: f64,
    pub taper: f64,
    pub wc1: usize,
    pub wc2: usize,
    pub pmin: f64,
    pub pmax: f64,
    pub dk: f64,
    pub nx: usize,
    pub kc: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            dt: 0.05,
            nfft: 4096,
            tb: 1000,
            smth: 1.0,
            sigma: 2.0,
            taper: 0.9,
            wc1: 1,
            wc2: 2,
            pmin: 0.0,
            pmax: 1.0,
            dk: 0.3,
            nx: 1,
            kc: 15.0,
        }
    }
}

impl SolverParams {
    pub fn validate(&self) -> Result<(), KernelError> {
        let invalid = |name: &'static str, reason: &str| KernelError::InvalidParameter {
            name,
            reason: reason.to_string(),
        };
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(invalid("dt", "must be positive"));
        }
        if self.nfft < 2 {
            return Err(invalid("nfft", "must be at least 2"));
        }
        if !(0.0..=1.0).contains(&self.taper) {
            return Err(invalid("taper", "must lie in [0, 1]"));
        }
        if self.pmin > self.pmax {
            return Err(invalid("pmin", "must not exceed pmax"));
        }
        if self.wc1 > self.wc2 {
            return Err(invalid("wc1", "must not exceed wc2"));
        }
        if !(self.dk > 0.0) {
            return Err(invalid("dk", "must be positive"));
        }
        Ok(())
    }
}

/// Raw kernel output, row-major `nt x 9`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreenTensor {
    nt: usize,
    data: Vec<f64>,
}

impl GreenTensor {
    pub fn new(nt: usize, data: Vec<f64>) -> Result<Self, KernelError> {
        let expected = nt * GREEN_COMPONENTS;
        if data.len() != expected {
            return Err(KernelError::TensorShape {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { nt, data })
    }

    pub fn zeros(nt: usize) -> Self {
        Self {
            nt,
            data: vec![0.0; nt * GREEN_COMPONENTS],
        }
    }

    pub fn nt(&self) -> usize {
        self.nt
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    pub fn get(&self, row: usize, component: usize) -> f64 {
        self.data[row * GREEN_COMPONENTS + component]
    }

    fn set(&mut self, row: usize, component: usize, value: f64) {
        self.data[row * GREEN_COMPONENTS + component] = value;
    }
}

/// Vertical, east and north component series of equal length.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentTraces {
    pub z: Vec<f64>,
    pub e: Vec<f64>,
    pub n: Vec<f64>,
}

impl ComponentTraces {
    pub fn zeros(nt: usize) -> Self {
        Self {
            z: vec![0.0; nt],
            e: vec![0.0; nt],
            n: vec![0.0; nt],
        }
    }

    pub fn len(&self) -> usize {
        self.z.len()
    }

    pub fn is_empty(&self) -> bool {
        self.z.is_empty()
    }
}

/// Everything a solver needs for one pair.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelRequest {
    /// Crust with interfaces at both the source and receiver depths.
    pub crust: CrustModel,
    pub source_layer: usize,
    pub receiver_layer: usize,
    /// Strike, dip, rake in degrees.
    pub angles: [f64; 3],
    pub dh: f64,
    pub source_xy: [f64; 2],
    pub receiver_xy: [f64; 2],
    pub z_src: f64,
    pub z_rec: f64,
    pub params: SolverParams,
}

impl KernelRequest {
    pub fn new(
        crust: &CrustModel,
        source: &PointSource,
        station: &Station,
        params: &SolverParams,
    ) -> Result<Self, KernelError> {
        let z_src = source.position[2];
        let z_rec = station.position[2];
        let split = crust.split_at_depth(z_src)?.split_at_depth(z_rec)?;
        let source_layer = split.layer_index(z_src)?;
        let receiver_layer = split.layer_index(z_rec)?;
        let source_xy = [source.position[0], source.position[1]];
        let receiver_xy = [station.position[0], station.position[1]];
        let dx = receiver_xy[0] - source_xy[0];
        let dy = receiver_xy[1] - source_xy[1];
        Ok(Self {
            crust: split,
            source_layer,
            receiver_layer,
            angles: source.angles,
            dh: (dx * dx + dy * dy).sqrt(),
            source_xy,
            receiver_xy,
            z_src,
            z_rec,
            params: *params,
        })
    }

    /// Source-to-receiver azimuth in radians, clockwise from north.
    pub fn azimuth(&self) -> f64 {
        let dx = self.receiver_xy[0] - self.source_xy[0];
        let dy = self.receiver_xy[1] - self.source_xy[1];
        dx.atan2(dy)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KernelOutput {
    pub tdata: GreenTensor,
    pub traces: ComponentTraces,
    pub t0: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub traces: ComponentTraces,
    pub t0: f64,
}

pub trait GreenKernel: Send + Sync {
    /// Full evaluation for one pair.
    fn compute(&self, request: &KernelRequest) -> Result<KernelOutput, KernelError>;

    /// Re-synthesize traces for `request` from a stored raw tensor.
    fn synthesize(
        &self,
        tdata: &GreenTensor,
        request: &KernelRequest,
    ) -> Result<Synthesis, KernelError>;
}

/// Deterministic reference kernel: Gaussian pulses at the P and S
/// arrivals of a straight ray through the source layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PulseKernel;

impl PulseKernel {
    fn distance(request: &KernelRequest) -> f64 {
        let dz = request.z_rec - request.z_src;
        (request.dh * request.dh + dz * dz).sqrt()
    }

    fn first_arrival(request: &KernelRequest) -> Result<f64, KernelError> {
        let layer = request
            .crust
            .layers()
            .get(request.source_layer)
            .ok_or_else(|| KernelError::Solver("source layer out of range".to_string()))?;
        Ok(Self::distance(request) / layer.vp)
    }
}

impl GreenKernel for PulseKernel {
    fn compute(&self, request: &KernelRequest) -> Result<KernelOutput, KernelError> {
        request.params.validate()?;
        let layer = request
            .crust
            .layers()
            .get(request.source_layer)
            .ok_or_else(|| KernelError::Solver("source layer out of range".to_string()))?;
        let nt = request.params.nfft;
        let dt = request.params.dt;
        let r = Self::distance(request);
        let s_lag = if layer.vs > 0.0 {
            r / layer.vs - r / layer.vp
        } else {
            0.0
        };
        let width = 4.0 * dt;
        let mut tdata = GreenTensor::zeros(nt);
        for c in 0..GREEN_COMPONENTS {
            let amplitude = (c + 1) as f64 / (GREEN_COMPONENTS as f64 * (1.0 + r));
            let center = 2.0 * width + if c >= 3 { s_lag } else { 0.0 };
            for k in 0..nt {
                let x = (k as f64 * dt - center) / width;
                tdata.set(k, c, amplitude * (-0.5 * x * x).exp());
            }
        }
        let Synthesis { traces, t0 } = self.synthesize(&tdata, request)?;
        Ok(KernelOutput { tdata, traces, t0 })
    }

    fn synthesize(
        &self,
        tdata: &GreenTensor,
        request: &KernelRequest,
    ) -> Result<Synthesis, KernelError> {
        let [strike, dip, rake] = request.angles.map(f64::to_radians);
        let az = request.azimuth();
        let rel = az - strike;
        let w_z = [dip.cos(), rake.sin(), rel.cos()];
        let w_r = [rel.cos(), dip.sin(), rake.cos()];
        let w_t = [rel.sin(), (2.0 * dip).sin(), 1.0];

        let nt = tdata.nt();
        let mut traces = ComponentTraces::zeros(nt);
        for k in 0..nt {
            let z: f64 = (0..3).map(|c| w_z[c] * tdata.get(k, c)).sum();
            let radial: f64 = (0..3).map(|c| w_r[c] * tdata.get(k, 3 + c)).sum();
            let transverse: f64 = (0..3).map(|c| w_t[c] * tdata.get(k, 6 + c)).sum();
            traces.z[k] = z;
            traces.e[k] = radial * az.sin() + transverse * az.cos();
            traces.n[k] = radial * az.cos() - transverse * az.sin();
        }
        Ok(Synthesis {
            traces,
            t0: Self::first_arrival(request)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crust::Layer;

    fn request(src: [f64; 3], rec: [f64; 3]) -> KernelRequest {
        let crust = CrustModel::new(vec![
            Layer::new(1.0, 2.0, 1.0, 2.0),
            Layer::new(0.0, 6.0, 3.5, 2.7),
        ])
        .expect("crust should build");
        let params = SolverParams {
            nfft: 64,
            ..SolverParams::default()
        };
        KernelRequest::new(
            &crust,
            &PointSource::new(src, [30.0, 60.0, 90.0]),
            &Station::new(rec),
            &params,
        )
        .expect("request should build")
    }

    #[test]
    fn request_splits_crust_at_both_depths() {
        let req = request([0.0, 0.0, 2.0], [3.0, 4.0, 0.5]);
        assert_eq!(req.crust.nlayers(), 4);
        assert_eq!(req.receiver_layer, 1);
        assert_eq!(req.source_layer, 3);
        assert_eq!(req.dh, 5.0);
    }

    #[test]
    fn compute_shapes_and_replays() {
        let req = request([0.0, 0.0, 2.0], [3.0, 4.0, 0.5]);
        let out = PulseKernel.compute(&req).expect("kernel should run");
        assert_eq!(out.tdata.nt(), 64);
        assert_eq!(out.traces.len(), 64);
        assert!(out.t0 > 0.0);

        let replay = PulseKernel
            .synthesize(&out.tdata, &req)
            .expect("synthesis should run");
        assert_eq!(replay.traces, out.traces);
        assert_eq!(replay.t0, out.t0);
    }

    #[test]
    fn tensor_rejects_wrong_shape() {
        assert!(matches!(
            GreenTensor::new(2, vec![0.0; 17]),
            Err(KernelError::TensorShape { expected: 18, actual: 17 })
        ));
    }

    #[test]
    fn default_params_validate() {
        assert!(SolverParams::default().validate().is_ok());
        let bad = SolverParams {
            dt: 0.0,
            ..SolverParams::default()
        };
        assert!(bad.validate().is_err());
    }
}
