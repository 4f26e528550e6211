//! Everything a run needs to know about the physical setup.

use crate::error::RunError;
use std::sync::Arc;
use tremor_kernel::{
    ComponentTraces, CrustModel, GreenKernel, GreenTensor, KernelRequest, OutputWindow,
    PairEnumerator, PairTable, PointSource, SolverParams, Station, TimedTraces, Tolerance,
};

/// Immutable inputs shared by every rank of a job.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub crust: Arc<CrustModel>,
    pub sources: Vec<PointSource>,
    pub stations: Vec<Station>,
    pub params: SolverParams,
    pub window: OutputWindow,
}

impl Scenario {
    pub fn new(
        crust: Arc<CrustModel>,
        sources: Vec<PointSource>,
        stations: Vec<Station>,
        params: SolverParams,
        window: OutputWindow,
    ) -> Result<Self, RunError> {
        params.validate()?;
        window.validate()?;
        if window.len() < 2 {
            return Err(RunError::Scenario(format!(
                "output window [{}, {}) with dt {} has fewer than two samples",
                window.tmin, window.tmax, window.dt
            )));
        }
        if (params.dt - window.dt).abs() > f64::EPSILON * params.dt.abs().max(1.0) {
            tracing::debug!(
                solver_dt = params.dt,
                window_dt = window.dt,
                "solver and output sample intervals differ; traces are interpolated"
            );
        }
        Ok(Self {
            crust,
            sources,
            stations,
            params,
            window,
        })
    }

    pub fn nstations(&self) -> usize {
        self.stations.len()
    }

    pub fn nsources(&self) -> usize {
        self.sources.len()
    }

    pub fn enumerator(&self) -> PairEnumerator {
        PairEnumerator::new(self.stations.len(), self.sources.len())
    }

    pub fn pair_table(&self) -> PairTable {
        PairTable::build(&self.stations, &self.sources)
    }

    pub fn station(&self, index: usize) -> Result<&Station, RunError> {
        self.stations.get(index).ok_or(RunError::OutOfRange {
            what: "station",
            index,
            len: self.stations.len(),
        })
    }

    pub fn source(&self, index: usize) -> Result<&PointSource, RunError> {
        self.sources.get(index).ok_or(RunError::OutOfRange {
            what: "source",
            index,
            len: self.sources.len(),
        })
    }

    pub fn request(&self, station: usize, source: usize) -> Result<KernelRequest, RunError> {
        Ok(KernelRequest::new(
            &self.crust,
            self.source(source)?,
            self.station(station)?,
            &self.params,
        )?)
    }

    pub fn digest(&self, tolerance: &Tolerance) -> Result<String, RunError> {
        Ok(tremor_bd::scenario_digest(
            &self.stations,
            &self.sources,
            tolerance,
        )?)
    }

    /// Convolve with the source time function and attach the time axis
    /// `tt + t0 + k*dt`.
    pub fn shape_traces(
        &self,
        source: &PointSource,
        traces: ComponentTraces,
        t0: f64,
    ) -> TimedTraces {
        let dt = self.params.dt;
        let convolved = ComponentTraces {
            z: source.stf.convolve(&traces.z, dt),
            e: source.stf.convolve(&traces.e, dt),
            n: source.stf.convolve(&traces.n, dt),
        };
        TimedTraces::from_traces(convolved, source.tt + t0, dt)
    }
}

/// Raw kernel traces for one pair, before source shaping.
pub(crate) struct RawTraces {
    pub traces: ComponentTraces,
    pub t0: f64,
}

/// Evaluate the kernel from scratch.
pub(crate) fn compute_pair(
    scenario: &Scenario,
    kernel: &dyn GreenKernel,
    station: usize,
    source: usize,
) -> Result<(RawTraces, GreenTensor), RunError> {
    let request = scenario.request(station, source)?;
    let out = kernel.compute(&request)?;
    Ok((
        RawTraces {
            traces: out.traces,
            t0: out.t0,
        },
        out.tdata,
    ))
}

/// Re-synthesize from a stored tensor. The arrival offset comes from the
/// pair's own geometry, not from the canonical entry the tensor belongs to.
pub(crate) fn synthesize_pair(
    scenario: &Scenario,
    kernel: &dyn GreenKernel,
    station: usize,
    source: usize,
    tdata: &GreenTensor,
) -> Result<RawTraces, RunError> {
    let request = scenario.request(station, source)?;
    let synthesis = kernel.synthesize(tdata, &request)?;
    Ok(RawTraces {
        traces: synthesis.traces,
        t0: synthesis.t0,
    })
}
