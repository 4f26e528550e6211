//! TOML scenario file.
//!
//! ```toml
//! [[crust.layers]]
//! thickness = 1.5
//! vp = 4.0
//! vs = 2.3
//! rho = 2.5
//!
//! [[sources]]
//! position = [0.0, 0.0, 1.0]
//! angles = [0.0, 90.0, 0.0]
//!
//! [[stations]]
//! position = [1.0, 0.0, 0.0]
//! name = "A"
//!
//! [solver]
//! nfft = 512
//!
//! [window]
//! tmax = 30.0
//! ```
//!
//! Every section except `[crust]` is optional.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tremor_kernel::{
    CrustModel, DedupConfig, Layer, LookupStrategy, OutputWindow, PointSource, SolverParams,
    Station, Tolerance,
};
use tremor_runtime::{DEFAULT_PROGRESS_EVERY, DEFAULT_SKIP_THRESHOLD, RunOptions, Scenario};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioFile {
    pub crust: CrustSection,
    #[serde(default)]
    pub sources: Vec<PointSource>,
    #[serde(default)]
    pub stations: Vec<Station>,
    #[serde(default)]
    pub solver: SolverParams,
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub tolerance: ToleranceSection,
    #[serde(default)]
    pub dedup: DedupSection,
    #[serde(default)]
    pub lookup: LookupSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrustSection {
    pub layers: Vec<Layer>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowSection {
    pub tmin: f64,
    pub tmax: f64,
    /// Defaults to the solver sample interval.
    pub dt: Option<f64>,
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            tmin: 0.0,
            tmax: 100.0,
            dt: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToleranceSection {
    pub delta_h: f64,
    pub delta_v_src: f64,
    pub delta_v_rec: f64,
}

impl Default for ToleranceSection {
    fn default() -> Self {
        let tol = Tolerance::default();
        Self {
            delta_h: tol.delta_h,
            delta_v_src: tol.delta_v_src,
            delta_v_rec: tol.delta_v_rec,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DedupSection {
    /// Zero disables first-pass binning.
    pub bin_factor: f64,
    pub refine_factor: f64,
    pub max_refinements: usize,
    pub max_canonical: Option<usize>,
}

impl Default for DedupSection {
    fn default() -> Self {
        let config = DedupConfig::default();
        Self {
            bin_factor: config.bin_factor.unwrap_or(0.0),
            refine_factor: config.refine_factor,
            max_refinements: config.max_refinements,
            max_canonical: config.max_canonical,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LookupSection {
    pub strategy: LookupStrategy,
    pub skip_threshold: usize,
    pub progress_every: usize,
}

impl Default for LookupSection {
    fn default() -> Self {
        Self {
            strategy: LookupStrategy::default(),
            skip_threshold: DEFAULT_SKIP_THRESHOLD,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }
}

impl ScenarioFile {
    pub fn load(path: &Path) -> Result<Self, String> {
        let raw = fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        Self::parse(&raw).map_err(|e| format!("{}: {e}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        toml::from_str(raw).map_err(|e| e.to_string())
    }

    pub fn tolerance(&self) -> Tolerance {
        Tolerance::new(
            self.tolerance.delta_h,
            self.tolerance.delta_v_src,
            self.tolerance.delta_v_rec,
        )
    }

    pub fn dedup_config(&self) -> DedupConfig {
        DedupConfig {
            tolerance: self.tolerance(),
            bin_factor: (self.dedup.bin_factor > 0.0).then_some(self.dedup.bin_factor),
            refine_factor: self.dedup.refine_factor,
            max_refinements: self.dedup.max_refinements,
            max_canonical: self.dedup.max_canonical,
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            lookup: self.lookup.strategy,
            skip_threshold: self.lookup.skip_threshold,
            progress_every: self.lookup.progress_every,
        }
    }

    pub fn scenario(&self) -> Result<Scenario, String> {
        let crust = CrustModel::new(self.crust.layers.clone()).map_err(|e| e.to_string())?;
        let window = OutputWindow::new(
            self.window.tmin,
            self.window.tmax,
            self.window.dt.unwrap_or(self.solver.dt),
        )
        .map_err(|e| e.to_string())?;
        Scenario::new(
            Arc::new(crust),
            self.sources.clone(),
            self.stations.clone(),
            self.solver,
            window,
        )
        .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[[crust.layers]]
thickness = 0.0
vp = 6.0
vs = 3.5
rho = 2.7
"#;

    #[test]
    fn omitted_sections_take_documented_defaults() {
        let file = ScenarioFile::parse(MINIMAL).expect("minimal scenario should parse");
        assert_eq!(file.solver.dt, 0.05);
        assert_eq!(file.solver.nfft, 4096);
        assert_eq!(file.solver.kc, 15.0);
        assert_eq!(file.window.tmax, 100.0);
        assert_eq!(file.tolerance(), Tolerance::new(0.04, 0.2, 0.002));
        assert_eq!(file.dedup_config(), DedupConfig::default());
        assert_eq!(file.run_options(), RunOptions::default());
        let scenario = file.scenario().expect("scenario should build");
        assert_eq!(scenario.window.dt, 0.05);
        assert_eq!(scenario.window.len(), 2000);
    }

    #[test]
    fn sections_override_defaults() {
        let raw = format!(
            "{MINIMAL}
[[sources]]
position = [0.0, 0.0, 1.0]
tt = 0.5
stf = {{ kind = \"triangle\", half_duration = 0.2 }}

[[stations]]
position = [1.0, 0.0, 0.0]
name = \"A\"

[window]
tmax = 20.0
dt = 0.1

[dedup]
bin_factor = 0.0
max_canonical = 10

[lookup]
strategy = \"first\"
skip_threshold = 3
"
        );
        let file = ScenarioFile::parse(&raw).expect("scenario should parse");
        assert_eq!(file.sources[0].tt, 0.5);
        assert_eq!(file.stations[0].name.as_deref(), Some("A"));
        let config = file.dedup_config();
        assert_eq!(config.bin_factor, None);
        assert_eq!(config.max_canonical, Some(10));
        let options = file.run_options();
        assert_eq!(options.lookup, LookupStrategy::First);
        assert_eq!(options.skip_threshold, 3);
        assert_eq!(file.scenario().expect("scenario").window.len(), 200);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let raw = format!("{MINIMAL}\n[window]\ntmax = 10.0\nstep = 0.1\n");
        let err = ScenarioFile::parse(&raw).expect_err("unknown key should fail");
        assert!(err.contains("step"), "{err}");
    }
}
