use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tremor_kernel::{Position, Station, StationResponse};
use tremor_runtime::{RunError, StationWriter};

/// One finished station per line.
#[derive(Serialize)]
struct StationLine<'a> {
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    position: Position,
    tmin: f64,
    dt: f64,
    nt: usize,
    contributions: usize,
    z: &'a [f64],
    e: &'a [f64],
    n: &'a [f64],
}

pub struct JsonlStationWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl JsonlStationWriter {
    pub fn create(path: &Path) -> Result<Self, RunError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_error(path, e))?;
        }
        let file = File::create(path).map_err(|e| io_error(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
        })
    }
}

impl StationWriter for JsonlStationWriter {
    fn write_station(
        &mut self,
        index: usize,
        station: &Station,
        response: &StationResponse,
    ) -> Result<(), RunError> {
        let window = response.window();
        let line = StationLine {
            index,
            name: station.name.as_deref(),
            position: station.position,
            tmin: window.tmin,
            dt: window.dt,
            nt: response.len(),
            contributions: response.contributions(),
            z: response.z(),
            e: response.e(),
            n: response.n(),
        };
        serde_json::to_writer(&mut self.out, &line)
            .map_err(|e| RunError::Writer(format!("{}: {e}", self.path.display())))?;
        self.out
            .write_all(b"\n")
            .map_err(|e| io_error(&self.path, e))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), RunError> {
        self.out.flush().map_err(|e| io_error(&self.path, e))
    }
}

fn io_error(path: &Path, err: std::io::Error) -> RunError {
    RunError::Writer(format!("{}: {err}", path.display()))
}
