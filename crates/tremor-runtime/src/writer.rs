use crate::error::RunError;
use std::collections::BTreeMap;
use tremor_kernel::{Station, StationResponse};

/// Receives finished stations on the coordinator. Stations may arrive in
/// any order.
pub trait StationWriter {
    fn write_station(
        &mut self,
        index: usize,
        station: &Station,
        response: &StationResponse,
    ) -> Result<(), RunError>;

    fn finish(&mut self) -> Result<(), RunError> {
        Ok(())
    }
}

/// Keeps every station in memory, keyed by station index.
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter {
    pub stations: BTreeMap<usize, StationResponse>,
    pub order: Vec<usize>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StationWriter for MemoryWriter {
    fn write_station(
        &mut self,
        index: usize,
        _station: &Station,
        response: &StationResponse,
    ) -> Result<(), RunError> {
        self.order.push(index);
        self.stations.insert(index, response.clone());
        Ok(())
    }
}
