#![allow(missing_docs)]

//! Request and response shapes exchanged with front ends.

use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    models::{Line, LineId, Station, StationId},
};

/// Create a line together with its first section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest {
    pub name: String,
    pub color: String,
    pub up_station_id: StationId,
    pub down_station_id: StationId,
    pub distance: u32,
}

impl LineRequest {
    pub fn new(
        name: impl Into<String>,
        color: impl Into<String>,
        up_station_id: impl Into<StationId>,
        down_station_id: impl Into<StationId>,
        distance: u32,
    ) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            up_station_id: up_station_id.into(),
            down_station_id: down_station_id.into(),
            distance,
        }
    }
}

/// Add a section to an existing line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionAddRequest {
    pub up_station_id: StationId,
    pub down_station_id: StationId,
    pub distance: u32,
}

impl SectionAddRequest {
    pub fn new(
        up_station_id: impl Into<StationId>,
        down_station_id: impl Into<StationId>,
        distance: u32,
    ) -> Self {
        Self {
            up_station_id: up_station_id.into(),
            down_station_id: down_station_id.into(),
            distance,
        }
    }
}

/// Station as shown to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationResponse {
    pub id: StationId,
    pub name: String,
}

impl From<&Station> for StationResponse {
    fn from(station: &Station) -> Self {
        Self {
            id: station.id,
            name: station.name.clone(),
        }
    }
}

/// Line with its stations ordered from head to tail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineResponse {
    pub id: LineId,
    pub name: String,
    pub color: String,
    pub stations: Vec<StationResponse>,
}

impl LineResponse {
    pub(crate) fn new(line: &Line, stations: &[Station]) -> Self {
        Self {
            id: line.id,
            name: line.name.clone(),
            color: line.color.clone(),
            stations: stations.iter().map(StationResponse::from).collect(),
        }
    }

    /// Station names in line order.
    pub fn station_names(&self) -> Vec<&str> {
        self.stations
            .iter()
            .map(|station| station.name.as_str())
            .collect()
    }
}

/// Directory entry for one line. A line whose sections cannot be ordered
/// keeps its name and colour and carries the error in place of its stations.
#[derive(Debug)]
pub struct LineListing {
    pub id: LineId,
    pub name: String,
    pub color: String,
    pub stations: Result<Vec<StationResponse>>,
}

impl LineListing {
    /// Station names in line order, `None` when the line cannot be ordered.
    pub fn station_names(&self) -> Option<Vec<&str>> {
        let stations = self.stations.as_ref().ok()?;
        Some(
            stations
                .iter()
                .map(|station| station.name.as_str())
                .collect(),
        )
    }
}
