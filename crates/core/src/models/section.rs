use std::fmt;

use serde::{Deserialize, Serialize};

use super::{LineId, SectionId, Station};
use crate::error::{Result, SubwayError};

/// Directed, distance-weighted edge between two stations of one line.
///
/// Equality is structural: two sections are equal only when id, line, both
/// stations and distance all match. Diffing relies on this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    id: Option<SectionId>,
    line_id: LineId,
    up_station: Station,
    down_station: Station,
    distance: u32,
}

impl Section {
    /// Build an unsaved section.
    pub fn new(
        line_id: LineId,
        up_station: Station,
        down_station: Station,
        distance: u32,
    ) -> Result<Self> {
        Self::with_id(None, line_id, up_station, down_station, distance)
    }

    /// Build a section, optionally carrying its store id.
    pub fn with_id(
        id: Option<SectionId>,
        line_id: LineId,
        up_station: Station,
        down_station: Station,
        distance: u32,
    ) -> Result<Self> {
        validate_stations(&up_station, &down_station)?;
        validate_distance(distance)?;
        Ok(Self {
            id,
            line_id,
            up_station,
            down_station,
            distance,
        })
    }

    /// Store id, if the section has been saved.
    pub fn id(&self) -> Option<SectionId> {
        self.id
    }

    /// Line this section belongs to.
    pub fn line_id(&self) -> LineId {
        self.line_id
    }

    /// Station the section departs from.
    pub fn up_station(&self) -> &Station {
        &self.up_station
    }

    /// Station the section arrives at.
    pub fn down_station(&self) -> &Station {
        &self.down_station
    }

    /// Length of the section.
    pub fn distance(&self) -> u32 {
        self.distance
    }

    /// Whether `station` is the up station.
    pub fn same_up_station(&self, station: &Station) -> bool {
        self.up_station == *station
    }

    /// Whether `station` is the down station.
    pub fn same_down_station(&self, station: &Station) -> bool {
        self.down_station == *station
    }

    /// Whether `station` is either endpoint.
    pub fn touches(&self, station: &Station) -> bool {
        self.same_up_station(station) || self.same_down_station(station)
    }

    pub(crate) fn change_up_station(&mut self, station: Station, distance: u32) -> Result<()> {
        validate_stations(&station, &self.down_station)?;
        validate_distance(distance)?;
        self.up_station = station;
        self.distance = distance;
        Ok(())
    }

    pub(crate) fn change_down_station(&mut self, station: Station, distance: u32) -> Result<()> {
        validate_stations(&self.up_station, &station)?;
        validate_distance(distance)?;
        self.down_station = station;
        self.distance = distance;
        Ok(())
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({})",
            self.up_station.name, self.down_station.name, self.distance
        )
    }
}

fn validate_stations(up: &Station, down: &Station) -> Result<()> {
    if up == down {
        return Err(SubwayError::invalid(format!(
            "up and down station must differ (both are {})",
            up.id
        )));
    }
    Ok(())
}

fn validate_distance(distance: u32) -> Result<()> {
    if distance == 0 {
        return Err(SubwayError::invalid("distance must be positive"));
    }
    Ok(())
}
