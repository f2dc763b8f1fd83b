//! Storage contract used by the services, plus the bundled table store.
//!
//! The DAO traits mirror the narrow shape the services need: rows keyed by
//! ids, plus section lookups by `(line, up station)` and
//! `(line, down station)` because section rewrites are addressed by their
//! endpoints rather than by id.

use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    models::{LineId, SectionId, Station, StationId},
};

mod json;
mod table;

pub use json::SnapshotFile;
pub use table::TableStore;

/// Stored line row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEntity {
    /// Assigned on save.
    pub id: Option<LineId>,
    /// Unique display name.
    pub name: String,
    /// Display colour.
    pub color: String,
}

impl LineEntity {
    /// Unsaved line row.
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            color: color.into(),
        }
    }
}

/// Stored section row; stations are referenced by id only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionEntity {
    /// Assigned on save.
    pub id: Option<SectionId>,
    /// Owning line.
    pub line_id: LineId,
    /// Departure station.
    pub up_station_id: StationId,
    /// Arrival station.
    pub down_station_id: StationId,
    /// Section length.
    pub distance: u32,
}

impl SectionEntity {
    /// Unsaved section row.
    pub fn new(
        line_id: LineId,
        up_station_id: StationId,
        down_station_id: StationId,
        distance: u32,
    ) -> Self {
        Self {
            id: None,
            line_id,
            up_station_id,
            down_station_id,
            distance,
        }
    }
}

impl From<&crate::models::Section> for SectionEntity {
    fn from(section: &crate::models::Section) -> Self {
        Self {
            id: section.id(),
            line_id: section.line_id(),
            up_station_id: section.up_station().id,
            down_station_id: section.down_station().id,
            distance: section.distance(),
        }
    }
}

/// Line rows.
pub trait LineDao {
    /// Insert a line and return it with its id.
    fn save_line(&self, line: LineEntity) -> Result<LineEntity>;
    /// Look a line up by id.
    fn find_line(&self, id: LineId) -> Result<Option<LineEntity>>;
    /// Look a line up by exact name.
    fn find_line_by_name(&self, name: &str) -> Result<Option<LineEntity>>;
    /// Look a line up by exact colour.
    fn find_line_by_color(&self, color: &str) -> Result<Option<LineEntity>>;
    /// All lines ordered by id.
    fn find_lines(&self) -> Result<Vec<LineEntity>>;
    /// Delete a line row. Deleting a missing id is not an error.
    fn delete_line(&self, id: LineId) -> Result<()>;
}

/// Section rows.
pub trait SectionDao {
    /// Insert a section and return it with a fresh id.
    fn save_section(&self, section: SectionEntity) -> Result<SectionEntity>;
    /// All sections of a line, in no particular order.
    fn find_sections_by_line(&self, line_id: LineId) -> Result<Vec<SectionEntity>>;
    /// The section of `line_id` departing from `up_station_id`.
    fn find_section_by_line_and_up_station(
        &self,
        line_id: LineId,
        up_station_id: StationId,
    ) -> Result<Option<SectionEntity>>;
    /// The section of `line_id` arriving at `down_station_id`.
    fn find_section_by_line_and_down_station(
        &self,
        line_id: LineId,
        down_station_id: StationId,
    ) -> Result<Option<SectionEntity>>;
    /// Delete the section of `line_id` departing from `up_station_id`, if any.
    fn delete_section_by_line_and_up_station(
        &self,
        line_id: LineId,
        up_station_id: StationId,
    ) -> Result<()>;
    /// Delete the section of `line_id` arriving at `down_station_id`, if any.
    fn delete_section_by_line_and_down_station(
        &self,
        line_id: LineId,
        down_station_id: StationId,
    ) -> Result<()>;
    /// Delete a section by id. Deleting a missing id is not an error.
    fn delete_section(&self, id: SectionId) -> Result<()>;
    /// Delete every section of a line.
    fn delete_sections_by_line(&self, line_id: LineId) -> Result<()>;
    /// Whether any section of any line touches `station_id`.
    fn station_in_use(&self, station_id: StationId) -> Result<bool>;
}

/// Station rows.
pub trait StationDao {
    /// Insert a station and return it with its id.
    fn save_station(&self, name: &str) -> Result<Station>;
    /// Look a station up by id.
    fn find_station(&self, id: StationId) -> Result<Option<Station>>;
    /// Look a station up by exact name.
    fn find_station_by_name(&self, name: &str) -> Result<Option<Station>>;
    /// All stations ordered by id.
    fn find_stations(&self) -> Result<Vec<Station>>;
    /// Delete a station row. Deleting a missing id is not an error.
    fn delete_station(&self, id: StationId) -> Result<()>;
}

/// A complete store the services can run against.
pub trait Storage: LineDao + SectionDao + StationDao + Send + Sync {
    /// Run `work` as one batch. When it fails every write it made is rolled
    /// back. Batches are serialised against each other and against single
    /// writes; persistent stores commit once at the end of the batch.
    fn atomically<T>(&self, work: impl FnOnce() -> Result<T>) -> Result<T>;
}
