use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::ServiceConfig;
use crate::{
    dto::{LineListing, LineRequest, LineResponse, SectionAddRequest},
    error::{ErrorKind, Result, SubwayError},
    models::{Line, LineId, Section, Station, StationId},
    store::{LineEntity, SectionEntity, Storage},
    topology::SectionDiff,
};

/// Creates lines, reads them back in station order, and edits their sections.
#[derive(Clone)]
pub struct LineService<S> {
    store: S,
    config: ServiceConfig,
}

impl<S: Storage> LineService<S> {
    /// Build a service over `store`.
    pub fn new(store: S, config: ServiceConfig) -> Self {
        Self { store, config }
    }

    /// Create a line with one section between two existing stations.
    pub fn create_line(&self, request: &LineRequest) -> Result<LineResponse> {
        let name = require_text("line name", &request.name)?;
        let color = require_text("line colour", &request.color)?;

        self.store.atomically(|| {
            if self.config.enforce_line_uniqueness {
                self.validate_unique(name, color)?;
            }
            let up_station = self.find_station(request.up_station_id)?;
            let down_station = self.find_station(request.down_station_id)?;

            let saved = self.store.save_line(LineEntity::new(name, color))?;
            let line_id = saved
                .id
                .ok_or_else(|| anyhow::anyhow!("store returned line {name} without an id"))?;
            let mut line = Line::new(line_id, name, color);
            let diff = line.add_section(up_station, down_station, request.distance)?;
            self.persist(&diff)?;

            info!(line_id = %line_id, line_name = name, color, "Line created");
            self.respond(&line)
        })
    }

    /// Line with its stations in order.
    pub fn find_line(&self, line_id: LineId) -> Result<LineResponse> {
        let line = self.load_line(line_id)?;
        self.respond(&line)
    }

    /// Every line with its stations in order. A line that fails to load for
    /// any reason other than storage is listed with its error so the rest of
    /// the directory stays reachable.
    pub fn find_lines(&self) -> Result<Vec<LineListing>> {
        let mut listings = Vec::new();
        for entity in self.store.find_lines()? {
            let Some(line_id) = entity.id else {
                continue;
            };
            let stations = match self.find_line(line_id) {
                Ok(line) => Ok(line.stations),
                Err(err) if err.kind() == ErrorKind::Storage => return Err(err),
                Err(err) => {
                    warn!(line_id = %line_id, %err, "Line listed without stations");
                    Err(err)
                }
            };
            listings.push(LineListing {
                id: line_id,
                name: entity.name,
                color: entity.color,
                stations,
            });
        }
        Ok(listings)
    }

    /// Sections of a line ordered from head to tail.
    pub fn ordered_sections(&self, line_id: LineId) -> Result<Vec<Section>> {
        self.load_line(line_id)?
            .sections()
            .sorted_sections(self.config.traversal)
    }

    /// Add a section extending the line or splitting one of its sections.
    pub fn add_section(
        &self,
        line_id: LineId,
        request: &SectionAddRequest,
    ) -> Result<LineResponse> {
        self.store.atomically(|| {
            let mut line = self.load_line(line_id)?;
            let up_station = self.find_station(request.up_station_id)?;
            let down_station = self.find_station(request.down_station_id)?;

            let diff = line.add_section(up_station, down_station, request.distance)?;
            self.persist(&diff)?;
            info!(
                line_id = %line_id,
                up = %request.up_station_id,
                down = %request.down_station_id,
                distance = request.distance,
                "Section added"
            );
            self.respond(&line)
        })
    }

    /// Take a station off a line, merging its neighbouring sections.
    pub fn remove_station(&self, line_id: LineId, station_id: StationId) -> Result<LineResponse> {
        self.store.atomically(|| {
            let mut line = self.load_line(line_id)?;
            let station = self.find_station(station_id)?;

            let diff = line.remove_station(&station)?;
            self.persist(&diff)?;
            info!(line_id = %line_id, station_id = %station_id, "Station removed from line");
            self.respond(&line)
        })
    }

    /// Delete a line and all of its sections.
    pub fn delete_line(&self, line_id: LineId) -> Result<()> {
        self.store.atomically(|| {
            if self.store.find_line(line_id)?.is_none() {
                return Err(SubwayError::LineNotFound(line_id));
            }
            self.store.delete_sections_by_line(line_id)?;
            self.store.delete_line(line_id)?;
            info!(line_id = %line_id, "Line deleted");
            Ok(())
        })
    }

    fn respond(&self, line: &Line) -> Result<LineResponse> {
        let stations = line.stations(self.config.traversal)?;
        Ok(LineResponse::new(line, &stations))
    }

    fn validate_unique(&self, name: &str, color: &str) -> Result<()> {
        if self.store.find_line_by_name(name)?.is_some() {
            return Err(SubwayError::Duplicate(format!(
                "a line named {name} already exists"
            )));
        }
        if self.store.find_line_by_color(color)?.is_some() {
            return Err(SubwayError::Duplicate(format!(
                "a line coloured {color} already exists"
            )));
        }
        Ok(())
    }

    fn load_line(&self, line_id: LineId) -> Result<Line> {
        let entity = self
            .store
            .find_line(line_id)?
            .ok_or(SubwayError::LineNotFound(line_id))?;

        let mut stations: HashMap<StationId, Station> = HashMap::new();
        let mut sections = Vec::new();
        for row in self.store.find_sections_by_line(line_id)? {
            let up_station = self.cached_station(&mut stations, row.up_station_id)?;
            let down_station = self.cached_station(&mut stations, row.down_station_id)?;
            sections.push(Section::with_id(
                row.id,
                row.line_id,
                up_station,
                down_station,
                row.distance,
            )?);
        }
        debug!(line_id = %line_id, sections = sections.len(), "Line loaded");
        Line::with_sections(line_id, entity.name, entity.color, sections)
    }

    fn cached_station(
        &self,
        cache: &mut HashMap<StationId, Station>,
        station_id: StationId,
    ) -> Result<Station> {
        if let Some(station) = cache.get(&station_id) {
            return Ok(station.clone());
        }
        let station = self.find_station(station_id)?;
        cache.insert(station_id, station.clone());
        Ok(station)
    }

    fn find_station(&self, station_id: StationId) -> Result<Station> {
        self.store
            .find_station(station_id)?
            .ok_or(SubwayError::StationNotFound(station_id))
    }

    /// Write a diff: drop vanished rows, then replace each changed section by
    /// deleting whatever occupies its endpoints and saving it afresh.
    fn persist(&self, diff: &SectionDiff) -> Result<()> {
        for section in &diff.removed {
            if let Some(id) = section.id() {
                self.store.delete_section(id)?;
                debug!(section = %section, "Section row deleted");
            }
        }

        for section in &diff.changed {
            let entity = SectionEntity {
                id: None,
                ..SectionEntity::from(section)
            };
            if let Some(old) = self
                .store
                .find_section_by_line_and_up_station(entity.line_id, entity.up_station_id)?
            {
                debug!(old_id = ?old.id, "Replacing section sharing up station");
                self.store
                    .delete_section_by_line_and_up_station(entity.line_id, entity.up_station_id)?;
            }
            if let Some(old) = self
                .store
                .find_section_by_line_and_down_station(entity.line_id, entity.down_station_id)?
            {
                debug!(old_id = ?old.id, "Replacing section sharing down station");
                self.store.delete_section_by_line_and_down_station(
                    entity.line_id,
                    entity.down_station_id,
                )?;
            }
            let saved = self.store.save_section(entity)?;
            debug!(section = %section, id = ?saved.id, "Section row saved");
        }
        Ok(())
    }
}

fn require_text<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SubwayError::invalid(format!("{field} must not be blank")));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorKind,
        store::{LineDao, SectionDao, SnapshotFile, StationDao, TableStore},
        topology::TraversalPolicy,
    };
    use tempfile::tempdir;

    const LINE: LineId = LineId(1);

    /// Stations 1..=4 and line 1 stored as `1 -> 4 (7)`, `4 -> 3 (5)`, saved
    /// tail first so storage order differs from line order.
    fn base_line(config: ServiceConfig) -> anyhow::Result<(TableStore, LineService<TableStore>)> {
        let store = TableStore::in_memory();
        for name in ["Gangnam", "Yeoksam", "Seolleung", "Samseong"] {
            store.save_station(name)?;
        }
        store.save_line(LineEntity::new("Shinbundang", "bg-red-600"))?;
        store.save_section(SectionEntity::new(LINE, StationId(4), StationId(3), 5))?;
        store.save_section(SectionEntity::new(LINE, StationId(1), StationId(4), 7))?;
        let service = LineService::new(store.clone(), config);
        Ok((store, service))
    }

    fn stored_distance(store: &TableStore) -> anyhow::Result<u32> {
        Ok(store
            .find_sections_by_line(LINE)?
            .iter()
            .map(|row| row.distance)
            .sum())
    }

    #[test]
    fn create_line_returns_both_stations() -> anyhow::Result<()> {
        let store = TableStore::in_memory();
        store.save_station("Gangnam")?;
        store.save_station("Yeoksam")?;
        let service = LineService::new(store.clone(), ServiceConfig::default());

        let response = service.create_line(&LineRequest::new("Shinbundang", "white", 1, 2, 10))?;
        assert_eq!(response.id, LineId(1));
        assert_eq!(response.station_names(), vec!["Gangnam", "Yeoksam"]);
        assert_eq!(store.find_sections_by_line(LineId(1))?.len(), 1);
        Ok(())
    }

    #[test]
    fn create_line_rejects_bad_requests_without_writing() -> anyhow::Result<()> {
        let store = TableStore::in_memory();
        store.save_station("Gangnam")?;
        let service = LineService::new(store.clone(), ServiceConfig::default());

        let err = service
            .create_line(&LineRequest::new("Shinbundang", "white", 1, 99, 10))
            .unwrap_err();
        assert!(matches!(err, SubwayError::StationNotFound(StationId(99))));

        let err = service
            .create_line(&LineRequest::new("Shinbundang", "white", 1, 1, 10))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = service
            .create_line(&LineRequest::new("  ", "white", 1, 1, 10))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        assert!(store.find_lines()?.is_empty(), "failed creates roll back");
        Ok(())
    }

    #[test]
    fn uniqueness_is_configurable() -> anyhow::Result<()> {
        let (_, strict) = base_line(ServiceConfig::default())?;
        let err = strict
            .create_line(&LineRequest::new("Shinbundang", "bg-blue-600", 1, 2, 3))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Duplicate);
        let err = strict
            .create_line(&LineRequest::new("Line 9", "bg-red-600", 1, 2, 3))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Duplicate);

        let (store, relaxed) = base_line(ServiceConfig {
            enforce_line_uniqueness: false,
            ..ServiceConfig::default()
        })?;
        relaxed.create_line(&LineRequest::new("Shinbundang", "bg-red-600", 1, 2, 3))?;
        assert_eq!(store.find_lines()?.len(), 2);
        Ok(())
    }

    #[test]
    fn find_line_orders_stations() -> anyhow::Result<()> {
        let (_, service) = base_line(ServiceConfig::default())?;
        let response = service.find_line(LINE)?;
        assert_eq!(response.name, "Shinbundang");
        assert_eq!(
            response.station_names(),
            vec!["Gangnam", "Samseong", "Seolleung"]
        );
        Ok(())
    }

    #[test]
    fn find_line_reports_missing_line() -> anyhow::Result<()> {
        let (_, service) = base_line(ServiceConfig::default())?;
        let err = service.find_line(LineId(9)).unwrap_err();
        assert!(matches!(err, SubwayError::LineNotFound(LineId(9))));
        Ok(())
    }

    #[test]
    fn upward_end_point_registration() -> anyhow::Result<()> {
        let (store, service) = base_line(ServiceConfig::default())?;
        service.add_section(LINE, &SectionAddRequest::new(2, 1, 10))?;

        let response = service.find_line(LINE)?;
        assert_eq!(
            response.station_names(),
            vec!["Yeoksam", "Gangnam", "Samseong", "Seolleung"]
        );
        assert_eq!(store.find_sections_by_line(LINE)?.len(), 3);
        assert_eq!(stored_distance(&store)?, 22);
        Ok(())
    }

    #[test]
    fn downward_end_point_registration() -> anyhow::Result<()> {
        let (store, service) = base_line(ServiceConfig::default())?;
        service.add_section(LINE, &SectionAddRequest::new(3, 2, 10))?;

        let response = service.find_line(LINE)?;
        assert_eq!(
            response.station_names(),
            vec!["Gangnam", "Samseong", "Seolleung", "Yeoksam"]
        );
        assert_eq!(store.find_sections_by_line(LINE)?.len(), 3);
        Ok(())
    }

    #[test]
    fn interior_split_rewrites_stored_rows() -> anyhow::Result<()> {
        let (store, service) = base_line(ServiceConfig::default())?;
        service.add_section(LINE, &SectionAddRequest::new(1, 2, 3))?;

        let response = service.find_line(LINE)?;
        assert_eq!(
            response.station_names(),
            vec!["Gangnam", "Yeoksam", "Samseong", "Seolleung"]
        );
        assert_eq!(store.find_sections_by_line(LINE)?.len(), 3);
        assert_eq!(stored_distance(&store)?, 12, "split keeps total distance");

        let shrunk = store
            .find_section_by_line_and_up_station(LINE, StationId(2))?
            .expect("shrunk section stored");
        assert_eq!(shrunk.down_station_id, StationId(4));
        assert_eq!(shrunk.distance, 4);
        Ok(())
    }

    #[test]
    fn interior_split_rejects_long_section() -> anyhow::Result<()> {
        let (store, service) = base_line(ServiceConfig::default())?;
        let err = service
            .add_section(LINE, &SectionAddRequest::new(2, 3, 5))
            .unwrap_err();
        assert!(matches!(err, SubwayError::InvalidDistance { .. }));
        assert_eq!(store.find_sections_by_line(LINE)?.len(), 2);
        Ok(())
    }

    #[test]
    fn add_section_reports_missing_references() -> anyhow::Result<()> {
        let (_, service) = base_line(ServiceConfig::default())?;
        let err = service
            .add_section(LineId(7), &SectionAddRequest::new(2, 1, 3))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = service
            .add_section(LINE, &SectionAddRequest::new(42, 1, 3))
            .unwrap_err();
        assert!(matches!(err, SubwayError::StationNotFound(StationId(42))));
        Ok(())
    }

    #[test]
    fn remove_station_merges_rows() -> anyhow::Result<()> {
        let (store, service) = base_line(ServiceConfig::default())?;
        let response = service.remove_station(LINE, StationId(4))?;
        assert_eq!(response.station_names(), vec!["Gangnam", "Seolleung"]);

        let rows = store.find_sections_by_line(LINE)?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].distance, 12);

        let err = service.remove_station(LINE, StationId(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        Ok(())
    }

    #[test]
    fn remove_head_station_drops_row() -> anyhow::Result<()> {
        let (store, service) = base_line(ServiceConfig::default())?;
        service.remove_station(LINE, StationId(1))?;
        let rows = store.find_sections_by_line(LINE)?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].up_station_id, StationId(4));
        Ok(())
    }

    #[test]
    fn stored_self_loop_is_rejected() -> anyhow::Result<()> {
        let (store, service) = base_line(ServiceConfig::default())?;
        store.save_section(SectionEntity::new(LINE, StationId(2), StationId(2), 1))?;
        let err = service.find_line(LINE).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        Ok(())
    }

    #[test]
    fn broken_chain_follows_traversal_policy() -> anyhow::Result<()> {
        let (store, strict) = base_line(ServiceConfig::default())?;
        store.save_section(SectionEntity::new(LINE, StationId(2), StationId(4), 1))?;
        let err = strict.find_line(LINE).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedTopology);

        let (store, lenient) = base_line(ServiceConfig {
            traversal: TraversalPolicy::Lenient,
            ..ServiceConfig::default()
        })?;
        store.save_station("Jamsil")?;
        store.save_section(SectionEntity::new(LINE, StationId(2), StationId(5), 1))?;
        store.save_section(SectionEntity::new(LINE, StationId(5), StationId(2), 1))?;
        let response = lenient.find_line(LINE)?;
        assert_eq!(
            response.station_names(),
            vec!["Gangnam", "Samseong", "Seolleung"]
        );
        Ok(())
    }

    #[test]
    fn cyclic_line_does_not_hide_the_directory() -> anyhow::Result<()> {
        let (store, service) = base_line(ServiceConfig::default())?;
        let looped = store.save_line(LineEntity::new("Line 2", "bg-green-600"))?;
        let looped_id = looped.id.expect("saved line has id");
        store.save_section(SectionEntity::new(looped_id, StationId(2), StationId(3), 4))?;
        store.save_section(SectionEntity::new(looped_id, StationId(3), StationId(2), 4))?;

        let lines = service.find_lines()?;
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0].station_names(),
            Some(vec!["Gangnam", "Samseong", "Seolleung"])
        );
        assert_eq!(lines[1].name, "Line 2");
        assert_eq!(lines[1].station_names(), None);
        let err = lines[1].stations.as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedTopology);

        service.delete_line(looped_id)?;
        let lines = service.find_lines()?;
        assert_eq!(lines.len(), 1);
        assert!(lines[0].stations.is_ok());
        Ok(())
    }

    #[test]
    fn delete_line_removes_sections() -> anyhow::Result<()> {
        let (store, service) = base_line(ServiceConfig::default())?;
        service.delete_line(LINE)?;
        assert!(store.find_lines()?.is_empty());
        assert!(store.find_sections_by_line(LINE)?.is_empty());
        assert_eq!(
            service.delete_line(LINE).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        Ok(())
    }

    #[test]
    fn json_store_round_trip() -> anyhow::Result<()> {
        let dir = tempdir()?;
        {
            let store = TableStore::open(SnapshotFile::in_dir(dir.path()))?;
            for name in ["Gangnam", "Yeoksam", "Seolleung"] {
                store.save_station(name)?;
            }
            let service = LineService::new(store, ServiceConfig::default());
            service.create_line(&LineRequest::new("Line 2", "bg-green-600", 1, 2, 10))?;
            service.add_section(LineId(1), &SectionAddRequest::new(2, 3, 6))?;
        }

        let store = TableStore::open(SnapshotFile::in_dir(dir.path()))?;
        let service = LineService::new(store, ServiceConfig::default());
        let lines = service.find_lines()?;
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0].station_names(),
            Some(vec!["Gangnam", "Yeoksam", "Seolleung"])
        );
        let distances: Vec<u32> = service
            .ordered_sections(LineId(1))?
            .iter()
            .map(Section::distance)
            .collect();
        assert_eq!(distances, vec![10, 6]);
        Ok(())
    }
}
