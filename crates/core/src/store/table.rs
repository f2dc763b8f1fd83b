use std::{cell::Cell, sync::Arc};

use parking_lot::{ReentrantMutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{
    json::SnapshotFile, LineDao, LineEntity, SectionDao, SectionEntity, StationDao, Storage,
};
use crate::{
    error::Result,
    models::{LineId, SectionId, Station, StationId},
};

/// Raw rows and id sequences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Tables {
    #[serde(default)]
    last_line_id: i64,
    #[serde(default)]
    last_station_id: i64,
    #[serde(default)]
    last_section_id: i64,
    #[serde(default)]
    pub(crate) lines: Vec<LineEntity>,
    #[serde(default)]
    pub(crate) stations: Vec<Station>,
    #[serde(default)]
    pub(crate) sections: Vec<SectionEntity>,
}

impl Tables {
    fn insert_line(&mut self, mut line: LineEntity) -> LineEntity {
        self.last_line_id += 1;
        line.id = Some(LineId(self.last_line_id));
        self.lines.push(line.clone());
        line
    }

    pub(crate) fn insert_station(&mut self, name: &str) -> Station {
        self.last_station_id += 1;
        let station = Station::new(self.last_station_id, name);
        self.stations.push(station.clone());
        station
    }

    fn insert_section(&mut self, mut section: SectionEntity) -> SectionEntity {
        self.last_section_id += 1;
        section.id = Some(SectionId(self.last_section_id));
        self.sections.push(section.clone());
        section
    }
}

/// Thread-safe store keeping every table in memory, optionally mirrored to a
/// JSON snapshot file after each committed write.
#[derive(Clone)]
pub struct TableStore {
    inner: Arc<Inner>,
}

struct Inner {
    tables: RwLock<Tables>,
    // Batch nesting depth; the lock itself serialises writers.
    batch: ReentrantMutex<Cell<usize>>,
    file: Option<SnapshotFile>,
}

impl TableStore {
    /// Empty store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::from_parts(Tables::default(), None)
    }

    /// Store backed by `file`, loading its current content when present.
    pub fn open(file: SnapshotFile) -> Result<Self> {
        let tables = match file.load()? {
            Some((tables, saved_at)) => {
                info!(
                    path = %file.path().display(),
                    lines = tables.lines.len(),
                    stations = tables.stations.len(),
                    saved_at = %saved_at,
                    "Loaded store snapshot"
                );
                tables
            }
            None => {
                info!(path = %file.path().display(), "Starting with an empty store");
                Tables::default()
            }
        };
        Ok(Self::from_parts(tables, Some(file)))
    }

    fn from_parts(tables: Tables, file: Option<SnapshotFile>) -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: RwLock::new(tables),
                batch: ReentrantMutex::new(Cell::new(0)),
                file,
            }),
        }
    }

    fn read<T>(&self, query: impl FnOnce(&Tables) -> T) -> T {
        query(&self.inner.tables.read())
    }

    /// A single write is a batch of one, so a failed flush undoes it.
    fn write<T>(&self, change: impl FnOnce(&mut Tables) -> T) -> Result<T> {
        self.atomically(|| Ok(change(&mut self.inner.tables.write())))
    }

    fn flush(&self) -> Result<()> {
        if let Some(file) = &self.inner.file {
            file.persist(&self.inner.tables.read())?;
            debug!(path = %file.path().display(), "Store snapshot written");
        }
        Ok(())
    }
}

impl LineDao for TableStore {
    fn save_line(&self, line: LineEntity) -> Result<LineEntity> {
        self.write(|tables| tables.insert_line(line))
    }

    fn find_line(&self, id: LineId) -> Result<Option<LineEntity>> {
        Ok(self.read(|tables| {
            tables
                .lines
                .iter()
                .find(|line| line.id == Some(id))
                .cloned()
        }))
    }

    fn find_line_by_name(&self, name: &str) -> Result<Option<LineEntity>> {
        Ok(self.read(|tables| tables.lines.iter().find(|line| line.name == name).cloned()))
    }

    fn find_line_by_color(&self, color: &str) -> Result<Option<LineEntity>> {
        Ok(self.read(|tables| {
            tables
                .lines
                .iter()
                .find(|line| line.color == color)
                .cloned()
        }))
    }

    fn find_lines(&self) -> Result<Vec<LineEntity>> {
        let mut lines = self.read(|tables| tables.lines.clone());
        lines.sort_by_key(|line| line.id);
        Ok(lines)
    }

    fn delete_line(&self, id: LineId) -> Result<()> {
        self.write(|tables| tables.lines.retain(|line| line.id != Some(id)))
    }
}

impl SectionDao for TableStore {
    fn save_section(&self, section: SectionEntity) -> Result<SectionEntity> {
        self.write(|tables| tables.insert_section(section))
    }

    fn find_sections_by_line(&self, line_id: LineId) -> Result<Vec<SectionEntity>> {
        Ok(self.read(|tables| {
            tables
                .sections
                .iter()
                .filter(|section| section.line_id == line_id)
                .cloned()
                .collect()
        }))
    }

    fn find_section_by_line_and_up_station(
        &self,
        line_id: LineId,
        up_station_id: StationId,
    ) -> Result<Option<SectionEntity>> {
        Ok(self.read(|tables| {
            tables
                .sections
                .iter()
                .find(|section| {
                    section.line_id == line_id && section.up_station_id == up_station_id
                })
                .cloned()
        }))
    }

    fn find_section_by_line_and_down_station(
        &self,
        line_id: LineId,
        down_station_id: StationId,
    ) -> Result<Option<SectionEntity>> {
        Ok(self.read(|tables| {
            tables
                .sections
                .iter()
                .find(|section| {
                    section.line_id == line_id && section.down_station_id == down_station_id
                })
                .cloned()
        }))
    }

    fn delete_section_by_line_and_up_station(
        &self,
        line_id: LineId,
        up_station_id: StationId,
    ) -> Result<()> {
        self.write(|tables| {
            tables.sections.retain(|section| {
                !(section.line_id == line_id && section.up_station_id == up_station_id)
            })
        })
    }

    fn delete_section_by_line_and_down_station(
        &self,
        line_id: LineId,
        down_station_id: StationId,
    ) -> Result<()> {
        self.write(|tables| {
            tables.sections.retain(|section| {
                !(section.line_id == line_id && section.down_station_id == down_station_id)
            })
        })
    }

    fn delete_section(&self, id: SectionId) -> Result<()> {
        self.write(|tables| tables.sections.retain(|section| section.id != Some(id)))
    }

    fn delete_sections_by_line(&self, line_id: LineId) -> Result<()> {
        self.write(|tables| tables.sections.retain(|section| section.line_id != line_id))
    }

    fn station_in_use(&self, station_id: StationId) -> Result<bool> {
        Ok(self.read(|tables| {
            tables.sections.iter().any(|section| {
                section.up_station_id == station_id || section.down_station_id == station_id
            })
        }))
    }
}

impl StationDao for TableStore {
    fn save_station(&self, name: &str) -> Result<Station> {
        self.write(|tables| tables.insert_station(name))
    }

    fn find_station(&self, id: StationId) -> Result<Option<Station>> {
        Ok(self.read(|tables| {
            tables
                .stations
                .iter()
                .find(|station| station.id == id)
                .cloned()
        }))
    }

    fn find_station_by_name(&self, name: &str) -> Result<Option<Station>> {
        Ok(self.read(|tables| {
            tables
                .stations
                .iter()
                .find(|station| station.name == name)
                .cloned()
        }))
    }

    fn find_stations(&self) -> Result<Vec<Station>> {
        let mut stations = self.read(|tables| tables.stations.clone());
        stations.sort_by_key(|station| station.id);
        Ok(stations)
    }

    fn delete_station(&self, id: StationId) -> Result<()> {
        self.write(|tables| tables.stations.retain(|station| station.id != id))
    }
}

impl Storage for TableStore {
    fn atomically<T>(&self, work: impl FnOnce() -> Result<T>) -> Result<T> {
        let depth = self.inner.batch.lock();
        let outermost = depth.get() == 0;
        let rollback = outermost.then(|| self.inner.tables.read().clone());

        depth.set(depth.get() + 1);
        let result = work();
        depth.set(depth.get() - 1);

        let result = match result {
            Ok(value) if outermost => self.flush().map(|()| value),
            other => other,
        };

        if result.is_err() {
            if let Some(tables) = rollback {
                *self.inner.tables.write() = tables;
                warn!("Batch failed; store rolled back");
            }
        }
        result
    }
}
