use tracing::info;

use crate::{
    dto::StationResponse,
    error::{Result, SubwayError},
    models::StationId,
    store::Storage,
};

/// Registry of stations that lines are built from.
#[derive(Clone)]
pub struct StationService<S> {
    store: S,
}

impl<S: Storage> StationService<S> {
    /// Build a service over `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Register a station under a name no other station uses.
    pub fn create_station(&self, name: &str) -> Result<StationResponse> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SubwayError::invalid("station name must not be blank"));
        }
        self.store.atomically(|| {
            if self.store.find_station_by_name(name)?.is_some() {
                return Err(SubwayError::Duplicate(format!(
                    "a station named {name} already exists"
                )));
            }
            let station = self.store.save_station(name)?;
            info!(station_id = %station.id, station_name = %station.name, "Station created");
            Ok(StationResponse::from(&station))
        })
    }

    /// All stations ordered by id.
    pub fn find_stations(&self) -> Result<Vec<StationResponse>> {
        Ok(self
            .store
            .find_stations()?
            .iter()
            .map(StationResponse::from)
            .collect())
    }

    /// Delete a station no line passes through.
    pub fn delete_station(&self, station_id: StationId) -> Result<()> {
        self.store.atomically(|| {
            if self.store.find_station(station_id)?.is_none() {
                return Err(SubwayError::StationNotFound(station_id));
            }
            if self.store.station_in_use(station_id)? {
                return Err(SubwayError::invalid(format!(
                    "station {station_id} is still part of a line"
                )));
            }
            self.store.delete_station(station_id)?;
            info!(station_id = %station_id, "Station deleted");
            Ok(())
        })
    }
}
