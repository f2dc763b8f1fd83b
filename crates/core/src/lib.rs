#![warn(clippy::all, missing_docs)]

//! Core domain logic for subway line management.
//!
//! This crate hosts the station/section/line models, the topology engine
//! that orders a line's sections into one chain, the storage contract with a
//! bundled table store, configuration handling, and the services used by the
//! terminal UI and any future frontends.

pub mod config;
pub mod dto;
pub mod error;
pub mod models;
pub mod service;
pub mod store;
pub mod topology;

pub use config::AppConfig;
pub use dto::{LineListing, LineRequest, LineResponse, SectionAddRequest, StationResponse};
pub use error::{ErrorKind, Result, SubwayError};
pub use models::{Line, LineId, Section, SectionId, Station, StationId};
pub use service::{LineService, ServiceConfig, StationService};
pub use store::{SnapshotFile, Storage, TableStore};
pub use topology::{SectionDiff, Sections, TraversalPolicy};
