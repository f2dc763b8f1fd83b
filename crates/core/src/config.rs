//! Application configuration.
//!
//! Values come from built-in defaults, then `<config dir>/subway/config.toml`,
//! then `SUBWAY_*` environment variables (e.g. `SUBWAY_STRICT_TRAVERSAL=false`).

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{
    service::ServiceConfig,
    store::{SnapshotFile, TableStore},
    topology::TraversalPolicy,
};

const CONFIG_DIR: &str = "subway";
const CONFIG_FILE: &str = "config.toml";

const DEFAULT_CONFIG: &str = r#"# subway configuration

# Directory holding subway.json when store = "json".
# data_root = "/home/me/.local/share/subway"

# "json" keeps data in a snapshot file, "memory" discards it on exit.
store = "json"

# Reject a new line whose name or colour is already taken.
enforce_line_uniqueness = true

# Fail when stored sections do not all connect into one chain. When false the
# reachable part of the line is shown and the rest is logged.
strict_traversal = true
"#;

/// Which store backs the services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Nothing survives the process.
    Memory,
    /// JSON snapshot under `data_root`.
    Json,
}

/// Settings shared by the front end and the services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory for persistent data.
    pub data_root: PathBuf,
    /// Store implementation.
    pub store: StoreKind,
    /// Reject duplicate line names and colours.
    pub enforce_line_uniqueness: bool,
    /// Treat sections unreachable from the head as an error.
    pub strict_traversal: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            store: StoreKind::Json,
            enforce_line_uniqueness: true,
            strict_traversal: true,
        }
    }
}

impl AppConfig {
    /// Load from the default config file and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load from `path` (optional on disk) and the environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::load_with(path, Environment::with_prefix("SUBWAY").try_parsing(true))
    }

    fn load_with(path: &Path, environment: Environment) -> Result<Self> {
        let defaults = Self::default();
        let settings = Config::builder()
            .set_default("data_root", defaults.data_root.to_string_lossy().to_string())?
            .set_default("store", "json")?
            .set_default("enforce_line_uniqueness", defaults.enforce_line_uniqueness)?
            .set_default("strict_traversal", defaults.strict_traversal)?
            .add_source(File::from(path).required(false))
            .add_source(environment)
            .build()
            .with_context(|| format!("failed to read configuration from {}", path.display()))?;

        settings
            .try_deserialize()
            .context("invalid configuration values")
    }

    /// Service behaviour derived from these settings.
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            enforce_line_uniqueness: self.enforce_line_uniqueness,
            traversal: if self.strict_traversal {
                TraversalPolicy::Strict
            } else {
                TraversalPolicy::Lenient
            },
        }
    }

    /// Open the configured store.
    pub fn open_store(&self) -> crate::Result<TableStore> {
        match self.store {
            StoreKind::Memory => Ok(TableStore::in_memory()),
            StoreKind::Json => TableStore::open(SnapshotFile::in_dir(&self.data_root)),
        }
    }
}

/// `<config dir>/subway/config.toml`.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
        .join(CONFIG_FILE)
}

/// `<data dir>/subway`.
pub fn default_data_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
}

/// Write a commented default config file unless one exists.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    write_default_config(&path)?;
    Ok(path)
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))
}
