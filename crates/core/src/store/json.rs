use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::table::Tables;

/// File name used under the configured data root.
pub const SNAPSHOT_FILE_NAME: &str = "subway.json";

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    saved_at: DateTime<Utc>,
    #[serde(flatten)]
    tables: Tables,
}

/// JSON file holding the full contents of a [`super::TableStore`].
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    /// Point at a snapshot file; nothing is read or created yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `subway.json` inside `data_root`.
    pub fn in_dir(data_root: impl AsRef<Path>) -> Self {
        Self::new(data_root.as_ref().join(SNAPSHOT_FILE_NAME))
    }

    /// Location on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored tables, or `None` when the file does not exist yet.
    pub(crate) fn load(&self) -> anyhow::Result<Option<(Tables, DateTime<Utc>)>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        Ok(Some((snapshot.tables, snapshot.saved_at)))
    }

    /// Replace the file with `tables`. The new content is written next to the
    /// target and renamed over it so readers never see a half-written file.
    pub(crate) fn persist(&self, tables: &Tables) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let snapshot = Snapshot {
            saved_at: Utc::now(),
            tables: tables.clone(),
        };
        let serialised =
            serde_json::to_vec_pretty(&snapshot).context("failed to serialize store snapshot")?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, serialised)
            .with_context(|| format!("failed to write {}", staging.display()))?;
        fs::rename(&staging, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))
    }
}
