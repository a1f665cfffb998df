//! On-disk snapshot layout.
//!
//! Each successful download lives in `<base>/YYYYMMDD/` (UTC), one
//! `<category>.txt` file per feed. The most recent complete snapshot is the
//! lexicographically greatest date directory, which is also the
//! chronologically newest.

use std::path::{Path, PathBuf};

use chrono::Utc;

/// Default snapshot root, relative to the working directory.
pub const DEFAULT_BASE_DIR: &str = "priv/blocklists";

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    base: PathBuf,
}

impl SnapshotStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Today's snapshot directory (UTC), not yet created.
    pub fn today_dir(&self) -> PathBuf {
        self.base.join(Utc::now().format("%Y%m%d").to_string())
    }

    /// Create and return today's snapshot directory.
    pub fn create_today(&self) -> std::io::Result<PathBuf> {
        let dir = self.today_dir();
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// The most recent snapshot directory, if any exists.
    pub fn latest(&self) -> Option<PathBuf> {
        let entries = std::fs::read_dir(&self.base).ok()?;
        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                is_snapshot_name(&name).then_some(name)
            })
            .max()
            .map(|name| self.base.join(name))
    }

    /// Path of one category's file inside a snapshot directory.
    pub fn category_file(dir: &Path, category: &str) -> PathBuf {
        dir.join(format!("{category}.txt"))
    }
}

/// Snapshot directories are exactly eight ASCII digits.
fn is_snapshot_name(name: &str) -> bool {
    name.len() == 8 && name.bytes().all(|b| b.is_ascii_digit())
}
