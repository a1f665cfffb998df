//! Daemon configuration, loaded from a TOML file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use riskgate_intel::DEFAULT_BASE_DIR;

/// Top-level riskgate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskgateConfig {
    /// Root of the on-disk blocklist snapshots.
    #[serde(default = "default_blocklist_dir")]
    pub blocklist_dir: PathBuf,

    /// Address the HTTP surface binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Hours between successful feed refreshes.
    #[serde(default = "default_refresh_hours")]
    pub refresh_interval_hours: u64,

    /// Minutes before retrying a failed refresh.
    #[serde(default = "default_retry_minutes")]
    pub retry_interval_minutes: u64,
}

// --- Default value functions ---

fn default_blocklist_dir() -> PathBuf {
    PathBuf::from(DEFAULT_BASE_DIR)
}

fn default_listen_addr() -> String {
    "127.0.0.1:8089".to_string()
}

fn default_refresh_hours() -> u64 {
    24
}

fn default_retry_minutes() -> u64 {
    60
}

impl Default for RiskgateConfig {
    fn default() -> Self {
        Self {
            blocklist_dir: default_blocklist_dir(),
            listen_addr: default_listen_addr(),
            refresh_interval_hours: default_refresh_hours(),
            retry_interval_minutes: default_retry_minutes(),
        }
    }
}

impl RiskgateConfig {
    /// Load configuration from a TOML file. A missing file yields the
    /// defaults; a malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }
}
