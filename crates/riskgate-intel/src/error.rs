//! Error types for the feed lifecycle.

use thiserror::Error;

use riskgate_core::RegistryError;

#[derive(Debug, Error)]
pub enum IntelError {
    /// One or more feed downloads did not yield HTTP 200 within the deadline.
    #[error("one or more feed downloads failed")]
    DownloadFailed,

    /// A feed returned an unexpected HTTP status.
    #[error("feed fetch error: {0}")]
    Fetch(String),

    /// An on-disk feed file was unreadable during index build.
    #[error("failed to load feed file for {category}: {detail}")]
    LoadFailed { category: String, detail: String },

    /// Registry-level failure during the swap phase.
    #[error("index swap failed: {0}")]
    SwapFailed(#[from] RegistryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl IntelError {
    /// The machine-readable reason surfaced through loader status.
    pub fn reason(&self) -> &'static str {
        match self {
            IntelError::DownloadFailed | IntelError::Fetch(_) | IntelError::Http(_) => {
                "download_failed"
            }
            IntelError::LoadFailed { .. } | IntelError::Io(_) => "load_failed",
            IntelError::SwapFailed(_) => "swap_failed",
        }
    }
}

pub type Result<T> = std::result::Result<T, IntelError>;
