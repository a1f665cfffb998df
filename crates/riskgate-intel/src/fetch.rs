//! Concurrent feed downloads.
//!
//! All catalog feeds are fetched into a destination directory with a bounded
//! number of requests in flight. A batch succeeds only if every feed
//! succeeded; partial files left behind by a failed batch are never promoted
//! and are simply overwritten by the next attempt.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tokio::sync::Semaphore;
use tracing::{debug, error};

use riskgate_core::catalog::{IndexKind, CATALOG};

use crate::error::{IntelError, Result};

/// Maximum concurrent feed downloads.
pub const MAX_IN_FLIGHT: usize = 5;

/// Per-request deadline. Some upstream lists are tens of megabytes served
/// from slow mirrors.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(600);

/// One feed to download: category name, entry kind, and source URL.
#[derive(Debug, Clone)]
pub struct FeedSource {
    pub category: String,
    pub kind: IndexKind,
    pub url: String,
}

/// The catalog expressed as feed sources.
pub fn catalog_sources() -> Vec<FeedSource> {
    CATALOG
        .iter()
        .map(|c| FeedSource {
            category: c.name.to_string(),
            kind: c.kind,
            url: c.feed_url.to_string(),
        })
        .collect()
}

/// Downloads feed files over HTTP.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    http: Client,
}

impl FeedFetcher {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("riskgate/", env!("CARGO_PKG_VERSION")))
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Self { http })
    }

    /// Create a fetcher with a custom HTTP client (for tests).
    pub fn with_http_client(http: Client) -> Self {
        Self { http }
    }

    /// Download every source into `<dir>/<category>.txt`, at most
    /// [`MAX_IN_FLIGHT`] requests in flight. Fails with
    /// [`IntelError::DownloadFailed`] unless every source succeeded.
    pub async fn fetch_all(&self, sources: &[FeedSource], dir: &Path) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(MAX_IN_FLIGHT));
        let mut handles = Vec::with_capacity(sources.len());

        for source in sources {
            let http = self.http.clone();
            let semaphore = Arc::clone(&semaphore);
            let dest = dir.join(format!("{}.txt", source.category));
            let source = source.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("fetch semaphore closed");
                fetch_one(&http, &source, &dest)
                    .await
                    .map_err(|e| (source.category, e))
            }));
        }

        let mut failed = 0usize;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err((category, err))) => {
                    error!(category = %category, error = %err, "feed download failed");
                    failed += 1;
                }
                Err(err) => {
                    error!(error = %err, "feed download task panicked");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(IntelError::DownloadFailed);
        }
        Ok(())
    }
}

/// Fetch a single feed. The body is written only on HTTP 200 exactly.
async fn fetch_one(http: &Client, source: &FeedSource, dest: &Path) -> Result<()> {
    debug!(category = %source.category, url = %source.url, "fetching feed");

    let response = http.get(&source.url).send().await?;
    if response.status() != StatusCode::OK {
        return Err(IntelError::Fetch(format!(
            "{} returned status {}",
            source.url,
            response.status()
        )));
    }

    let body = response.bytes().await?;
    tokio::fs::write(dest, &body).await?;

    debug!(
        category = %source.category,
        bytes = body.len(),
        "feed written"
    );
    Ok(())
}
