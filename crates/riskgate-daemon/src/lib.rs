//! Daemon wiring: registry, resolver pool, loader supervisor, HTTP surface.

pub mod api;
pub mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use riskgate_core::{Classifier, IndexRegistry};
use riskgate_intel::{catalog_sources, BlocklistLoader, FeedFetcher, SnapshotStore};
use riskgate_resolver::MxResolver;

use api::AppState;
use config::RiskgateConfig;

/// The assembled riskgate process.
pub struct Daemon {
    config: RiskgateConfig,
}

impl Daemon {
    pub fn new(config: RiskgateConfig) -> Self {
        Self { config }
    }

    /// Wire everything together and serve until the process is stopped.
    pub async fn run(self) -> Result<()> {
        let registry = Arc::new(IndexRegistry::new());

        let fetcher = FeedFetcher::new().context("building feed fetcher")?;
        let snapshots = SnapshotStore::new(&self.config.blocklist_dir);
        let (loader, loader_handle) = BlocklistLoader::with_schedule(
            Arc::clone(&registry),
            fetcher,
            snapshots,
            catalog_sources(),
            Duration::from_secs(self.config.refresh_interval_hours * 60 * 60),
            Duration::from_secs(self.config.retry_interval_minutes * 60),
        );
        tokio::spawn(loader.run());
        info!(
            blocklist_dir = %self.config.blocklist_dir.display(),
            "blocklist loader started"
        );

        let resolver = Arc::new(MxResolver::new());
        let classifier = Classifier::new(Arc::clone(&registry), resolver);

        let state = Arc::new(AppState {
            classifier,
            loader: loader_handle,
        });

        let listener = tokio::net::TcpListener::bind(&self.config.listen_addr)
            .await
            .with_context(|| format!("binding {}", self.config.listen_addr))?;
        info!(addr = %self.config.listen_addr, "riskgate listening");

        axum::serve(listener, api::router(state))
            .await
            .context("serving http")
    }
}
