//! The blocklist loader supervisor.
//!
//! A single task owns the refresh lifecycle: boot from the newest on-disk
//! snapshot (or fetch immediately), then refresh on a daily schedule with an
//! hourly retry after failures. Refreshes are all-or-nothing: live indexes
//! advance only when every category fetched, parsed, and swapped; any
//! earlier failure garbage-collects the staging indexes and leaves the
//! previous live state untouched.
//!
//! On-demand refreshes arrive over a command channel. Requests that land
//! while a refresh is already running are answered by that refresh rather
//! than starting another one.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{error, info, warn};

use riskgate_core::catalog::{staging_name, CATALOG, MX_CACHE};
use riskgate_core::IndexRegistry;

use crate::error::{IntelError, Result};
use crate::fetch::{catalog_sources, FeedFetcher, FeedSource};
use crate::parse::build_staging;
use crate::snapshot::SnapshotStore;

/// Time between successful refreshes.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Retry delay after a failed refresh.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Capacity of the command channel. Callers beyond this back-pressure on
/// `update_now`, which is harmless: their request coalesces anyway.
const COMMAND_BUFFER: usize = 32;

/// Observable outcome of the most recent load attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    /// Indexes exist but no data has been loaded yet.
    Pending,
    /// The last refresh (or snapshot boot) succeeded.
    Ok,
    /// The last refresh failed.
    Error { reason: String },
}

/// Cheap, read-only snapshot of the loader's state.
#[derive(Debug, Clone, Serialize)]
pub struct LoaderStatus {
    pub last_update: Option<DateTime<Utc>>,
    pub last_status: LoadState,
    pub update_count: u64,
    pub next_update_at: Option<DateTime<Utc>>,
    pub per_category_sizes: BTreeMap<String, usize>,
}

#[derive(Debug)]
struct SharedState {
    last_update: Option<DateTime<Utc>>,
    last_status: LoadState,
    update_count: u64,
    next_update_at: Option<DateTime<Utc>>,
}

impl SharedState {
    fn new() -> Self {
        Self {
            last_update: None,
            last_status: LoadState::Pending,
            update_count: 0,
            next_update_at: None,
        }
    }
}

enum Command {
    UpdateNow(oneshot::Sender<LoadState>),
}

/// Clonable handle to a running [`BlocklistLoader`].
#[derive(Clone)]
pub struct LoaderHandle {
    tx: mpsc::Sender<Command>,
    shared: Arc<RwLock<SharedState>>,
    registry: Arc<IndexRegistry>,
}

impl LoaderHandle {
    /// Trigger an immediate refresh and wait for its outcome. Coalesces with
    /// any refresh already in flight.
    pub async fn update_now(&self) -> LoadState {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(Command::UpdateNow(reply_tx)).await.is_err() {
            return LoadState::Error {
                reason: "loader stopped".to_string(),
            };
        }
        reply_rx.await.unwrap_or(LoadState::Error {
            reason: "loader stopped".to_string(),
        })
    }

    /// Current status. No I/O; index sizes come from the in-memory registry.
    pub fn status(&self) -> LoaderStatus {
        let shared = self.shared.read().expect("loader state lock poisoned");
        let per_category_sizes = CATALOG
            .iter()
            .map(|c| (c.name.to_string(), self.registry.size(c.name).unwrap_or(0)))
            .collect();
        LoaderStatus {
            last_update: shared.last_update,
            last_status: shared.last_status.clone(),
            update_count: shared.update_count,
            next_update_at: shared.next_update_at,
            per_category_sizes,
        }
    }
}

/// Owns the feed refresh lifecycle. Construct with [`BlocklistLoader::new`],
/// then drive it with [`BlocklistLoader::run`] on a dedicated task.
pub struct BlocklistLoader {
    registry: Arc<IndexRegistry>,
    fetcher: FeedFetcher,
    snapshots: SnapshotStore,
    sources: Vec<FeedSource>,
    refresh_interval: Duration,
    retry_interval: Duration,
    shared: Arc<RwLock<SharedState>>,
    rx: mpsc::Receiver<Command>,
}

impl BlocklistLoader {
    pub fn new(
        registry: Arc<IndexRegistry>,
        fetcher: FeedFetcher,
        snapshots: SnapshotStore,
    ) -> (Self, LoaderHandle) {
        Self::with_schedule(
            registry,
            fetcher,
            snapshots,
            catalog_sources(),
            REFRESH_INTERVAL,
            RETRY_INTERVAL,
        )
    }

    /// Construct with explicit sources and intervals (used by tests and by
    /// deployments that override the cadence).
    pub fn with_schedule(
        registry: Arc<IndexRegistry>,
        fetcher: FeedFetcher,
        snapshots: SnapshotStore,
        sources: Vec<FeedSource>,
        refresh_interval: Duration,
        retry_interval: Duration,
    ) -> (Self, LoaderHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let shared = Arc::new(RwLock::new(SharedState::new()));
        let handle = LoaderHandle {
            tx,
            shared: Arc::clone(&shared),
            registry: Arc::clone(&registry),
        };
        let loader = Self {
            registry,
            fetcher,
            snapshots,
            sources,
            refresh_interval,
            retry_interval,
            shared,
            rx,
        };
        (loader, handle)
    }

    /// Run until every handle is dropped.
    pub async fn run(mut self) {
        let booted = self.bootstrap();
        let mut next_at = if booted {
            self.set_next_update(self.refresh_interval);
            Instant::now() + self.refresh_interval
        } else {
            self.set_next_update(Duration::ZERO);
            Instant::now()
        };

        loop {
            tokio::select! {
                command = self.rx.recv() => {
                    let Some(Command::UpdateNow(reply)) = command else {
                        break;
                    };
                    let mut waiters = vec![reply];
                    self.drain_waiters(&mut waiters);
                    let outcome = self.refresh_once().await;
                    let state = self.record_outcome(&outcome);
                    // Requests that arrived while the refresh ran are
                    // answered by it.
                    self.drain_waiters(&mut waiters);
                    for waiter in waiters {
                        let _ = waiter.send(state.clone());
                    }
                    next_at = Instant::now() + self.delay_for(&outcome);
                }
                _ = tokio::time::sleep_until(next_at) => {
                    let outcome = self.refresh_once().await;
                    self.record_outcome(&outcome);
                    next_at = Instant::now() + self.delay_for(&outcome);
                }
            }
        }
        info!("blocklist loader stopped");
    }

    /// Create every live index (idempotent) and try to load the most recent
    /// snapshot. Returns whether a snapshot was loaded; on `false` the
    /// caller schedules an immediate fetch.
    pub fn bootstrap(&self) -> bool {
        for category in &CATALOG {
            self.registry.create(category.name);
        }
        self.registry.create(MX_CACHE);

        let Some(dir) = self.snapshots.latest() else {
            info!("no blocklist snapshot on disk, scheduling immediate fetch");
            return false;
        };

        match self.build_and_swap(&dir) {
            Ok(()) => {
                info!(snapshot = %dir.display(), "loaded blocklist snapshot");
                let mut shared = self.shared.write().expect("loader state lock poisoned");
                shared.last_status = LoadState::Ok;
                shared.last_update = Some(Utc::now());
                true
            }
            Err(err) => {
                warn!(
                    snapshot = %dir.display(),
                    error = %err,
                    "snapshot load failed, starting with empty indexes"
                );
                false
            }
        }
    }

    /// One full refresh: download into today's snapshot directory, build
    /// staging indexes, swap them live.
    pub async fn refresh_once(&self) -> Result<()> {
        info!(feeds = self.sources.len(), "starting blocklist refresh");
        let dir = self.snapshots.create_today()?;
        self.fetcher.fetch_all(&self.sources, &dir).await?;
        self.build_and_swap(&dir)
    }

    /// Build staging indexes for every source from `dir`, then promote them.
    /// Any failure before or during the swap phase garbage-collects the
    /// staging indexes; the previous live indexes stay intact (a mid-batch
    /// swap failure leaves already-promoted categories in place, which the
    /// caller reports as `swap_failed`).
    fn build_and_swap(&self, dir: &Path) -> Result<()> {
        for source in &self.sources {
            let file = SnapshotStore::category_file(dir, &source.category);
            if let Err(err) = build_staging(&self.registry, &source.category, source.kind, &file) {
                self.gc_staging();
                return Err(err);
            }
        }

        for source in &self.sources {
            let staging = staging_name(&source.category);
            if let Err(err) = self.registry.swap(&staging, &source.category) {
                error!(category = %source.category, error = %err, "index swap failed mid-batch");
                self.gc_staging();
                return Err(IntelError::SwapFailed(err));
            }
        }
        Ok(())
    }

    fn gc_staging(&self) {
        for source in &self.sources {
            self.registry.delete(&staging_name(&source.category));
        }
    }

    fn drain_waiters(&mut self, waiters: &mut Vec<oneshot::Sender<LoadState>>) {
        while let Ok(Command::UpdateNow(reply)) = self.rx.try_recv() {
            waiters.push(reply);
        }
    }

    fn delay_for(&self, outcome: &Result<()>) -> Duration {
        if outcome.is_ok() {
            self.refresh_interval
        } else {
            self.retry_interval
        }
    }

    fn set_next_update(&self, delay: Duration) {
        let next = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        self.shared
            .write()
            .expect("loader state lock poisoned")
            .next_update_at = Some(next);
    }

    fn record_outcome(&self, outcome: &Result<()>) -> LoadState {
        let state = match outcome {
            Ok(()) => LoadState::Ok,
            Err(err) => LoadState::Error {
                reason: err.reason().to_string(),
            },
        };

        {
            let mut shared = self.shared.write().expect("loader state lock poisoned");
            shared.last_status = state.clone();
            if outcome.is_ok() {
                shared.last_update = Some(Utc::now());
                shared.update_count += 1;
            }
        }
        self.set_next_update(self.delay_for(outcome));

        match outcome {
            Ok(()) => info!("blocklist refresh succeeded"),
            Err(err) => error!(
                error = %err,
                retry_in_secs = self.retry_interval.as_secs(),
                "blocklist refresh failed"
            ),
        }
        state
    }
}
