//! Blocklist feed lifecycle for riskgate.
//!
//! This crate owns everything between an upstream feed URL and a live
//! in-memory index:
//! - [`fetch`]: bounded-concurrency HTTP downloads with a hard deadline
//! - [`parse`]: tolerant feed-line parsing into staging indexes
//! - [`snapshot`]: the dated on-disk layout of the last good download
//! - [`loader`]: the supervisor task driving boot, daily refresh, and retry

pub mod error;
pub mod fetch;
pub mod loader;
pub mod parse;
pub mod snapshot;

pub use error::IntelError;
pub use fetch::{catalog_sources, FeedFetcher, FeedSource};
pub use loader::{BlocklistLoader, LoadState, LoaderHandle, LoaderStatus};
pub use snapshot::{SnapshotStore, DEFAULT_BASE_DIR};
