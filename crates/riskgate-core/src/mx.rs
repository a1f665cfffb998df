//! The MX resolution seam between the classifier and the resolver pool.

use async_trait::async_trait;
use thiserror::Error;

/// One MX record: `(priority, exchange hostname)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxRecord {
    pub priority: u16,
    pub exchange: String,
}

#[derive(Debug, Error)]
pub enum MxError {
    /// Every upstream resolver has exhausted its per-second budget.
    #[error("all upstream resolvers are out of budget")]
    RateLimited,

    /// Transport, timeout, or protocol failure talking to the upstream.
    #[error("mx lookup failed: {0}")]
    LookupFailed(String),

    /// A failure the resolver did not anticipate.
    #[error("unexpected resolver failure: {0}")]
    Exception(String),
}

/// Something that can resolve MX records for a domain.
///
/// Implementations return records sorted ascending by priority and an empty
/// vector for a domain that publishes no MX records.
#[async_trait]
pub trait MxResolve: Send + Sync {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, MxError>;
}
