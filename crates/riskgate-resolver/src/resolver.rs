//! The MX resolver pool.
//!
//! A process-wide proxy over the fixed upstream pool. Selection and token
//! accounting happen under a short mutex; the DNS query itself runs outside
//! any critical section, so lookups against the same or different upstreams
//! proceed in parallel. Each upstream gets its own pinned hickory resolver:
//! queries go to that nameserver only, never to the system configuration.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use tracing::{debug, warn};

use riskgate_core::mx::{MxError, MxRecord, MxResolve};

use crate::pool::{default_pool, SelectState, Upstream, BUCKET_CAPACITY, REFILL_INTERVAL};

/// Deadline for a single MX query.
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

struct PoolMember {
    upstream: Upstream,
    resolver: TokioAsyncResolver,
}

/// Rate-limited, rotating MX resolver. One instance per process.
pub struct MxResolver {
    members: Vec<PoolMember>,
    state: Arc<Mutex<SelectState>>,
    refill: tokio::task::JoinHandle<()>,
}

impl MxResolver {
    /// Build the resolver over the default public pool. Must be called from
    /// within a tokio runtime (spawns the refill tick).
    pub fn new() -> Self {
        Self::with_pool(default_pool(), BUCKET_CAPACITY)
    }

    /// Build over an explicit pool with an explicit bucket capacity.
    pub fn with_pool(upstreams: Vec<Upstream>, capacity: u32) -> Self {
        let members: Vec<PoolMember> = upstreams
            .into_iter()
            .map(|upstream| PoolMember {
                resolver: pinned_resolver(&upstream),
                upstream,
            })
            .collect();

        let state = Arc::new(Mutex::new(SelectState::new(members.len(), capacity)));

        let tick_state = Arc::clone(&state);
        let refill = tokio::spawn(async move {
            let mut interval = tokio::time::interval(REFILL_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tick_state.lock().expect("resolver state poisoned").refill();
            }
        });

        Self {
            members,
            state,
            refill,
        }
    }

    /// Pick the next upstream with budget. Short critical section; the
    /// caller performs the actual query after the lock is released.
    fn select_upstream(&self) -> Result<usize, MxError> {
        self.state
            .lock()
            .expect("resolver state poisoned")
            .select()
            .ok_or(MxError::RateLimited)
    }
}

impl Drop for MxResolver {
    fn drop(&mut self) {
        self.refill.abort();
    }
}

#[async_trait]
impl MxResolve for MxResolver {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, MxError> {
        let member = &self.members[self.select_upstream()?];
        debug!(domain, upstream = member.upstream.name, "issuing MX query");

        match member.resolver.mx_lookup(domain).await {
            Ok(lookup) => {
                let mut records: Vec<MxRecord> = lookup
                    .iter()
                    .map(|mx| MxRecord {
                        priority: mx.preference(),
                        exchange: mx.exchange().to_utf8().trim_end_matches('.').to_string(),
                    })
                    .collect();
                records.sort_by(|a, b| {
                    a.priority
                        .cmp(&b.priority)
                        .then_with(|| a.exchange.cmp(&b.exchange))
                });
                Ok(records)
            }
            Err(err) => match err.kind() {
                // A clean negative answer is a result, not a failure.
                ResolveErrorKind::NoRecordsFound { .. } => Ok(Vec::new()),
                ResolveErrorKind::Timeout => {
                    debug!(domain, upstream = member.upstream.name, "MX query timed out");
                    Err(MxError::LookupFailed("query timed out".to_string()))
                }
                ResolveErrorKind::Proto(_) | ResolveErrorKind::Io(_) => {
                    // Includes malformed domain labels, which are routine
                    // caller input rather than infrastructure trouble.
                    debug!(domain, error = %err, "MX query failed");
                    Err(MxError::LookupFailed(err.to_string()))
                }
                _ => {
                    warn!(domain, error = %err, "unexpected MX resolver failure");
                    Err(MxError::Exception(err.to_string()))
                }
            },
        }
    }
}

/// A resolver that talks to exactly one nameserver, with our own caching
/// layered above it instead of hickory's.
fn pinned_resolver(upstream: &Upstream) -> TokioAsyncResolver {
    let servers = NameServerConfigGroup::from_ips_clear(&[upstream.ip], upstream.port, true);
    let config = ResolverConfig::from_parts(None, Vec::new(), servers);

    let mut options = ResolverOpts::default();
    options.timeout = LOOKUP_TIMEOUT;
    options.attempts = 1;
    options.cache_size = 0;

    TokioAsyncResolver::tokio(config, options)
}
