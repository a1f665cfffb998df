//! Exact and CIDR membership testing for IPv4 indexes.
//!
//! A query first tries an exact key hit, then falls back to scanning the
//! index's CIDR entries. The parsed CIDR list is cached per index and
//! rebuilt at most every five minutes; a swap installs a new index object
//! with an empty cache, so promoted data is matched immediately.

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::registry::Index;

/// Maximum age of a parsed-CIDR cache before it is rebuilt.
const CIDR_CACHE_MAX_AGE: Duration = Duration::from_secs(300);

/// A parsed CIDRv4 range, base pre-masked for cheap containment checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CidrNet {
    base: u32,
    mask: u32,
}

impl CidrNet {
    /// Parse `a.b.c.d/p` with `0 <= p <= 32`. Anything else is `None`.
    fn parse(s: &str) -> Option<Self> {
        let (addr, prefix) = s.split_once('/')?;
        let base: Ipv4Addr = addr.parse().ok()?;
        let prefix: u8 = prefix.parse().ok()?;
        if prefix > 32 {
            return None;
        }
        let mask = if prefix == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(prefix))
        };
        Some(Self {
            base: u32::from(base) & mask,
            mask,
        })
    }

    fn contains(&self, ip: u32) -> bool {
        ip & self.mask == self.base
    }
}

/// Parsed CIDR entries of one index plus the build timestamp.
#[derive(Debug)]
pub(crate) struct CidrCache {
    built_at: Instant,
    nets: Vec<CidrNet>,
}

/// Membership test: does `ip` hit the index, either as an exact entry or
/// inside one of its CIDR ranges?
///
/// Only a syntactically valid dotted-quad IPv4 is accepted; anything else
/// (including IPv6) is logged at warn level and reported as a non-match.
pub fn matches(index: &Index, ip: &str) -> bool {
    let addr: Ipv4Addr = match ip.parse() {
        Ok(addr) => addr,
        Err(_) => {
            warn!(input = %ip, "ip matcher rejected non-IPv4 query");
            return false;
        }
    };

    if index.contains(ip) {
        return true;
    }

    matches_cidr(index, u32::from(addr))
}

fn matches_cidr(index: &Index, query: u32) -> bool {
    {
        let cache = index.cidr_cache().read().expect("cidr cache lock poisoned");
        if let Some(cache) = cache.as_ref() {
            if cache.built_at.elapsed() < CIDR_CACHE_MAX_AGE {
                return cache.nets.iter().any(|net| net.contains(query));
            }
        }
    }

    // Cache missing or stale: rebuild from the current entries. Malformed
    // CIDR entries are dropped from matching.
    let nets: Vec<CidrNet> = index.with_entries(|entries| {
        entries
            .keys()
            .filter(|key| key.contains('/'))
            .filter_map(|key| CidrNet::parse(key))
            .collect()
    });
    let hit = nets.iter().any(|net| net.contains(query));

    let mut cache = index
        .cidr_cache()
        .write()
        .expect("cidr cache lock poisoned");
    *cache = Some(CidrCache {
        built_at: Instant::now(),
        nets,
    });
    hit
}
