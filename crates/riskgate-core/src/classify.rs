//! The risk classifier.
//!
//! Merges an IP verdict and an email verdict into a final `(level, reasons)`
//! pair. The IP side is a straight walk over the catalog's IP indexes in
//! priority order; the email side checks the domain lists, the trusted
//! free-provider set, and finally MX reachability through the shared cache.
//!
//! The classifier itself never fails: every MX resolution error collapses to
//! `no_mx`, which reads as an undeliverable address.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::{self, RiskLevel, IP_CHECK_ORDER, MX_CACHE};
use crate::matcher;
use crate::mx::{MxError, MxResolve};
use crate::registry::{IndexRegistry, IndexValue, MxStatus};

/// Reason attached to a trusted free-provider domain.
const REASON_FREE_EMAIL: &str = "free_email";
/// Reason attached to a domain with no working MX.
const REASON_INVALID_EMAIL: &str = "invalid_email";

/// The classifier's output: a tier plus machine-readable reasons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    #[serde(rename = "risk_level")]
    pub level: RiskLevel,
    pub reasons: Vec<String>,
}

impl Verdict {
    fn clean() -> Self {
        Self {
            level: RiskLevel::None,
            reasons: Vec::new(),
        }
    }
}

/// One side's contribution before the merge.
#[derive(Debug, Clone)]
struct Outcome {
    level: RiskLevel,
    reasons: Vec<String>,
}

impl Outcome {
    fn none() -> Self {
        Self {
            level: RiskLevel::None,
            reasons: Vec::new(),
        }
    }

    fn single(level: RiskLevel, reason: &str) -> Self {
        Self {
            level,
            reasons: vec![reason.to_string()],
        }
    }
}

/// The signup-risk classifier.
pub struct Classifier {
    registry: Arc<IndexRegistry>,
    mx: Arc<dyn MxResolve>,
}

impl Classifier {
    pub fn new(registry: Arc<IndexRegistry>, mx: Arc<dyn MxResolve>) -> Self {
        Self { registry, mx }
    }

    /// Classify a signup. Either side may be absent; an absent side
    /// contributes a clean outcome. The IP side is classified first and the
    /// email side merged into it.
    pub async fn classify(&self, email: Option<&str>, ip: Option<&str>) -> Verdict {
        let ip_outcome = match ip {
            Some(ip) => self.classify_ip(ip),
            None => Outcome::none(),
        };
        let email_outcome = match email {
            Some(email) => self.classify_email(email).await,
            None => Outcome::none(),
        };
        merge(ip_outcome, email_outcome)
    }

    /// Walk the IP indexes in consultation order; the first hit wins and
    /// contributes that category's tier with the category name as reason.
    fn classify_ip(&self, ip: &str) -> Outcome {
        for name in IP_CHECK_ORDER {
            let Some(index) = self.registry.get(name) else {
                continue;
            };
            if matcher::matches(&index, ip) {
                let tier = catalog::category(name)
                    .map(|c| c.tier)
                    .unwrap_or(RiskLevel::None);
                debug!(ip, category = name, tier = %tier, "ip matched blocklist");
                return Outcome::single(tier, name);
            }
        }
        Outcome::none()
    }

    async fn classify_email(&self, email: &str) -> Outcome {
        let domain = domain_of(email);

        if self.registry.lookup("disposable_email", &domain).is_some() {
            return Outcome::single(RiskLevel::High, "disposable_email");
        }
        if self.registry.lookup("privacy_email", &domain).is_some() {
            return Outcome::single(RiskLevel::Medium, "privacy_email");
        }
        if catalog::is_trusted_provider(&domain) {
            return Outcome::single(RiskLevel::Low, REASON_FREE_EMAIL);
        }

        match self.mx_status(&domain).await {
            MxStatus::Valid => Outcome::none(),
            MxStatus::NoMx => Outcome::single(RiskLevel::High, REASON_INVALID_EMAIL),
        }
    }

    /// MX reachability for a domain, read through the shared cache. The
    /// first resolution of a domain is the only point where classification
    /// performs I/O.
    async fn mx_status(&self, domain: &str) -> MxStatus {
        if let Some(IndexValue::Mx(status)) = self.registry.lookup(MX_CACHE, domain) {
            return status;
        }

        let status = match self.mx.lookup_mx(domain).await {
            Ok(records) if !records.is_empty() => MxStatus::Valid,
            Ok(_) => MxStatus::NoMx,
            Err(MxError::RateLimited) => {
                warn!(domain, "mx lookup rate limited, treating as no_mx");
                MxStatus::NoMx
            }
            Err(err) => {
                debug!(domain, error = %err, "mx lookup failed, treating as no_mx");
                MxStatus::NoMx
            }
        };

        // First writer wins; a racing resolution of the same domain is
        // cached once and never rewritten.
        match self.registry.get(MX_CACHE) {
            Some(cache) => {
                if let IndexValue::Mx(cached) =
                    cache.insert_if_absent(domain, IndexValue::Mx(status))
                {
                    return cached;
                }
                status
            }
            None => status,
        }
    }
}

/// The domain part of an address: everything after the last `@`, trimmed
/// and lowercased. An input without `@` is treated as a bare domain.
fn domain_of(email: &str) -> String {
    email
        .rsplit('@')
        .next()
        .unwrap_or(email)
        .trim()
        .to_lowercase()
}

/// The tier algebra. `cur` is the IP outcome, `new` the email outcome.
/// Every cell is the numeric max except `(low, none)`: a deliverable
/// corporate address cleans a low-tier IP.
fn resolve_level(cur: RiskLevel, new: RiskLevel) -> RiskLevel {
    if cur == RiskLevel::Low && new == RiskLevel::None {
        RiskLevel::None
    } else {
        cur.max(new)
    }
}

fn merge(cur: Outcome, new: Outcome) -> Verdict {
    let level = resolve_level(cur.level, new.level);

    if level == RiskLevel::None && cur.level == RiskLevel::Low {
        // The clean-override cell: the low-tier IP reason is dropped.
        return Verdict::clean();
    }

    let reasons = if level == new.level && new.level != RiskLevel::None {
        dedup_concat(new.reasons, cur.reasons)
    } else if level == cur.level {
        cur.reasons
    } else {
        dedup_concat(new.reasons, cur.reasons)
    };

    Verdict { level, reasons }
}

/// Concatenate preserving order, dropping duplicates after their first
/// appearance.
fn dedup_concat(first: Vec<String>, second: Vec<String>) -> Vec<String> {
    let mut out = first;
    for reason in second {
        if !out.contains(&reason) {
            out.push(reason);
        }
    }
    out
}
