//! The compile-time category catalog.
//!
//! Every blocklist category the service knows about is declared here: its
//! name (which doubles as the live index name and the reason string), the
//! risk tier it carries, whether its entries are IPs or email domains, and
//! the upstream feed it is refreshed from.

use serde::{Deserialize, Serialize};

/// Risk tier attached to a category and produced by the classifier.
///
/// The derived ordering is the priority ordering used by the merge algebra:
/// `None < Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// The wire representation (`"none"`, `"low"`, `"medium"`, `"high"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::None => "none",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of entries a category's feed carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Bare IPv4 addresses and CIDRv4 ranges.
    Ip,
    /// Lowercased domain names.
    Email,
}

/// A single catalog entry: one feed, one live index, one risk tier.
#[derive(Debug, Clone, Copy)]
pub struct Category {
    /// Index name and reason string, e.g. `"tor_network_ip"`.
    pub name: &'static str,
    /// Tier contributed when an entry of this category matches.
    pub tier: RiskLevel,
    pub kind: IndexKind,
    /// Upstream feed, plain-text, one record per line.
    pub feed_url: &'static str,
}

/// Name of the dedicated MX result cache index.
pub const MX_CACHE: &str = "mx_cache";

/// The fixed category catalog.
pub const CATALOG: [Category; 12] = [
    Category {
        name: "criminal_network_ip",
        tier: RiskLevel::High,
        kind: IndexKind::Ip,
        feed_url: "https://feodotracker.abuse.ch/downloads/ipblocklist.txt",
    },
    Category {
        name: "malicious_ip",
        tier: RiskLevel::High,
        kind: IndexKind::Ip,
        feed_url: "https://cinsscore.com/list/ci-badguys.txt",
    },
    Category {
        name: "tor_network_ip",
        tier: RiskLevel::High,
        kind: IndexKind::Ip,
        feed_url: "https://check.torproject.org/torbulkexitlist",
    },
    Category {
        name: "recent_attacker_ip",
        tier: RiskLevel::High,
        kind: IndexKind::Ip,
        feed_url: "https://blocklist.greensnow.co/greensnow.txt",
    },
    Category {
        name: "disposable_email",
        tier: RiskLevel::High,
        kind: IndexKind::Email,
        feed_url: "https://raw.githubusercontent.com/disposable-email-domains/disposable-email-domains/main/disposable_email_blocklist.conf",
    },
    Category {
        name: "week_attacker_ip",
        tier: RiskLevel::Medium,
        kind: IndexKind::Ip,
        feed_url: "https://lists.blocklist.de/lists/all.txt",
    },
    Category {
        name: "suspicious_ip",
        tier: RiskLevel::Medium,
        kind: IndexKind::Ip,
        feed_url: "https://rules.emergingthreats.net/blockrules/compromised-ips.txt",
    },
    Category {
        name: "vpn_ip",
        tier: RiskLevel::Medium,
        kind: IndexKind::Ip,
        feed_url: "https://raw.githubusercontent.com/X4BNet/lists_vpn/main/output/vpn/ipv4.txt",
    },
    Category {
        name: "datacenter_ip",
        tier: RiskLevel::Medium,
        kind: IndexKind::Ip,
        feed_url: "https://raw.githubusercontent.com/X4BNet/lists_vpn/main/output/datacenter/ipv4.txt",
    },
    Category {
        name: "privacy_email",
        tier: RiskLevel::Medium,
        kind: IndexKind::Email,
        feed_url: "https://raw.githubusercontent.com/levinunnink/privacy-email-domains/main/domains.txt",
    },
    Category {
        name: "reported_ip",
        tier: RiskLevel::Low,
        kind: IndexKind::Ip,
        feed_url: "https://raw.githubusercontent.com/stamparm/ipsum/master/ipsum.txt",
    },
    Category {
        name: "old_attacker_ip",
        tier: RiskLevel::Low,
        kind: IndexKind::Ip,
        feed_url: "https://iplists.firehol.org/files/firehol_abusers_30d.netset",
    },
];

/// Consultation order for the IP sub-classifier. First hit wins; the tier
/// contributed is the matched category's own tier.
pub const IP_CHECK_ORDER: [&str; 10] = [
    "criminal_network_ip",
    "malicious_ip",
    "tor_network_ip",
    "recent_attacker_ip",
    "week_attacker_ip",
    "suspicious_ip",
    "vpn_ip",
    "datacenter_ip",
    "old_attacker_ip",
    "reported_ip",
];

/// Well-known consumer mail providers. A signup from one of these domains is
/// ordinary retail traffic: worth a `low` note, never a block.
pub const TRUSTED_PROVIDERS: [&str; 15] = [
    "gmail.com",
    "googlemail.com",
    "outlook.com",
    "hotmail.com",
    "live.com",
    "msn.com",
    "yahoo.com",
    "ymail.com",
    "icloud.com",
    "me.com",
    "mac.com",
    "aol.com",
    "protonmail.com",
    "proton.me",
    "zoho.com",
];

/// Look up a catalog entry by name.
pub fn category(name: &str) -> Option<&'static Category> {
    CATALOG.iter().find(|c| c.name == name)
}

/// The staging index name for a category (`staging:<name>`).
pub fn staging_name(category: &str) -> String {
    format!("staging:{category}")
}

/// Whether a domain belongs to the trusted free-provider set.
pub fn is_trusted_provider(domain: &str) -> bool {
    TRUSTED_PROVIDERS.contains(&domain)
}
