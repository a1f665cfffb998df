//! Feed line parsing and staging index builds.
//!
//! Upstream feeds are messy: comment blocks, trailing annotations, count
//! columns. The parser keeps the leading token of each data line and drops
//! everything else. Individual malformed lines are dropped silently; only a
//! file-level read failure is an error.

use std::path::Path;

use tracing::debug;

use riskgate_core::catalog::{staging_name, IndexKind};
use riskgate_core::{IndexRegistry, IndexValue};

use crate::error::{IntelError, Result};

/// Parse one raw feed line into a canonical entry.
///
/// Rules, in order: trim; drop empty lines and `#` comment lines; truncate
/// at the earliest occurrence of `#`, `;`, or a tab; trim again; drop if
/// nothing is left. Email entries are lowercased, IP entries kept verbatim
/// (CIDR suffixes included).
pub fn parse_line(line: &str, kind: IndexKind) -> Option<String> {
    let mut entry = line.trim();
    if entry.is_empty() || entry.starts_with('#') {
        return None;
    }
    if let Some(cut) = entry.find(['#', ';', '\t']) {
        entry = &entry[..cut];
    }
    let entry = entry.trim();
    if entry.is_empty() {
        return None;
    }
    Some(match kind {
        IndexKind::Email => entry.to_lowercase(),
        IndexKind::Ip => entry.to_string(),
    })
}

/// Build the staging index for one category from a feed file on disk.
///
/// Any leftover staging index from a previous failed run is discarded first.
/// Returns the number of distinct entries staged.
pub fn build_staging(
    registry: &IndexRegistry,
    category: &str,
    kind: IndexKind,
    file: &Path,
) -> Result<usize> {
    let raw = std::fs::read_to_string(file).map_err(|e| IntelError::LoadFailed {
        category: category.to_string(),
        detail: format!("{}: {e}", file.display()),
    })?;

    let staging = staging_name(category);
    registry.delete(&staging);
    let index = registry.create(&staging);

    for line in raw.lines() {
        if let Some(entry) = parse_line(line, kind) {
            index.insert(entry, IndexValue::Present);
        }
    }

    let staged = index.len();
    debug!(category, staged, "built staging index");
    Ok(staged)
}
