//! Named in-memory index registry.
//!
//! An [`Index`] is a keyed set of opaque string entries. The registry maps
//! index names to shared handles and supports the staging-swap protocol the
//! loader relies on: a staging index is built out of sight of readers, then
//! promoted into the live slot in a single observable step.
//!
//! Readers resolve a name to an `Arc<Index>` and keep reading that snapshot;
//! a concurrent swap replaces the registry slot, so a reader mid-lookup sees
//! either the old or the new index, never a missing or half-populated one.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::matcher::CidrCache;

/// Outcome of a cached MX resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MxStatus {
    /// The domain published at least one MX record.
    Valid,
    /// Empty record set, or the lookup failed.
    NoMx,
}

/// Value stored against an entry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexValue {
    /// Blocklist membership marker.
    Present,
    /// Cached MX resolution outcome (`mx_cache` index only).
    Mx(MxStatus),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no such index: {0}")]
    NoSuchIndex(String),
    #[error("index already exists: {0}")]
    AlreadyExists(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// A single named index: a concurrent map from entry string to [`IndexValue`].
#[derive(Debug, Default)]
pub struct Index {
    entries: RwLock<HashMap<String, IndexValue>>,
    /// Parsed-CIDR acceleration cache for the IP matcher. Rebuilt lazily;
    /// a swap installs a fresh `Index` so the cache never outlives the data.
    cidr_cache: RwLock<Option<CidrCache>>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, overwriting any previous value.
    pub fn insert(&self, key: impl Into<String>, value: IndexValue) {
        let mut entries = self.entries.write().expect("index lock poisoned");
        entries.insert(key.into(), value);
    }

    /// Insert an entry only if the key is absent. Returns the value now in
    /// place. This is the write path for the MX cache, whose entries are
    /// immutable for the process lifetime.
    pub fn insert_if_absent(&self, key: impl Into<String>, value: IndexValue) -> IndexValue {
        let mut entries = self.entries.write().expect("index lock poisoned");
        *entries.entry(key.into()).or_insert(value)
    }

    pub fn get(&self, key: &str) -> Option<IndexValue> {
        self.entries
            .read()
            .expect("index lock poisoned")
            .get(key)
            .copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .expect("index lock poisoned")
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("index lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entry keys. Allocates; intended for diagnostics and cache builds,
    /// not the per-request path.
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .read()
            .expect("index lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Run a closure against the entry map under the read lock.
    pub(crate) fn with_entries<R>(&self, f: impl FnOnce(&HashMap<String, IndexValue>) -> R) -> R {
        f(&self.entries.read().expect("index lock poisoned"))
    }

    pub(crate) fn cidr_cache(&self) -> &RwLock<Option<CidrCache>> {
        &self.cidr_cache
    }
}

/// The registry of named indexes.
#[derive(Debug, Default)]
pub struct IndexRegistry {
    tables: RwLock<HashMap<String, Arc<Index>>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index under `name`, returning its handle. Creating an index
    /// that already exists is a no-op and returns the existing handle, so
    /// concurrent bootstrap races are harmless.
    pub fn create(&self, name: &str) -> Arc<Index> {
        let mut tables = self.tables.write().expect("registry lock poisoned");
        Arc::clone(
            tables
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Index::new())),
        )
    }

    pub fn exists(&self, name: &str) -> bool {
        self.tables
            .read()
            .expect("registry lock poisoned")
            .contains_key(name)
    }

    /// Resolve a name to its current index snapshot.
    pub fn get(&self, name: &str) -> Option<Arc<Index>> {
        self.tables
            .read()
            .expect("registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// Entry count of an index, `None` if the name is unknown.
    pub fn size(&self, name: &str) -> Option<usize> {
        self.get(name).map(|index| index.len())
    }

    /// Look up a single key in a named index.
    pub fn lookup(&self, name: &str, key: &str) -> Option<IndexValue> {
        self.get(name)?.get(key)
    }

    /// Insert into a named index.
    pub fn insert(&self, name: &str, key: impl Into<String>, value: IndexValue) -> Result<()> {
        let index = self
            .get(name)
            .ok_or_else(|| RegistryError::NoSuchIndex(name.to_string()))?;
        index.insert(key, value);
        Ok(())
    }

    /// All keys of a named index.
    pub fn scan(&self, name: &str) -> Vec<String> {
        self.get(name).map(|index| index.keys()).unwrap_or_default()
    }

    /// Drop an index. Returns whether it existed. Readers holding the old
    /// handle keep reading it until they release the `Arc`.
    pub fn delete(&self, name: &str) -> bool {
        self.tables
            .write()
            .expect("registry lock poisoned")
            .remove(name)
            .is_some()
    }

    /// Rename an index. Refuses to clobber an existing target.
    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut tables = self.tables.write().expect("registry lock poisoned");
        if tables.contains_key(to) {
            return Err(RegistryError::AlreadyExists(to.to_string()));
        }
        let index = tables
            .remove(from)
            .ok_or_else(|| RegistryError::NoSuchIndex(from.to_string()))?;
        tables.insert(to.to_string(), index);
        Ok(())
    }

    /// Promote a staging index into the live slot in one observable step.
    /// Whatever previously lived under `live` is dropped once the last
    /// reader releases its snapshot.
    pub fn swap(&self, staging: &str, live: &str) -> Result<()> {
        let mut tables = self.tables.write().expect("registry lock poisoned");
        let index = tables
            .remove(staging)
            .ok_or_else(|| RegistryError::NoSuchIndex(staging.to_string()))?;
        tables.insert(live.to_string(), index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_is_idempotent() {
        let registry = IndexRegistry::new();
        let first = registry.create("tor_network_ip");
        first.insert("1.2.3.4", IndexValue::Present);
        let second = registry.create("tor_network_ip");
        assert_eq!(second.len(), 1, "re-create must not clear the index");
    }

    #[test]
    fn lookup_and_size() {
        let registry = IndexRegistry::new();
        registry.create("disposable_email");
        registry
            .insert("disposable_email", "tempmail.com", IndexValue::Present)
            .unwrap();

        assert_eq!(
            registry.lookup("disposable_email", "tempmail.com"),
            Some(IndexValue::Present)
        );
        assert_eq!(registry.lookup("disposable_email", "gmail.com"), None);
        assert_eq!(registry.size("disposable_email"), Some(1));
        assert_eq!(registry.size("nope"), None);
    }

    #[test]
    fn insert_into_missing_index_errors() {
        let registry = IndexRegistry::new();
        let err = registry
            .insert("missing", "k", IndexValue::Present)
            .unwrap_err();
        assert_eq!(err, RegistryError::NoSuchIndex("missing".into()));
    }

    #[test]
    fn swap_replaces_live_atomically_for_new_readers() {
        let registry = IndexRegistry::new();
        let live = registry.create("vpn_ip");
        live.insert("10.0.0.1", IndexValue::Present);

        let staging = registry.create("staging:vpn_ip");
        staging.insert("10.0.0.2", IndexValue::Present);

        // A reader that resolved before the swap keeps its snapshot.
        let old = registry.get("vpn_ip").unwrap();

        registry.swap("staging:vpn_ip", "vpn_ip").unwrap();

        assert!(old.contains("10.0.0.1"));
        let fresh = registry.get("vpn_ip").unwrap();
        assert!(fresh.contains("10.0.0.2"));
        assert!(!fresh.contains("10.0.0.1"));
        assert!(!registry.exists("staging:vpn_ip"));
    }

    #[test]
    fn swap_of_missing_staging_fails_and_preserves_live() {
        let registry = IndexRegistry::new();
        let live = registry.create("vpn_ip");
        live.insert("10.0.0.1", IndexValue::Present);

        let err = registry.swap("staging:vpn_ip", "vpn_ip").unwrap_err();
        assert!(matches!(err, RegistryError::NoSuchIndex(_)));
        assert!(registry.get("vpn_ip").unwrap().contains("10.0.0.1"));
    }

    #[test]
    fn rename_refuses_to_clobber() {
        let registry = IndexRegistry::new();
        registry.create("a");
        registry.create("b");
        assert_eq!(
            registry.rename("a", "b"),
            Err(RegistryError::AlreadyExists("b".into()))
        );
        registry.delete("b");
        registry.rename("a", "b").unwrap();
        assert!(registry.exists("b"));
        assert!(!registry.exists("a"));
    }

    #[test]
    fn mx_cache_entries_are_first_writer_wins() {
        let index = Index::new();
        let first = index.insert_if_absent("acme.com", IndexValue::Mx(MxStatus::Valid));
        assert_eq!(first, IndexValue::Mx(MxStatus::Valid));
        let second = index.insert_if_absent("acme.com", IndexValue::Mx(MxStatus::NoMx));
        assert_eq!(second, IndexValue::Mx(MxStatus::Valid));
    }

    #[test]
    fn duplicate_inserts_collapse() {
        let index = Index::new();
        index.insert("1.1.1.1", IndexValue::Present);
        index.insert("1.1.1.1", IndexValue::Present);
        assert_eq!(index.len(), 1);
    }
}
