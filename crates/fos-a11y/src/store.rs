//! Attribute Store
//!
//! Per-node key/value cache with a populated bit per domain. A key is
//! observable only once its whole domain has been populated, so readers
//! never see half of a domain.

use std::collections::{BTreeMap, HashMap};

use fos_dom::NodeId;

use crate::{CacheDomain, CacheKey, CacheValue};

/// Result of a store lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachedAttribute<'a> {
    /// Domain never computed (or invalidated) for this node
    NotPopulated,
    /// Domain computed, key has no value for this node
    Absent,
    /// Cached value
    Present(&'a CacheValue),
}

impl<'a> CachedAttribute<'a> {
    pub fn is_populated(&self) -> bool {
        !matches!(self, Self::NotPopulated)
    }

    pub fn value(&self) -> Option<&'a CacheValue> {
        match self {
            Self::Present(v) => Some(v),
            _ => None,
        }
    }
}

/// One node's cached attributes
#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    /// Cached values
    values: BTreeMap<CacheKey, CacheValue>,
    /// Domains whose values are complete
    populated: CacheDomain,
}

impl CacheEntry {
    pub fn populated(&self) -> CacheDomain {
        self.populated
    }

    pub fn values(&self) -> impl Iterator<Item = (CacheKey, &CacheValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    fn clear(&mut self, domain: CacheDomain) {
        self.values.retain(|k, _| !domain.intersects(k.domain()));
        self.populated.remove(domain);
    }
}

/// Store statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Nodes with an entry
    pub nodes: usize,
    /// Cached values across all nodes
    pub values: usize,
}

/// The cache data structure
#[derive(Debug, Default)]
pub struct AttributeStore {
    entries: HashMap<NodeId, CacheEntry>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a key; never blocks, unknown nodes are `NotPopulated`
    pub fn get(&self, node: NodeId, key: CacheKey) -> CachedAttribute<'_> {
        let Some(entry) = self.entries.get(&node) else {
            return CachedAttribute::NotPopulated;
        };
        if !entry.populated.contains(key.domain()) {
            return CachedAttribute::NotPopulated;
        }
        match entry.values.get(&key) {
            Some(v) => CachedAttribute::Present(v),
            None => CachedAttribute::Absent,
        }
    }

    /// Write one value and mark its domain populated
    pub fn set(&mut self, node: NodeId, key: CacheKey, value: CacheValue) {
        let entry = self.entries.entry(node).or_default();
        entry.values.insert(key, value);
        entry.populated.insert(key.domain());
    }

    /// Replace every value of a single domain
    pub fn populate(&mut self, node: NodeId, domain: CacheDomain, entries: Vec<(CacheKey, CacheValue)>) {
        debug_assert!(domain.is_single(), "populate expects one domain, got {domain}");
        let entry = self.entries.entry(node).or_default();
        entry.clear(domain);
        for (key, value) in entries {
            debug_assert_eq!(key.domain(), domain, "{key} does not belong to {domain}");
            entry.values.insert(key, value);
        }
        entry.populated.insert(domain);
    }

    /// Unset every key of `domain` for a node.
    ///
    /// Returns the domains that were populated before the clear.
    pub fn clear_domain(&mut self, node: NodeId, domain: CacheDomain) -> CacheDomain {
        let Some(entry) = self.entries.get_mut(&node) else {
            return CacheDomain::NONE;
        };
        let was_populated = entry.populated & domain;
        entry.clear(domain);
        was_populated
    }

    /// Drop every entry of a node; a second eviction is a no-op
    pub fn evict(&mut self, node: NodeId) -> bool {
        self.entries.remove(&node).is_some()
    }

    /// Is the whole of `domain` populated for the node?
    pub fn is_populated(&self, node: NodeId, domain: CacheDomain) -> bool {
        self.populated_domains(node).contains(domain)
    }

    /// Domains populated for a node
    pub fn populated_domains(&self, node: NodeId) -> CacheDomain {
        self.entries.get(&node).map(|e| e.populated).unwrap_or_default()
    }

    /// Snapshot of one domain's values, `None` if not populated
    pub fn entries(&self, node: NodeId, domain: CacheDomain) -> Option<Vec<(CacheKey, CacheValue)>> {
        let entry = self.entries.get(&node)?;
        if !entry.populated.contains(domain) {
            return None;
        }
        Some(
            entry
                .values
                .iter()
                .filter(|(k, _)| domain.intersects(k.domain()))
                .map(|(k, v)| (*k, v.clone()))
                .collect(),
        )
    }

    /// Whole entry of a node
    pub fn entry(&self, node: NodeId) -> Option<&CacheEntry> {
        self.entries.get(&node)
    }

    /// Nodes with an entry
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.keys().copied()
    }

    /// Drop everything (document teardown)
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            nodes: self.entries.len(),
            values: self.entries.values().map(|e| e.values.len()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(n: u32) -> NodeId {
        NodeId::from_raw(n)
    }

    #[test]
    fn test_unknown_node_not_populated() {
        let store = AttributeStore::new();
        assert_eq!(store.get(node(7), CacheKey::Language), CachedAttribute::NotPopulated);
    }

    #[test]
    fn test_set_then_get() {
        let mut store = AttributeStore::new();
        store.set(node(1), CacheKey::Language, CacheValue::str("fr"));

        assert_eq!(
            store.get(node(1), CacheKey::Language).value(),
            Some(&CacheValue::str("fr"))
        );
        // Sibling key of the same domain is now known to be absent
        assert_eq!(store.get(node(1), CacheKey::TextStyle), CachedAttribute::Absent);
        // Other domains untouched
        assert_eq!(store.get(node(1), CacheKey::Level), CachedAttribute::NotPopulated);
    }

    #[test]
    fn test_clear_domain_only_touches_that_domain() {
        let mut store = AttributeStore::new();
        store.set(node(1), CacheKey::Language, CacheValue::str("fr"));
        store.set(node(1), CacheKey::AccessKey, CacheValue::str("k"));

        assert_eq!(store.clear_domain(node(1), CacheDomain::TEXT), CacheDomain::TEXT);
        assert_eq!(store.get(node(1), CacheKey::Language), CachedAttribute::NotPopulated);
        assert!(store.get(node(1), CacheKey::AccessKey).value().is_some());

        assert_eq!(store.clear_domain(node(1), CacheDomain::TEXT), CacheDomain::NONE);
        assert_eq!(store.clear_domain(node(9), CacheDomain::ALL), CacheDomain::NONE);
    }

    #[test]
    fn test_populate_replaces_domain() {
        let mut store = AttributeStore::new();
        store.populate(node(2), CacheDomain::GROUP_INFO, vec![
            (CacheKey::PosInSet, CacheValue::Int(1)),
            (CacheKey::SetSize, CacheValue::Int(2)),
        ]);
        store.populate(node(2), CacheDomain::GROUP_INFO, vec![]);

        assert!(store.is_populated(node(2), CacheDomain::GROUP_INFO));
        assert_eq!(store.get(node(2), CacheKey::PosInSet), CachedAttribute::Absent);
        assert_eq!(store.entries(node(2), CacheDomain::GROUP_INFO), Some(vec![]));
    }

    #[test]
    fn test_evict_twice() {
        let mut store = AttributeStore::new();
        store.set(node(3), CacheKey::Name, CacheValue::str("OK"));

        assert!(store.evict(node(3)));
        assert!(!store.evict(node(3)));
        assert!(store.is_empty());
        assert_eq!(store.get(node(3), CacheKey::Name), CachedAttribute::NotPopulated);
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn test_populate_domain_mismatch_panics_in_debug() {
        let mut store = AttributeStore::new();
        store.populate(node(1), CacheDomain::TEXT, vec![(CacheKey::Level, CacheValue::Int(1))]);
    }

    #[test]
    fn test_stats() {
        let mut store = AttributeStore::new();
        store.set(node(1), CacheKey::Name, CacheValue::str("a"));
        store.set(node(1), CacheKey::Description, CacheValue::str("b"));
        store.set(node(2), CacheKey::Name, CacheValue::str("c"));
        assert_eq!(store.stats(), StoreStats { nodes: 2, values: 3 });
    }
}
