//! Query facade
//!
//! Entry point for native accessibility bridges. Reads hit the mirror
//! only; a miss posts a population request and returns `Pending` so the
//! calling thread never waits on the content process.

use std::sync::Arc;

use fos_dom::NodeId;
use tracing::{trace, warn};

use crate::{A11yError, CacheKey, CacheValue, CachedAttribute, RemoteMirror};

/// Answer to a bridge query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    Value(CacheValue),
    /// Domain is populated but the node has no such attribute
    Absent,
    /// Not cached yet; a population request is in flight
    Pending,
}

impl QueryResult {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn value(&self) -> Option<&CacheValue> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// Non-blocking reader over a [`RemoteMirror`], shareable across threads
#[derive(Debug, Clone)]
pub struct QueryFacade {
    mirror: Arc<RemoteMirror>,
}

impl QueryFacade {
    pub fn new(mirror: Arc<RemoteMirror>) -> Self {
        Self { mirror }
    }

    pub fn mirror(&self) -> &Arc<RemoteMirror> {
        &self.mirror
    }

    /// Look up one attribute
    pub fn query_attribute(&self, node: NodeId, key: CacheKey) -> QueryResult {
        let cached = self.mirror.with_store(|store| match store.get(node, key) {
            CachedAttribute::Present(v) => Some(QueryResult::Value(v.clone())),
            CachedAttribute::Absent => Some(QueryResult::Absent),
            CachedAttribute::NotPopulated => None,
        });
        if let Some(result) = cached {
            trace!(node = %node, key = %key, "cache hit");
            return result;
        }

        // Nothing will ever arrive for a node that left the document
        if self.mirror.is_evicted(node) {
            return QueryResult::Absent;
        }
        if let Err(err) = self.mirror.request_population(node, key.domain()) {
            warn!(node = %node, key = %key, error = %err, "population request failed");
        }
        trace!(node = %node, key = %key, "cache miss");
        QueryResult::Pending
    }

    /// Look up an attribute by its bridge-facing name
    pub fn query_by_name(&self, node: NodeId, name: &str) -> Result<QueryResult, A11yError> {
        let key = CacheKey::from_name(name).ok_or_else(|| A11yError::UnknownKey(name.to_string()))?;
        Ok(self.query_attribute(node, key))
    }

    /// Every cached attribute of a node as `(name, value)` string pairs
    pub fn query_attributes(&self, node: NodeId) -> Vec<(&'static str, String)> {
        self.mirror.with_store(|store| {
            store
                .entry(node)
                .map(|entry| {
                    entry
                        .values()
                        .map(|(key, value)| (key.name(), value.to_attribute_string()))
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    /// Bridge form: empty string while pending or when absent
    pub fn attribute_string(&self, node: NodeId, key: CacheKey) -> String {
        match self.query_attribute(node, key) {
            QueryResult::Value(v) => v.to_attribute_string(),
            QueryResult::Absent | QueryResult::Pending => String::new(),
        }
    }
}
