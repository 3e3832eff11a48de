//! fOS Accessibility Cache
//!
//! Caches computed accessibility attributes per node, partitioned into
//! [`CacheDomain`]s so DOM changes invalidate only what they affect.
//!
//! Features:
//! - Lazily populated [`AttributeStore`] with per-domain populated bits
//! - [`InvalidationDispatcher`] mapping DOM changes to domains
//! - [`CrossProcessSync`] sending sequenced deltas to a [`RemoteMirror`]
//! - Non-blocking [`QueryFacade`] for native bridges
//! - One [`CacheContext`] per document, no global state

pub mod aria;
pub mod compute;
pub mod config;
pub mod context;
pub mod domain;
pub mod invalidation;
pub mod key;
pub mod mirror;
pub mod query;
pub mod store;
pub mod sync;
pub mod value;

pub use aria::AriaRole;
pub use compute::compute_domain;
pub use config::{AttributeRule, CacheConfig, StyleRule};
pub use context::{CacheContext, TickReport};
pub use domain::CacheDomain;
pub use invalidation::{
    ChangeMap, ChangeRule, DomainState, Invalidation, InvalidationDispatcher, PopulationQueue,
};
pub use key::CacheKey;
pub use mirror::{MirrorStats, RemoteMirror};
pub use query::{QueryFacade, QueryResult};
pub use store::{AttributeStore, CacheEntry, CachedAttribute, StoreStats};
pub use sync::{CacheDelta, CacheMessage, CrossProcessSync, DeltaPayload, SyncStats};
pub use value::{ActionKind, CachePoint, CacheRect, CacheValue};

use fos_dom::DocumentId;

/// Accessibility cache error
#[derive(Debug, thiserror::Error)]
pub enum A11yError {
    #[error("IPC error: {0}")]
    Ipc(#[from] fos_ipc::IpcError),

    #[error("Invalid cache configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Unknown cache domain: {0}")]
    UnknownDomain(String),

    #[error("Unknown cache key: {0}")]
    UnknownKey(String),

    #[error("Context belongs to {expected}, got {got}")]
    DocumentMismatch { expected: DocumentId, got: DocumentId },
}
