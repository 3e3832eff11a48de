//! Remote mirror
//!
//! Parent-process shadow of a document's cache. Only deltas coming off
//! the channel mutate it; native bridge threads read it concurrently
//! through [`QueryFacade`](crate::QueryFacade).

use std::collections::{HashMap, HashSet};

use fos_dom::NodeId;
use fos_ipc::{IpcEndpoint, IpcError, IpcSender};
use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use crate::sync::{CacheDelta, CacheMessage, DeltaPayload};
use crate::{A11yError, AttributeStore, CacheDomain};

/// Mirror statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorStats {
    /// Deltas applied
    pub applied: u64,
    /// Out-of-order deltas dropped
    pub stale_dropped: u64,
    /// Deltas for evicted nodes dropped
    pub evicted_dropped: u64,
    /// Resync requests sent
    pub resyncs_requested: u64,
    /// Population requests sent
    pub populate_requests: u64,
}

#[derive(Debug, Default)]
struct MirrorState {
    store: AttributeStore,
    last_applied: HashMap<(NodeId, CacheDomain), u64>,
    awaiting_resync: HashSet<(NodeId, CacheDomain)>,
    evicted: HashSet<NodeId>,
    /// Population requests sent and not yet answered
    requested: HashSet<(NodeId, CacheDomain)>,
    stats: MirrorStats,
}

impl MirrorState {
    fn forget_node(&mut self, node: NodeId) {
        self.last_applied.retain(|(n, _), _| *n != node);
        self.awaiting_resync.retain(|(n, _)| *n != node);
        self.requested.retain(|(n, _)| *n != node);
    }
}

/// Read-only shadow cache for one document
#[derive(Debug)]
pub struct RemoteMirror {
    routing_id: u32,
    /// Back channel to the content process
    sender: IpcSender,
    state: RwLock<MirrorState>,
}

impl RemoteMirror {
    pub fn new(routing_id: u32, sender: IpcSender) -> Self {
        Self {
            routing_id,
            sender,
            state: RwLock::new(MirrorState::default()),
        }
    }

    pub fn routing_id(&self) -> u32 {
        self.routing_id
    }

    /// Drain and apply every queued message. Returns messages handled.
    ///
    /// Malformed frames are logged and skipped; a closed channel is an error.
    pub fn pump(&self, endpoint: &IpcEndpoint) -> Result<usize, A11yError> {
        let mut handled = 0;
        loop {
            let msg = match endpoint.try_recv() {
                Ok(Some(msg)) => msg,
                Ok(None) => break,
                Err(err @ IpcError::Disconnected(_)) => return Err(err.into()),
                Err(err) => {
                    warn!(routing_id = self.routing_id, error = %err, "malformed frame dropped");
                    continue;
                }
            };
            if msg.routing_id != self.routing_id {
                warn!(expected = self.routing_id, got = msg.routing_id, "message for another document dropped");
                continue;
            }
            match CacheMessage::from_message(&msg) {
                Ok(decoded) => self.apply(decoded)?,
                Err(err) => {
                    warn!(routing_id = self.routing_id, error = %err, "undecodable cache message dropped");
                    continue;
                }
            }
            handled += 1;
        }
        Ok(handled)
    }

    /// Apply one message from the content process
    pub fn apply(&self, msg: CacheMessage) -> Result<(), A11yError> {
        match msg {
            CacheMessage::Delta(delta) => self.apply_delta(delta),
            CacheMessage::Evict(node) => {
                self.apply_evict(node);
                Ok(())
            }
            CacheMessage::Teardown => {
                self.apply_teardown();
                Ok(())
            }
            other => {
                warn!(msg = ?other, "unexpected message on mirror side");
                Ok(())
            }
        }
    }

    /// Apply a delta if it is the next in sequence for its pair.
    ///
    /// Out-of-order deltas clear the pair and request a resync baseline.
    pub fn apply_delta(&self, delta: CacheDelta) -> Result<(), A11yError> {
        let key = (delta.node, delta.domain);
        let mut state = self.state.write();

        if state.evicted.contains(&delta.node) {
            state.stats.evicted_dropped += 1;
            trace!(node = %delta.node, domain = %delta.domain, "delta for evicted node dropped");
            return Ok(());
        }

        let expected = state.last_applied.get(&key).copied().unwrap_or(0) + 1;
        let awaiting = state.awaiting_resync.contains(&key);
        let accept = if awaiting { delta.resync } else { delta.seq == expected };

        if !accept {
            state.stats.stale_dropped += 1;
            warn!(
                node = %delta.node,
                domain = %delta.domain,
                seq = delta.seq,
                expected,
                "stale delta dropped"
            );
            state.store.clear_domain(delta.node, delta.domain);
            if state.awaiting_resync.insert(key) {
                state.stats.resyncs_requested += 1;
                drop(state);
                let request = CacheMessage::ResyncRequest { node: delta.node, domain: delta.domain };
                self.sender.send(&request.to_message(self.routing_id))?;
            }
            return Ok(());
        }

        state.awaiting_resync.remove(&key);
        state.last_applied.insert(key, delta.seq);
        state.requested.remove(&key);
        state.stats.applied += 1;
        match delta.payload {
            DeltaPayload::Populate(entries) => state.store.populate(delta.node, delta.domain, entries),
            DeltaPayload::Clear => {
                state.store.clear_domain(delta.node, delta.domain);
            }
        }
        trace!(node = %delta.node, domain = %delta.domain, seq = delta.seq, "delta applied");
        Ok(())
    }

    /// Drop a node; later deltas for it are ignored
    pub fn apply_evict(&self, node: NodeId) {
        let mut state = self.state.write();
        state.store.evict(node);
        state.evicted.insert(node);
        state.forget_node(node);
        debug!(node = %node, "mirror evicted node");
    }

    /// Document unloaded
    pub fn apply_teardown(&self) {
        let mut state = self.state.write();
        let stats = state.stats;
        *state = MirrorState { stats, ..MirrorState::default() };
        info!(routing_id = self.routing_id, "mirror torn down");
    }

    /// Read the shadow store
    pub fn with_store<R>(&self, f: impl FnOnce(&AttributeStore) -> R) -> R {
        f(&self.state.read().store)
    }

    /// Ask the content process to populate `domain` for a node, unless a
    /// request is already outstanding or the node is gone. Never blocks.
    pub fn request_population(&self, node: NodeId, domain: CacheDomain) -> Result<bool, A11yError> {
        {
            let mut state = self.state.write();
            if state.evicted.contains(&node) || !state.requested.insert((node, domain)) {
                return Ok(false);
            }
            state.stats.populate_requests += 1;
        }
        trace!(node = %node, domain = %domain, "requesting population");
        let request = CacheMessage::PopulateRequest { node, domains: domain };
        self.sender.send(&request.to_message(self.routing_id))?;
        Ok(true)
    }

    /// Change the domains the content process keeps warm
    pub fn set_cache_domains(&self, domains: CacheDomain) -> Result<(), A11yError> {
        self.sender
            .send(&CacheMessage::SetCacheDomains(domains).to_message(self.routing_id))?;
        Ok(())
    }

    pub fn is_evicted(&self, node: NodeId) -> bool {
        self.state.read().evicted.contains(&node)
    }

    pub fn is_awaiting_resync(&self, node: NodeId, domain: CacheDomain) -> bool {
        self.state.read().awaiting_resync.contains(&(node, domain))
    }

    /// Population requests still unanswered
    pub fn outstanding_requests(&self) -> usize {
        self.state.read().requested.len()
    }

    pub fn stats(&self) -> MirrorStats {
        self.state.read().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CacheKey, CacheValue, CachedAttribute};
    use fos_ipc::IpcChannel;

    fn node(n: u32) -> NodeId {
        NodeId::from_raw(n)
    }

    fn lang_delta(seq: u64, lang: &str) -> CacheDelta {
        CacheDelta {
            node: node(1),
            domain: CacheDomain::TEXT,
            seq,
            resync: false,
            payload: DeltaPayload::Populate(vec![(CacheKey::Language, CacheValue::str(lang))]),
        }
    }

    fn language(mirror: &RemoteMirror) -> Option<CacheValue> {
        mirror.with_store(|s| s.get(node(1), CacheKey::Language).value().cloned())
    }

    #[test]
    fn test_in_order_deltas_apply() {
        let (_content, parent) = IpcChannel::pair("a11y");
        let mirror = RemoteMirror::new(1, parent.sender());

        mirror.apply_delta(lang_delta(1, "en")).unwrap();
        mirror.apply_delta(lang_delta(2, "fr")).unwrap();
        assert_eq!(language(&mirror), Some(CacheValue::str("fr")));
        assert_eq!(mirror.stats().applied, 2);
    }

    #[test]
    fn test_gap_clears_pair_and_requests_resync_once() {
        let (content, parent) = IpcChannel::pair("a11y");
        let mirror = RemoteMirror::new(1, parent.sender());

        mirror.apply_delta(lang_delta(1, "en")).unwrap();
        mirror.apply_delta(lang_delta(3, "de")).unwrap();
        mirror.apply_delta(lang_delta(4, "it")).unwrap();

        assert_eq!(language(&mirror), None);
        assert!(mirror.with_store(|s| s.get(node(1), CacheKey::Language) == CachedAttribute::NotPopulated));
        assert!(mirror.is_awaiting_resync(node(1), CacheDomain::TEXT));

        let requests: Vec<CacheMessage> = std::iter::from_fn(|| content.try_recv().unwrap())
            .map(|m| CacheMessage::from_message(&m).unwrap())
            .collect();
        assert_eq!(requests, vec![CacheMessage::ResyncRequest { node: node(1), domain: CacheDomain::TEXT }]);

        let mut baseline = lang_delta(5, "pt");
        baseline.resync = true;
        mirror.apply_delta(baseline).unwrap();
        mirror.apply_delta(lang_delta(6, "es")).unwrap();
        assert_eq!(language(&mirror), Some(CacheValue::str("es")));
        assert_eq!(mirror.stats().stale_dropped, 2);
    }

    #[test]
    fn test_old_delta_never_overwrites_newer() {
        let (_content, parent) = IpcChannel::pair("a11y");
        let mirror = RemoteMirror::new(1, parent.sender());

        mirror.apply_delta(lang_delta(1, "en")).unwrap();
        mirror.apply_delta(lang_delta(2, "fr")).unwrap();
        mirror.apply_delta(lang_delta(1, "en")).unwrap();
        assert_ne!(language(&mirror), Some(CacheValue::str("en")));
    }

    #[test]
    fn test_evicted_node_ignores_deltas_and_requests() {
        let (content, parent) = IpcChannel::pair("a11y");
        let mirror = RemoteMirror::new(1, parent.sender());

        mirror.apply_delta(lang_delta(1, "en")).unwrap();
        mirror.apply_evict(node(1));
        mirror.apply_evict(node(1));
        mirror.apply_delta(lang_delta(2, "fr")).unwrap();

        assert_eq!(language(&mirror), None);
        assert_eq!(mirror.stats().evicted_dropped, 1);
        assert!(!mirror.request_population(node(1), CacheDomain::TEXT).unwrap());
        assert_eq!(content.try_recv().unwrap(), None);
    }

    #[test]
    fn test_population_requests_deduplicated() {
        let (content, parent) = IpcChannel::pair("a11y");
        let mirror = RemoteMirror::new(1, parent.sender());

        assert!(mirror.request_population(node(1), CacheDomain::TEXT).unwrap());
        assert!(!mirror.request_population(node(1), CacheDomain::TEXT).unwrap());
        assert_eq!(content.pending(), 1);

        mirror.apply_delta(lang_delta(1, "en")).unwrap();
        assert_eq!(mirror.outstanding_requests(), 0);
    }

    #[test]
    fn test_pump_skips_foreign_routes_and_handles_teardown() {
        let (content, parent) = IpcChannel::pair("a11y");
        let mirror = RemoteMirror::new(1, parent.sender());

        content.send(&CacheMessage::Delta(lang_delta(1, "en")).to_message(1)).unwrap();
        content.send(&CacheMessage::Delta(lang_delta(1, "zz")).to_message(2)).unwrap();
        assert_eq!(mirror.pump(&parent).unwrap(), 1);
        assert_eq!(language(&mirror), Some(CacheValue::str("en")));

        content.send(&CacheMessage::Teardown.to_message(1)).unwrap();
        mirror.pump(&parent).unwrap();
        assert_eq!(language(&mirror), None);
        // Sequence restarts after teardown
        mirror.apply_delta(lang_delta(1, "fr")).unwrap();
        assert_eq!(language(&mirror), Some(CacheValue::str("fr")));
    }
}
