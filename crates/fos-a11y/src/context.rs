//! Cache context
//!
//! Owns everything the cache needs for one document: store, dispatcher,
//! population queue and outgoing sync. Callers pass the document in on
//! every call, so there is no global registry to keep in step with the DOM.

use fos_dom::{Document, DocumentId, DomChange, NodeId};
use fos_ipc::{IpcEndpoint, IpcError, IpcSender};
use tracing::{debug, info, warn};

use crate::compute::compute_domain;
use crate::invalidation::Invalidation;
use crate::sync::{CacheMessage, DeltaPayload};
use crate::{
    A11yError, AttributeStore, CacheConfig, CacheDomain, CrossProcessSync, DomainState,
    InvalidationDispatcher, SyncStats,
};

/// What one [`CacheContext::tick`] did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Change records handled
    pub changes: usize,
    /// Messages received from the mirror
    pub incoming: usize,
    /// Domains computed
    pub computed: usize,
    /// Messages sent to the mirror
    pub sent: usize,
}

impl TickReport {
    /// Nothing happened
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

/// Per-document accessibility cache
#[derive(Debug)]
pub struct CacheContext {
    document: DocumentId,
    store: AttributeStore,
    dispatcher: InvalidationDispatcher,
    sync: CrossProcessSync,
    endpoint: IpcEndpoint,
    sender: IpcSender,
    batch_size: usize,
}

impl CacheContext {
    /// Create the cache for a document, talking to its mirror over
    /// `endpoint`. The configured initial domains are queued for every node.
    pub fn new(doc: &Document, config: &CacheConfig, endpoint: IpcEndpoint) -> Result<Self, A11yError> {
        let active = config.initial_domains()?;
        let dispatcher = InvalidationDispatcher::new(config.change_map()?, active, config.repopulate_on_invalidate);
        let sender = endpoint.sender();

        let mut ctx = Self {
            document: doc.id(),
            store: AttributeStore::new(),
            dispatcher,
            sync: CrossProcessSync::new(doc.id().0),
            endpoint,
            sender,
            batch_size: config.batch_size(),
        };
        let queued = ctx.schedule_all(doc, active);
        info!(document = %doc.id(), domains = %active, queued, "accessibility cache created");
        Ok(ctx)
    }

    pub fn document(&self) -> DocumentId {
        self.document
    }

    /// Feed DOM change records to the dispatcher
    pub fn handle_changes(&mut self, doc: &Document, changes: &[DomChange]) -> Result<(), A11yError> {
        self.check_document(doc)?;
        for change in changes {
            let invalidations = self.dispatcher.notify_change(doc, &mut self.store, change);
            for invalidation in invalidations {
                match invalidation {
                    Invalidation::Cleared { node, domains } => {
                        for domain in domains.domains() {
                            self.sync.enqueue_delta(node, domain, DeltaPayload::Clear);
                        }
                    }
                    Invalidation::Evicted(node) => self.sync.enqueue_evict(node),
                }
            }
        }
        Ok(())
    }

    /// Handle requests from the mirror. Returns messages handled.
    pub fn process_incoming(&mut self, doc: &Document) -> Result<usize, A11yError> {
        self.check_document(doc)?;
        let mut handled = 0;
        loop {
            let msg = match self.endpoint.try_recv() {
                Ok(Some(msg)) => msg,
                Ok(None) => break,
                Err(err @ IpcError::Disconnected(_)) => return Err(err.into()),
                Err(err) => {
                    warn!(document = %self.document, error = %err, "malformed frame dropped");
                    continue;
                }
            };
            if msg.routing_id != self.document.0 {
                warn!(document = %self.document, got = msg.routing_id, "request for another document dropped");
                continue;
            }
            let request = match CacheMessage::from_message(&msg) {
                Ok(request) => request,
                Err(err) => {
                    warn!(document = %self.document, error = %err, "undecodable request dropped");
                    continue;
                }
            };
            self.handle_request(doc, request);
            handled += 1;
        }
        Ok(handled)
    }

    fn handle_request(&mut self, doc: &Document, request: CacheMessage) {
        match request {
            CacheMessage::PopulateRequest { node, domains } => {
                if !doc.contains(node) {
                    // Let the mirror stop asking about it
                    self.sync.enqueue_evict(node);
                    return;
                }
                for domain in domains.domains() {
                    if let Some(entries) = self.store.entries(node, domain) {
                        self.sync.enqueue_delta(node, domain, DeltaPayload::Populate(entries));
                    } else if self.dispatcher.schedule(doc, node, domain).is_empty()
                        && self.domain_state(node, domain) != DomainState::Populating
                    {
                        // Domain cannot exist on this node (APZ off the root, text nodes)
                        self.sync.enqueue_delta(node, domain, DeltaPayload::Populate(Vec::new()));
                    }
                }
                debug!(node = %node, domains = %domains, "population requested");
            }
            CacheMessage::ResyncRequest { node, domain } => {
                if !doc.contains(node) {
                    self.sync.enqueue_evict(node);
                    return;
                }
                self.sync.request_resync(node, domain);
                let baseline = match self.store.entries(node, domain) {
                    Some(entries) => DeltaPayload::Populate(entries),
                    None => DeltaPayload::Clear,
                };
                self.sync.enqueue_delta(node, domain, baseline);
                debug!(node = %node, domain = %domain, "resync requested");
            }
            CacheMessage::SetCacheDomains(domains) => {
                self.set_active_domains(doc, domains);
            }
            other => warn!(document = %self.document, msg = ?other, "unexpected message on cache side"),
        }
    }

    /// Compute up to one batch of queued domains. Returns domains computed.
    pub fn run_idle_pass(&mut self, doc: &Document) -> Result<usize, A11yError> {
        self.check_document(doc)?;
        let mut computed = 0;
        while computed < self.batch_size {
            let Some((node, domain)) = self.dispatcher.queue_mut().pop() else {
                break;
            };
            if !doc.contains(node) {
                self.dispatcher.queue_mut().cancel_node(node);
                continue;
            }
            let entries = compute_domain(doc, node, domain);
            self.store.populate(node, domain, entries.clone());
            self.dispatcher.queue_mut().complete(node, domain);
            self.sync.enqueue_delta(node, domain, DeltaPayload::Populate(entries));
            computed += 1;
        }
        if computed > 0 {
            debug!(document = %self.document, computed, remaining = self.dispatcher.queue().len(), "idle pass");
        }
        Ok(computed)
    }

    /// Send pending deltas to the mirror
    pub fn flush(&mut self) -> Result<usize, A11yError> {
        self.sync.flush(&self.sender)
    }

    /// One update cycle: changes, requests, idle computation, flush
    pub fn tick(&mut self, doc: &mut Document) -> Result<TickReport, A11yError> {
        let changes = doc.take_changes();
        self.handle_changes(doc, &changes)?;
        let incoming = self.process_incoming(doc)?;
        let computed = self.run_idle_pass(doc)?;
        let sent = self.flush()?;
        Ok(TickReport { changes: changes.len(), incoming, computed, sent })
    }

    /// Change the eagerly populated domains; new ones are queued for
    /// every node. Returns the newly activated domains.
    pub fn set_active_domains(&mut self, doc: &Document, domains: CacheDomain) -> CacheDomain {
        let added = self.dispatcher.set_active_domains(domains);
        let queued = self.schedule_all(doc, added);
        info!(document = %self.document, active = %domains, added = %added, queued, "active cache domains changed");
        added
    }

    pub fn active_domains(&self) -> CacheDomain {
        self.dispatcher.active_domains()
    }

    pub fn domain_state(&self, node: NodeId, domain: CacheDomain) -> DomainState {
        self.dispatcher.queue().state(node, domain)
    }

    pub fn store(&self) -> &AttributeStore {
        &self.store
    }

    /// Domain computations waiting for an idle pass
    pub fn pending_populations(&self) -> usize {
        self.dispatcher.queue().len()
    }

    pub fn sync_stats(&self) -> SyncStats {
        self.sync.stats()
    }

    /// Document unload: drop everything and tell the mirror
    pub fn teardown(mut self) -> Result<(), A11yError> {
        self.store.clear();
        self.dispatcher.queue_mut().clear();
        self.sync.teardown(&self.sender)?;
        info!(document = %self.document, "accessibility cache torn down");
        Ok(())
    }

    fn schedule_all(&mut self, doc: &Document, domains: CacheDomain) -> usize {
        if domains.is_empty() {
            return 0;
        }
        doc.tree()
            .descendants(doc.root())
            .into_iter()
            .map(|node| self.dispatcher.schedule(doc, node, domains).bits().count_ones() as usize)
            .sum()
    }

    fn check_document(&self, doc: &Document) -> Result<(), A11yError> {
        if doc.id() == self.document {
            Ok(())
        } else {
            Err(A11yError::DocumentMismatch { expected: self.document, got: doc.id() })
        }
    }
}
