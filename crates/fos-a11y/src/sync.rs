//! Cross-process sync
//!
//! Content-process side of the cache mirror. Deltas are queued per
//! (node, domain), coalesced while unsent and numbered when they go out,
//! so the mirror sees a gap-free sequence for every pair it tracks.

use std::collections::{HashMap, HashSet};

use fos_dom::NodeId;
use fos_ipc::{
    write_varint, ByteReader, IpcError, IpcSender, IpcSerialize, MessageType, TypedMessage,
};
use tracing::{debug, trace, warn};

use crate::{A11yError, CacheDomain, CacheKey, CacheValue};

/// Contents of a delta
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaPayload {
    /// Full replacement of the domain's values
    Populate(Vec<(CacheKey, CacheValue)>),
    /// Domain no longer populated
    Clear,
}

/// One sequenced domain update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDelta {
    pub node: NodeId,
    /// Always a single domain
    pub domain: CacheDomain,
    /// Per (node, domain), starting at 1
    pub seq: u64,
    /// Baseline answering a resync request
    pub resync: bool,
    pub payload: DeltaPayload,
}

fn read_node(reader: &mut ByteReader<'_>) -> Result<NodeId, IpcError> {
    Ok(NodeId::from_raw(reader.read_varint_u32()?))
}

fn read_domains(reader: &mut ByteReader<'_>) -> Result<CacheDomain, IpcError> {
    CacheDomain::from_bits(reader.read_varint_u32()?).ok_or(IpcError::InvalidFormat)
}

fn read_single_domain(reader: &mut ByteReader<'_>) -> Result<CacheDomain, IpcError> {
    let domain = read_domains(reader)?;
    if domain.is_single() { Ok(domain) } else { Err(IpcError::InvalidFormat) }
}

impl IpcSerialize for CacheDelta {
    fn ipc_serialize(&self, buf: &mut Vec<u8>) {
        write_varint(buf, self.node.as_raw() as u64);
        write_varint(buf, self.domain.bits() as u64);
        write_varint(buf, self.seq);
        buf.push(self.resync as u8);
        match &self.payload {
            DeltaPayload::Populate(entries) => {
                buf.push(0);
                write_varint(buf, entries.len() as u64);
                for (key, value) in entries {
                    buf.push(key.wire_id());
                    value.ipc_serialize(buf);
                }
            }
            DeltaPayload::Clear => buf.push(1),
        }
    }

    fn ipc_deserialize(reader: &mut ByteReader<'_>) -> Result<Self, IpcError> {
        let node = read_node(reader)?;
        let domain = read_single_domain(reader)?;
        let seq = reader.read_varint()?;
        let resync = match reader.read_u8()? {
            0 => false,
            1 => true,
            _ => return Err(IpcError::InvalidFormat),
        };
        let payload = match reader.read_u8()? {
            0 => {
                let count = reader.read_varint()? as usize;
                // Every entry takes at least two bytes
                if count > reader.remaining() / 2 {
                    return Err(IpcError::BufferTooShort);
                }
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    let key = CacheKey::from_wire(reader.read_u8()?).ok_or(IpcError::InvalidFormat)?;
                    if key.domain() != domain {
                        return Err(IpcError::InvalidFormat);
                    }
                    entries.push((key, CacheValue::ipc_deserialize(reader)?));
                }
                DeltaPayload::Populate(entries)
            }
            1 => DeltaPayload::Clear,
            _ => return Err(IpcError::InvalidFormat),
        };
        Ok(Self { node, domain, seq, resync, payload })
    }
}

/// Messages exchanged between a cache and its mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheMessage {
    Delta(CacheDelta),
    Evict(NodeId),
    Teardown,
    /// Mirror wants these domains computed for a node
    PopulateRequest { node: NodeId, domains: CacheDomain },
    /// Mirror saw a gap and wants a baseline for the pair
    ResyncRequest { node: NodeId, domain: CacheDomain },
    SetCacheDomains(CacheDomain),
}

impl CacheMessage {
    /// Encode for a document's route
    pub fn to_message(&self, routing_id: u32) -> TypedMessage {
        let mut buf = Vec::new();
        let msg_type = match self {
            Self::Delta(delta) => {
                delta.ipc_serialize(&mut buf);
                MessageType::CacheDelta
            }
            Self::Evict(node) => {
                write_varint(&mut buf, node.as_raw() as u64);
                MessageType::CacheEvict
            }
            Self::Teardown => MessageType::CacheTeardown,
            Self::PopulateRequest { node, domains } => {
                write_varint(&mut buf, node.as_raw() as u64);
                write_varint(&mut buf, domains.bits() as u64);
                MessageType::PopulateRequest
            }
            Self::ResyncRequest { node, domain } => {
                write_varint(&mut buf, node.as_raw() as u64);
                write_varint(&mut buf, domain.bits() as u64);
                MessageType::ResyncRequest
            }
            Self::SetCacheDomains(domains) => {
                write_varint(&mut buf, domains.bits() as u64);
                MessageType::SetCacheDomains
            }
        };
        TypedMessage::new(msg_type, routing_id, buf)
    }

    /// Decode a cache message; other message types are rejected
    pub fn from_message(msg: &TypedMessage) -> Result<Self, IpcError> {
        let mut reader = ByteReader::new(&msg.payload);
        let decoded = match msg.msg_type {
            MessageType::CacheDelta => Self::Delta(CacheDelta::ipc_deserialize(&mut reader)?),
            MessageType::CacheEvict => Self::Evict(read_node(&mut reader)?),
            MessageType::CacheTeardown => Self::Teardown,
            MessageType::PopulateRequest => Self::PopulateRequest {
                node: read_node(&mut reader)?,
                domains: read_domains(&mut reader)?,
            },
            MessageType::ResyncRequest => Self::ResyncRequest {
                node: read_node(&mut reader)?,
                domain: read_single_domain(&mut reader)?,
            },
            MessageType::SetCacheDomains => Self::SetCacheDomains(read_domains(&mut reader)?),
            other => return Err(IpcError::UnknownMessageType(other as u16)),
        };
        if !reader.is_empty() {
            return Err(IpcError::InvalidFormat);
        }
        Ok(decoded)
    }
}

/// Sync statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Deltas handed to `enqueue_delta`
    pub enqueued: u64,
    /// Deltas that replaced an unsent one
    pub coalesced: u64,
    /// Deltas sent
    pub sent: u64,
    /// Evictions sent
    pub evictions: u64,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Delta(NodeId, CacheDomain),
    Evict(NodeId),
}

/// Outgoing side of the mirror protocol
#[derive(Debug)]
pub struct CrossProcessSync {
    routing_id: u32,
    /// Submission order
    order: Vec<Slot>,
    /// Unsent delta per pair, with the slot that owns it
    pending: HashMap<(NodeId, CacheDomain), (usize, DeltaPayload)>,
    pending_evicts: HashSet<NodeId>,
    /// Last sequence number sent per pair
    seqs: HashMap<(NodeId, CacheDomain), u64>,
    /// Pairs whose next delta is a resync baseline
    resync: HashSet<(NodeId, CacheDomain)>,
    stats: SyncStats,
}

impl CrossProcessSync {
    pub fn new(routing_id: u32) -> Self {
        Self {
            routing_id,
            order: Vec::new(),
            pending: HashMap::new(),
            pending_evicts: HashSet::new(),
            seqs: HashMap::new(),
            resync: HashSet::new(),
            stats: SyncStats::default(),
        }
    }

    /// Queue a delta; an unsent delta for the same pair is replaced in place
    pub fn enqueue_delta(&mut self, node: NodeId, domain: CacheDomain, payload: DeltaPayload) {
        debug_assert!(domain.is_single(), "deltas carry one domain, got {domain}");
        self.stats.enqueued += 1;
        if let Some((_, slot_payload)) = self.pending.get_mut(&(node, domain)) {
            *slot_payload = payload;
            self.stats.coalesced += 1;
            trace!(node = %node, domain = %domain, "delta coalesced");
            return;
        }
        self.pending.insert((node, domain), (self.order.len(), payload));
        self.order.push(Slot::Delta(node, domain));
    }

    /// Queue an eviction, dropping unsent deltas for the node
    pub fn enqueue_evict(&mut self, node: NodeId) {
        self.pending.retain(|(n, _), _| *n != node);
        self.resync.retain(|(n, _)| *n != node);
        self.seqs.retain(|(n, _), _| *n != node);
        if self.pending_evicts.insert(node) {
            self.order.push(Slot::Evict(node));
        }
    }

    /// Mark the next delta for a pair as a resync baseline
    pub fn request_resync(&mut self, node: NodeId, domain: CacheDomain) {
        self.resync.insert((node, domain));
    }

    /// Is a delta for the pair waiting to be sent?
    pub fn has_pending(&self, node: NodeId, domain: CacheDomain) -> bool {
        self.pending.contains_key(&(node, domain))
    }

    /// Queued messages (deltas and evictions)
    pub fn pending_len(&self) -> usize {
        self.pending.len() + self.pending_evicts.len()
    }

    /// Send everything queued, in submission order. Returns messages sent.
    ///
    /// Sequence numbers are committed only once a delta is on the wire; if a
    /// send fails, it and everything after it stay queued.
    pub fn flush(&mut self, sender: &IpcSender) -> Result<usize, A11yError> {
        let order = std::mem::take(&mut self.order);
        let mut sent = 0;

        for (idx, &slot) in order.iter().enumerate() {
            let msg = match slot {
                Slot::Delta(node, domain) => {
                    let key = (node, domain);
                    match self.pending.get(&key) {
                        Some((owner, _)) if *owner == idx => {}
                        _ => continue,
                    }
                    let Some((_, payload)) = self.pending.remove(&key) else {
                        continue;
                    };
                    CacheMessage::Delta(CacheDelta {
                        node,
                        domain,
                        seq: self.seqs.get(&key).copied().unwrap_or(0) + 1,
                        resync: self.resync.contains(&key),
                        payload,
                    })
                }
                Slot::Evict(node) => CacheMessage::Evict(node),
            };

            if let Err(err) = sender.send(&msg.to_message(self.routing_id)) {
                self.requeue(msg, &order[idx..], idx);
                return Err(err.into());
            }

            match msg {
                CacheMessage::Delta(delta) => {
                    let key = (delta.node, delta.domain);
                    self.seqs.insert(key, delta.seq);
                    self.resync.remove(&key);
                    trace!(node = %delta.node, domain = %delta.domain, seq = delta.seq, resync = delta.resync, "sent delta");
                    self.stats.sent += 1;
                }
                CacheMessage::Evict(node) => {
                    self.pending_evicts.remove(&node);
                    self.stats.evictions += 1;
                }
                _ => {}
            }
            sent += 1;
        }
        if sent > 0 {
            debug!(routing_id = self.routing_id, sent, "flushed cache deltas");
        }
        Ok(sent)
    }

    /// Put the unsent tail of a flush back in the queue. `rest[0]` is the
    /// slot whose send failed and sat at `first` in the old order.
    fn requeue(&mut self, failed: CacheMessage, rest: &[Slot], first: usize) {
        if let CacheMessage::Delta(delta) = failed {
            self.pending.insert((delta.node, delta.domain), (first, delta.payload));
        }
        for (offset, &slot) in rest.iter().enumerate() {
            match slot {
                Slot::Delta(node, domain) => match self.pending.get_mut(&(node, domain)) {
                    Some((owner, _)) if *owner == first + offset => *owner = self.order.len(),
                    _ => continue,
                },
                Slot::Evict(node) => {
                    if !self.pending_evicts.contains(&node) {
                        continue;
                    }
                }
            }
            self.order.push(slot);
        }
        warn!(routing_id = self.routing_id, queued = self.order.len(), "flush interrupted, deltas kept");
    }

    /// Drop all state and tell the mirror the document is gone
    pub fn teardown(&mut self, sender: &IpcSender) -> Result<(), A11yError> {
        self.order.clear();
        self.pending.clear();
        self.pending_evicts.clear();
        self.seqs.clear();
        self.resync.clear();
        sender.send(&CacheMessage::Teardown.to_message(self.routing_id))?;
        Ok(())
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }
}
