//! IPC Messages
//!
//! Message types exchanged between a content process cache and its
//! parent-process mirror.

/// Message type identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageType {
    /// Domain-scoped cache delta (content -> parent)
    CacheDelta = 50,
    /// Node evicted from the cache (content -> parent)
    CacheEvict = 51,
    /// Whole document cache torn down (content -> parent)
    CacheTeardown = 52,
    /// Populate a domain for a node (parent -> content)
    PopulateRequest = 53,
    /// Sequence gap detected, resend a domain (parent -> content)
    ResyncRequest = 54,
    /// Change the set of active cache domains (parent -> content)
    SetCacheDomains = 55,
}

impl MessageType {
    /// From u16
    pub fn from_u16(val: u16) -> Option<Self> {
        match val {
            50 => Some(Self::CacheDelta),
            51 => Some(Self::CacheEvict),
            52 => Some(Self::CacheTeardown),
            53 => Some(Self::PopulateRequest),
            54 => Some(Self::ResyncRequest),
            55 => Some(Self::SetCacheDomains),
            _ => None,
        }
    }
}

/// Typed message with header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedMessage {
    /// Message type
    pub msg_type: MessageType,
    /// Routing ID (which document the message belongs to)
    pub routing_id: u32,
    /// Payload data
    pub payload: Vec<u8>,
}

impl TypedMessage {
    /// Create new typed message
    pub fn new(msg_type: MessageType, routing_id: u32, payload: Vec<u8>) -> Self {
        Self { msg_type, routing_id, payload }
    }
}
