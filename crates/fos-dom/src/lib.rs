//! fOS DOM - Document Object Model
//!
//! Arena-based DOM that feeds the accessibility cache.
//!
//! Features:
//! - Elements, text, attributes and computed style properties
//! - Top-level, iframe and remote iframe documents
//! - Scroll offsets, visual viewport (pinch zoom) and focus
//! - Mutation log of [`DomChange`] records

mod node;
mod tree;
mod document;
mod observer;

pub use node::{Node, NodeData, ElementData, TextData, Attribute, LayoutRect};
pub use tree::DomTree;
pub use document::{Document, DocumentId, DocumentKind, VisualViewport};
pub use observer::{ChangeKind, DomChange};

/// Node identifier (index into arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Root node ID (the document node)
    pub const ROOT: NodeId = NodeId(0);
    /// Invalid/null node
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Rebuild an id received from another process
    pub fn from_raw(raw: u32) -> Self {
        NodeId(raw)
    }

    /// Raw arena index
    pub fn as_raw(self) -> u32 {
        self.0
    }

    /// Is this a real node?
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::NONE
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// DOM error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("Node {0} is not in the tree")]
    NodeNotFound(NodeId),

    #[error("Node {0} is not an element")]
    NotAnElement(NodeId),

    #[error("Node {0} is not a text node")]
    NotText(NodeId),

    #[error("Cannot insert {child} under {parent}")]
    HierarchyRequest { parent: NodeId, child: NodeId },
}
