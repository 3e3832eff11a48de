//! DOM change records
//!
//! Every mutation made through [`Document`](crate::Document) leaves a
//! record here; consumers drain them with `Document::take_changes`.

use crate::NodeId;

/// Kind of change a mutation caused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    /// Attribute set, changed or removed
    AttributeChanged(String),
    /// Style property changed (`None` = whole style recalculated)
    StyleChanged(Option<String>),
    /// Element scroll offset changed
    Scrolled,
    /// Layout box moved or resized
    Reflowed,
    /// Visual viewport changed (pinch zoom / APZ)
    Zoomed,
    /// Node gained or lost focus
    FocusChanged,
    /// Selection state changed
    SelectionChanged,
    /// Character data of a text node changed
    TextChanged,
    /// Children inserted or removed
    ChildrenChanged,
    /// Node re-parented within the document (inherited state may differ)
    Moved,
    /// Node left the document
    NodeRemoved,
}

impl ChangeKind {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::AttributeChanged(_) => "attribute",
            Self::StyleChanged(_) => "style",
            Self::Scrolled => "scroll",
            Self::Reflowed => "reflow",
            Self::Zoomed => "zoom",
            Self::FocusChanged => "focus",
            Self::SelectionChanged => "selection",
            Self::TextChanged => "text",
            Self::ChildrenChanged => "children",
            Self::Moved => "moved",
            Self::NodeRemoved => "removed",
        }
    }
}

/// Change record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomChange {
    pub target: NodeId,
    pub kind: ChangeKind,
}

impl DomChange {
    pub fn new(target: NodeId, kind: ChangeKind) -> Self {
        Self { target, kind }
    }

    pub fn attribute(target: NodeId, name: &str) -> Self {
        Self::new(target, ChangeKind::AttributeChanged(name.to_string()))
    }

    pub fn style(target: NodeId, property: Option<&str>) -> Self {
        Self::new(target, ChangeKind::StyleChanged(property.map(str::to_string)))
    }
}
