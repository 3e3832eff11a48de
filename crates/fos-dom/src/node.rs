//! DOM Node
//!
//! Nodes link to each other by `NodeId` instead of pointers, so the arena
//! owns every node and the accessibility layer only ever holds ids.

use crate::NodeId;

/// DOM Node - Core structure
#[derive(Debug)]
pub struct Node {
    /// Parent node (NONE if root or detached)
    pub parent: NodeId,
    /// First child
    pub first_child: NodeId,
    /// Last child (for O(1) append)
    pub last_child: NodeId,
    /// Previous sibling
    pub prev_sibling: NodeId,
    /// Next sibling
    pub next_sibling: NodeId,
    /// Node-specific data
    pub data: NodeData,
}

impl Node {
    fn with_data(data: NodeData) -> Self {
        Self {
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
            data,
        }
    }

    /// Create a new element node
    pub fn element(tag: &str) -> Self {
        Self::with_data(NodeData::Element(ElementData::new(tag)))
    }

    /// Create a new text node
    pub fn text(content: String) -> Self {
        Self::with_data(NodeData::Text(TextData { content }))
    }

    /// Create a document node
    pub fn document() -> Self {
        Self::with_data(NodeData::Document)
    }

    /// Check if this is text
    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    /// Get element data if this is an element
    #[inline]
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get mutable element data
    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get text content if this is a text node
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(t) => Some(&t.content),
            _ => None,
        }
    }
}

/// Node-specific data
#[derive(Debug)]
pub enum NodeData {
    /// Document root
    Document,
    /// Element
    Element(ElementData),
    /// Text content
    Text(TextData),
}

/// Element-specific data
#[derive(Debug, Default)]
pub struct ElementData {
    /// Lowercase tag name
    pub tag: String,
    /// Attributes in insertion order
    attrs: Vec<Attribute>,
    /// Computed style properties set on this element
    style: Vec<Attribute>,
    /// Scroll offset (x, y) in CSS pixels
    scroll: (i32, i32),
    /// Border box from the last reflow
    layout: Option<LayoutRect>,
}

/// Border box in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl ElementData {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    /// Get an attribute value
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Check for an attribute
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|a| a.name == name)
    }

    /// Set an attribute, returning the previous value
    pub fn set_attr(&mut self, name: &str, value: &str) -> Option<String> {
        set_pair(&mut self.attrs, name, value)
    }

    /// Remove an attribute, returning the previous value
    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        remove_pair(&mut self.attrs, name)
    }

    /// All attributes
    pub fn attrs(&self) -> &[Attribute] {
        &self.attrs
    }

    /// Get a style property set on this element (not inherited)
    pub fn style_property(&self, property: &str) -> Option<&str> {
        self.style.iter()
            .find(|a| a.name == property)
            .map(|a| a.value.as_str())
    }

    /// Set a style property, returning the previous value
    pub fn set_style_property(&mut self, property: &str, value: &str) -> Option<String> {
        set_pair(&mut self.style, property, value)
    }

    /// Remove a style property, returning the previous value
    pub fn remove_style_property(&mut self, property: &str) -> Option<String> {
        remove_pair(&mut self.style, property)
    }

    /// Current scroll offset
    pub fn scroll_offset(&self) -> (i32, i32) {
        self.scroll
    }

    pub(crate) fn set_scroll_offset(&mut self, x: i32, y: i32) {
        self.scroll = (x, y);
    }

    /// Border box, if laid out
    pub fn layout_rect(&self) -> Option<LayoutRect> {
        self.layout
    }

    pub(crate) fn set_layout_rect(&mut self, rect: LayoutRect) {
        self.layout = Some(rect);
    }
}

fn set_pair(list: &mut Vec<Attribute>, name: &str, value: &str) -> Option<String> {
    if let Some(attr) = list.iter_mut().find(|a| a.name == name) {
        return Some(std::mem::replace(&mut attr.value, value.to_string()));
    }
    list.push(Attribute { name: name.to_string(), value: value.to_string() });
    None
}

fn remove_pair(list: &mut Vec<Attribute>, name: &str) -> Option<String> {
    let idx = list.iter().position(|a| a.name == name)?;
    Some(list.remove(idx).value)
}

/// Text node data
#[derive(Debug)]
pub struct TextData {
    pub content: String,
}

/// Attribute (also used for style properties)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}
