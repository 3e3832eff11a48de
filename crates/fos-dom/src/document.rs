//! Document - High-level document API
//!
//! All mutations go through `Document` so each one is recorded as a
//! [`DomChange`] for the accessibility layer.

use crate::{ChangeKind, DomChange, DomError, DomTree, ElementData, LayoutRect, NodeId};

/// Document identifier, unique per content process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub u32);

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "doc{}", self.0)
    }
}

/// Where a document sits in its tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// Outermost document of a tab
    TopLevel,
    /// Same-process iframe
    Iframe,
    /// Out-of-process iframe
    RemoteIframe,
}

/// Visual viewport state (pinch zoom)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualViewport {
    /// Offset of the visual viewport within the layout viewport, CSS pixels
    pub offset_x: i32,
    pub offset_y: i32,
    /// Pinch zoom scale
    pub scale: f32,
}

impl Default for VisualViewport {
    fn default() -> Self {
        Self { offset_x: 0, offset_y: 0, scale: 1.0 }
    }
}

/// HTML Document
#[derive(Debug)]
pub struct Document {
    id: DocumentId,
    kind: DocumentKind,
    url: String,
    tree: DomTree,
    viewport: VisualViewport,
    focused: Option<NodeId>,
    changes: Vec<DomChange>,
}

impl Document {
    /// Create an empty document
    pub fn new(id: DocumentId, kind: DocumentKind, url: &str) -> Self {
        Self {
            id,
            kind,
            url: url.to_string(),
            tree: DomTree::new(),
            viewport: VisualViewport::default(),
            focused: None,
            changes: Vec::new(),
        }
    }

    /// Create a top-level document
    pub fn top_level(id: DocumentId, url: &str) -> Self {
        Self::new(id, DocumentKind::TopLevel, url)
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Is this the outermost document of the tab?
    pub fn is_top_level(&self) -> bool {
        self.kind == DocumentKind::TopLevel
    }

    /// Get document URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Document node
    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    /// Access the DOM tree
    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    /// Is the node part of this document?
    pub fn contains(&self, node: NodeId) -> bool {
        self.tree.contains(node)
    }

    /// Element data of a connected node
    pub fn element(&self, node: NodeId) -> Option<&ElementData> {
        if !self.contains(node) {
            return None;
        }
        self.tree.element(node)
    }

    pub fn viewport(&self) -> VisualViewport {
        self.viewport
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    /// Append a new element with attributes
    pub fn append_element(
        &mut self,
        parent: NodeId,
        tag: &str,
        attrs: &[(&str, &str)],
    ) -> Result<NodeId, DomError> {
        self.ensure_connected(parent)?;
        let id = self.tree.create_element(tag);
        if let Some(el) = self.tree.get_mut(id).and_then(|n| n.as_element_mut()) {
            for (name, value) in attrs {
                el.set_attr(name, value);
            }
        }
        self.tree.append_child(parent, id)?;
        self.record(parent, ChangeKind::ChildrenChanged);
        Ok(id)
    }

    /// Append a text node
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> Result<NodeId, DomError> {
        self.ensure_connected(parent)?;
        let id = self.tree.create_text(text);
        self.tree.append_child(parent, id)?;
        self.record(parent, ChangeKind::ChildrenChanged);
        Ok(id)
    }

    /// Move a connected node under a new parent
    pub fn move_node(&mut self, node: NodeId, new_parent: NodeId) -> Result<(), DomError> {
        self.ensure_connected(node)?;
        self.ensure_connected(new_parent)?;
        let old_parent = self.tree.parent(node);
        self.tree.append_child(new_parent, node)?;
        if let Some(old) = old_parent {
            self.record(old, ChangeKind::ChildrenChanged);
        }
        self.record(new_parent, ChangeKind::ChildrenChanged);
        self.record(node, ChangeKind::Moved);
        Ok(())
    }

    /// Remove a node and its subtree from the document.
    ///
    /// Removing a node that is already gone records nothing.
    pub fn remove_node(&mut self, node: NodeId) {
        let parent = self.tree.parent(node);
        let removed = self.tree.remove(node);
        if removed.is_empty() {
            return;
        }
        if self.focused.is_some_and(|f| removed.contains(&f)) {
            self.focused = None;
        }
        for id in removed {
            self.record(id, ChangeKind::NodeRemoved);
        }
        if let Some(parent) = parent {
            self.record(parent, ChangeKind::ChildrenChanged);
        }
    }

    /// Set an attribute; unchanged values record nothing
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let el = self.element_mut(node)?;
        let old = el.set_attr(name, value);
        if old.as_deref() != Some(value) {
            self.record(node, ChangeKind::AttributeChanged(name.to_string()));
        }
        Ok(())
    }

    /// Remove an attribute
    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), DomError> {
        let el = self.element_mut(node)?;
        if el.remove_attr(name).is_some() {
            self.record(node, ChangeKind::AttributeChanged(name.to_string()));
        }
        Ok(())
    }

    /// Toggle a boolean attribute such as `required` or `checked`
    pub fn toggle_attribute(&mut self, node: NodeId, name: &str, on: bool) -> Result<(), DomError> {
        if on {
            self.set_attribute(node, name, "")
        } else {
            self.remove_attribute(node, name)
        }
    }

    /// Set a computed style property
    pub fn set_style(&mut self, node: NodeId, property: &str, value: &str) -> Result<(), DomError> {
        let el = self.element_mut(node)?;
        let old = el.set_style_property(property, value);
        if old.as_deref() != Some(value) {
            self.record(node, ChangeKind::StyleChanged(Some(property.to_string())));
        }
        Ok(())
    }

    /// Remove a computed style property
    pub fn remove_style(&mut self, node: NodeId, property: &str) -> Result<(), DomError> {
        let el = self.element_mut(node)?;
        if el.remove_style_property(property).is_some() {
            self.record(node, ChangeKind::StyleChanged(Some(property.to_string())));
        }
        Ok(())
    }

    /// Replace the content of a text node
    pub fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), DomError> {
        self.ensure_connected(node)?;
        let data = match self.tree.get_mut(node).map(|n| &mut n.data) {
            Some(crate::NodeData::Text(t)) => t,
            _ => return Err(DomError::NotText(node)),
        };
        if data.content != text {
            data.content = text.to_string();
            self.record(node, ChangeKind::TextChanged);
        }
        Ok(())
    }

    /// Scroll an element
    pub fn scroll_to(&mut self, node: NodeId, x: i32, y: i32) -> Result<(), DomError> {
        let el = self.element_mut(node)?;
        if el.scroll_offset() != (x, y) {
            el.set_scroll_offset(x, y);
            self.record(node, ChangeKind::Scrolled);
        }
        Ok(())
    }

    /// Store the result of a reflow for an element
    pub fn set_layout(&mut self, node: NodeId, rect: LayoutRect) -> Result<(), DomError> {
        let el = self.element_mut(node)?;
        if el.layout_rect() != Some(rect) {
            el.set_layout_rect(rect);
            self.record(node, ChangeKind::Reflowed);
        }
        Ok(())
    }

    /// Pinch zoom: move/scale the visual viewport
    pub fn pinch_zoom(&mut self, scale: f32, offset_x: i32, offset_y: i32) {
        let viewport = VisualViewport { offset_x, offset_y, scale };
        if viewport != self.viewport {
            self.viewport = viewport;
            let root = self.root();
            self.record(root, ChangeKind::Zoomed);
        }
    }

    /// Move focus to a node (or clear it)
    pub fn focus(&mut self, node: Option<NodeId>) -> Result<(), DomError> {
        if let Some(node) = node {
            self.ensure_connected(node)?;
        }
        if node == self.focused {
            return Ok(());
        }
        let previous = std::mem::replace(&mut self.focused, node);
        for id in previous.into_iter().chain(node) {
            self.record(id, ChangeKind::FocusChanged);
        }
        Ok(())
    }

    /// Select or deselect an option-like element
    pub fn set_selected(&mut self, node: NodeId, selected: bool) -> Result<(), DomError> {
        let el = self.element_mut(node)?;
        let changed = if selected {
            el.set_attr("selected", "").is_none()
        } else {
            el.remove_attr("selected").is_some()
        };
        if changed {
            self.record(node, ChangeKind::SelectionChanged);
        }
        Ok(())
    }

    /// Find a connected element by its `id` attribute
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.tree.descendants(self.root()).into_iter().find(|&node| {
            self.tree.element(node).and_then(|el| el.get_attr("id")) == Some(id)
        })
    }

    /// Drain recorded changes
    pub fn take_changes(&mut self) -> Vec<DomChange> {
        std::mem::take(&mut self.changes)
    }

    /// Recorded changes not yet drained
    pub fn pending_changes(&self) -> &[DomChange] {
        &self.changes
    }

    fn record(&mut self, target: NodeId, kind: ChangeKind) {
        self.changes.push(DomChange::new(target, kind));
    }

    fn ensure_connected(&self, node: NodeId) -> Result<(), DomError> {
        if self.contains(node) {
            Ok(())
        } else {
            Err(DomError::NodeNotFound(node))
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Result<&mut ElementData, DomError> {
        self.ensure_connected(node)?;
        self.tree
            .get_mut(node)
            .and_then(|n| n.as_element_mut())
            .ok_or(DomError::NotAnElement(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::top_level(DocumentId(1), "about:blank")
    }

    #[test]
    fn test_attribute_changes_recorded_once() {
        let mut doc = doc();
        let root = doc.root();
        let p = doc.append_element(root, "p", &[]).unwrap();
        doc.take_changes();

        doc.set_attribute(p, "lang", "fr").unwrap();
        doc.set_attribute(p, "lang", "fr").unwrap();
        doc.remove_attribute(p, "lang").unwrap();
        doc.remove_attribute(p, "lang").unwrap();

        let changes = doc.take_changes();
        assert_eq!(changes, vec![
            DomChange::attribute(p, "lang"),
            DomChange::attribute(p, "lang"),
        ]);
    }

    #[test]
    fn test_remove_records_subtree() {
        let mut doc = doc();
        let root = doc.root();
        let ul = doc.append_element(root, "ul", &[]).unwrap();
        let li = doc.append_element(ul, "li", &[]).unwrap();
        doc.take_changes();

        doc.remove_node(ul);
        let changes = doc.take_changes();
        assert_eq!(changes, vec![
            DomChange::new(ul, ChangeKind::NodeRemoved),
            DomChange::new(li, ChangeKind::NodeRemoved),
            DomChange::new(root, ChangeKind::ChildrenChanged),
        ]);

        doc.remove_node(ul);
        assert!(doc.take_changes().is_empty());
        assert!(doc.set_attribute(li, "id", "x").is_err());
    }

    #[test]
    fn test_focus_records_old_and_new() {
        let mut doc = doc();
        let root = doc.root();
        let a = doc.append_element(root, "button", &[]).unwrap();
        let b = doc.append_element(root, "button", &[]).unwrap();
        doc.focus(Some(a)).unwrap();
        doc.take_changes();

        doc.focus(Some(b)).unwrap();
        let targets: Vec<NodeId> = doc.take_changes().into_iter().map(|c| c.target).collect();
        assert_eq!(targets, vec![a, b]);
    }

    #[test]
    fn test_pinch_zoom_targets_root() {
        let mut doc = doc();
        doc.pinch_zoom(2.0, 10, 20);
        assert_eq!(doc.take_changes(), vec![DomChange::new(NodeId::ROOT, ChangeKind::Zoomed)]);
        assert_eq!(doc.viewport().offset_y, 20);
    }
}
