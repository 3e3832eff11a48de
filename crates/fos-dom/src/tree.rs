//! DOM Tree (arena-based allocation)
//!
//! Nodes are never freed from the arena; removing a subtree detaches it so
//! ids stay unique for the lifetime of the document.

use crate::{DomError, ElementData, Node, NodeId};

/// Arena-based DOM tree
#[derive(Debug)]
pub struct DomTree {
    nodes: Vec<Node>,
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DomTree {
    /// Create a tree holding only the document node
    pub fn new() -> Self {
        Self { nodes: vec![Node::document()] }
    }

    /// Document node
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Get a node by ID (connected or not)
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    /// Get a mutable node by ID
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)
    }

    /// Element data of a node
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.get(id).and_then(Node::as_element)
    }

    /// Number of nodes ever allocated
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if tree is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Is the node attached to the document?
    pub fn contains(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == NodeId::ROOT {
                return true;
            }
            match self.get(current) {
                Some(node) if node.parent.is_valid() => current = node.parent,
                _ => return false,
            }
        }
    }

    /// Allocate a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(Node::element(tag))
    }

    /// Allocate a detached text node
    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.push(Node::text(content.to_string()))
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Append `child` as last child of `parent`
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let parent_node = self.get(parent).ok_or(DomError::NodeNotFound(parent))?;
        if parent_node.is_text() || child == NodeId::ROOT || self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        let child_node = self.get(child).ok_or(DomError::NodeNotFound(child))?;
        if child_node.parent.is_valid() {
            self.detach(child);
        }

        let last = self.nodes[parent.0 as usize].last_child;
        {
            let node = &mut self.nodes[child.0 as usize];
            node.parent = parent;
            node.prev_sibling = last;
            node.next_sibling = NodeId::NONE;
        }
        if last.is_valid() {
            self.nodes[last.0 as usize].next_sibling = child;
        } else {
            self.nodes[parent.0 as usize].first_child = child;
        }
        self.nodes[parent.0 as usize].last_child = child;
        Ok(())
    }

    /// Detach a connected subtree.
    ///
    /// Returns the removed ids in tree order, or nothing if the node was not
    /// connected (so removing twice is harmless).
    pub fn remove(&mut self, id: NodeId) -> Vec<NodeId> {
        if id == NodeId::ROOT || !self.contains(id) {
            return Vec::new();
        }
        let removed = self.descendants(id);
        self.detach(id);
        tracing::trace!(node = %id, count = removed.len(), "Removed subtree");
        removed
    }

    fn detach(&mut self, id: NodeId) {
        let (parent, prev, next) = {
            let node = &self.nodes[id.0 as usize];
            (node.parent, node.prev_sibling, node.next_sibling)
        };
        if prev.is_valid() {
            self.nodes[prev.0 as usize].next_sibling = next;
        } else if parent.is_valid() {
            self.nodes[parent.0 as usize].first_child = next;
        }
        if next.is_valid() {
            self.nodes[next.0 as usize].prev_sibling = prev;
        } else if parent.is_valid() {
            self.nodes[parent.0 as usize].last_child = prev;
        }
        let node = &mut self.nodes[id.0 as usize];
        node.parent = NodeId::NONE;
        node.prev_sibling = NodeId::NONE;
        node.next_sibling = NodeId::NONE;
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        id == ancestor || self.ancestors(id).any(|a| a == ancestor)
    }

    /// Parent of a node
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).map(|n| n.parent).filter(|p| p.is_valid())
    }

    /// Children of a node in order
    pub fn children(&self, id: NodeId) -> Children<'_> {
        let next = self.get(id).map(|n| n.first_child).unwrap_or(NodeId::NONE);
        Children { tree: self, next }
    }

    /// Ancestors of a node, nearest first (excluding the node)
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        let next = self.parent(id).unwrap_or(NodeId::NONE);
        Ancestors { tree: self, next }
    }

    /// Node and all its descendants in tree order
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if self.get(current).is_none() {
                continue;
            }
            out.push(current);
            let children: Vec<NodeId> = self.children(current).collect();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Concatenated text of a subtree
    pub fn text_content(&self, id: NodeId) -> String {
        let mut text = String::new();
        for node in self.descendants(id) {
            if let Some(t) = self.get(node).and_then(Node::as_text) {
                text.push_str(t);
            }
        }
        text
    }
}

/// Child iterator
pub struct Children<'a> {
    tree: &'a DomTree,
    next: NodeId,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if !self.next.is_valid() {
            return None;
        }
        let current = self.next;
        self.next = self.tree.get(current).map(|n| n.next_sibling).unwrap_or(NodeId::NONE);
        Some(current)
    }
}

/// Ancestor iterator
pub struct Ancestors<'a> {
    tree: &'a DomTree,
    next: NodeId,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if !self.next.is_valid() {
            return None;
        }
        let current = self.next;
        self.next = self.tree.parent(current).unwrap_or(NodeId::NONE);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_iterate() {
        let mut tree = DomTree::new();
        let ul = tree.create_element("ul");
        let a = tree.create_element("li");
        let b = tree.create_element("li");
        tree.append_child(tree.root(), ul).unwrap();
        tree.append_child(ul, a).unwrap();
        tree.append_child(ul, b).unwrap();

        assert_eq!(tree.children(ul).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(tree.ancestors(b).collect::<Vec<_>>(), vec![ul, NodeId::ROOT]);
        assert!(tree.contains(b));
    }

    #[test]
    fn test_remove_middle_child() {
        let mut tree = DomTree::new();
        let ids: Vec<NodeId> = (0..3).map(|_| tree.create_element("p")).collect();
        for &id in &ids {
            tree.append_child(tree.root(), id).unwrap();
        }

        assert_eq!(tree.remove(ids[1]), vec![ids[1]]);
        assert_eq!(tree.children(tree.root()).collect::<Vec<_>>(), vec![ids[0], ids[2]]);
        assert!(!tree.contains(ids[1]));
        assert!(tree.remove(ids[1]).is_empty());
    }

    #[test]
    fn test_cycle_rejected() {
        let mut tree = DomTree::new();
        let outer = tree.create_element("div");
        let inner = tree.create_element("div");
        tree.append_child(tree.root(), outer).unwrap();
        tree.append_child(outer, inner).unwrap();

        assert!(matches!(
            tree.append_child(inner, outer),
            Err(DomError::HierarchyRequest { .. })
        ));
    }

    #[test]
    fn test_text_content() {
        let mut tree = DomTree::new();
        let p = tree.create_element("p");
        let t1 = tree.create_text("Hello ");
        let b = tree.create_element("b");
        let t2 = tree.create_text("World");
        tree.append_child(tree.root(), p).unwrap();
        tree.append_child(p, t1).unwrap();
        tree.append_child(p, b).unwrap();
        tree.append_child(b, t2).unwrap();

        assert_eq!(tree.text_content(p), "Hello World");
    }
}
