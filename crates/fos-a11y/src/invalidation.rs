//! Invalidation
//!
//! Maps DOM change records to the cache domains they make stale, clears
//! those domains and queues repopulation. Values are never computed here;
//! the population queue is drained later in idle time.

use std::collections::{HashMap, VecDeque};

use fos_dom::{ChangeKind, Document, DomChange, NodeId};
use tracing::debug;

use crate::compute::TEXT_STYLE_PROPERTIES;
use crate::{AttributeStore, CacheDomain};

/// Attributes that can move an element in or out of its parent's item set
const SET_MEMBERSHIP_ATTRIBUTES: &[&str] = &["role", "type"];

/// Domains a change affects and whether descendants are affected too
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeRule {
    pub domains: CacheDomain,
    pub subtree: bool,
}

impl ChangeRule {
    pub const fn node(domains: CacheDomain) -> Self {
        Self { domains, subtree: false }
    }

    pub const fn subtree(domains: CacheDomain) -> Self {
        Self { domains, subtree: true }
    }
}

/// Attribute / style property to domain table
#[derive(Debug, Clone)]
pub struct ChangeMap {
    attributes: HashMap<String, ChangeRule>,
    styles: HashMap<String, ChangeRule>,
    /// Used for unknown properties and whole-style recalcs
    fallback_style: ChangeRule,
}

impl Default for ChangeMap {
    fn default() -> Self {
        use CacheDomain as D;

        let attributes = [
            ("lang", ChangeRule::subtree(D::TEXT)),
            ("style", ChangeRule::subtree(D::STYLE | D::TEXT)),
            ("class", ChangeRule::subtree(D::DOM_NODE_ID_AND_CLASS | D::STYLE | D::TEXT)),
            ("id", ChangeRule::node(D::DOM_NODE_ID_AND_CLASS)),
            ("accesskey", ChangeRule::node(D::ACTIONS)),
            ("href", ChangeRule::node(D::ACTIONS)),
            ("onclick", ChangeRule::node(D::ACTIONS)),
            ("longdesc", ChangeRule::node(D::ACTIONS)),
            ("open", ChangeRule::subtree(D::ACTIONS)),
            ("required", ChangeRule::node(D::STATE)),
            ("aria-required", ChangeRule::node(D::STATE)),
            ("aria-invalid", ChangeRule::node(D::STATE)),
            ("checked", ChangeRule::node(D::STATE | D::ACTIONS)),
            ("aria-checked", ChangeRule::node(D::STATE | D::ACTIONS)),
            ("selected", ChangeRule::node(D::STATE)),
            ("aria-selected", ChangeRule::node(D::STATE)),
            ("tabindex", ChangeRule::node(D::STATE)),
            ("aria-label", ChangeRule::node(D::NAME_AND_DESCRIPTION)),
            ("alt", ChangeRule::node(D::NAME_AND_DESCRIPTION)),
            ("title", ChangeRule::node(D::NAME_AND_DESCRIPTION)),
            ("aria-description", ChangeRule::node(D::NAME_AND_DESCRIPTION)),
            ("value", ChangeRule::node(D::VALUE | D::STATE | D::NAME_AND_DESCRIPTION)),
            ("aria-valuenow", ChangeRule::node(D::VALUE | D::STATE)),
            ("aria-posinset", ChangeRule::node(D::GROUP_INFO)),
            ("aria-setsize", ChangeRule::node(D::GROUP_INFO)),
            ("aria-level", ChangeRule::node(D::GROUP_INFO)),
            // Role changes alter every computation, and list membership of the
            // subtree
            ("role", ChangeRule::subtree(D::ALL)),
            ("type", ChangeRule::node(D::ALL)),
        ];

        let mut styles: HashMap<String, ChangeRule> = TEXT_STYLE_PROPERTIES
            .iter()
            .map(|p| (p.to_string(), ChangeRule::subtree(D::TEXT)))
            .collect();
        styles.insert("display".to_string(), ChangeRule::node(D::STYLE));

        Self {
            attributes: attributes.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            styles,
            fallback_style: ChangeRule::subtree(D::STYLE | D::TEXT),
        }
    }
}

impl ChangeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the rule for an attribute
    pub fn set_attribute_rule(&mut self, attribute: &str, rule: ChangeRule) {
        self.attributes.insert(attribute.to_ascii_lowercase(), rule);
    }

    /// Add or replace the rule for a style property
    pub fn set_style_rule(&mut self, property: &str, rule: ChangeRule) {
        self.styles.insert(property.to_ascii_lowercase(), rule);
    }

    /// Rule for an attribute; unlisted attributes affect nothing
    pub fn attribute(&self, name: &str) -> Option<ChangeRule> {
        self.attributes.get(name).copied()
    }

    /// Rule for a style property
    pub fn style(&self, property: Option<&str>) -> ChangeRule {
        property
            .and_then(|p| self.styles.get(p).copied())
            .unwrap_or(self.fallback_style)
    }
}

/// Population state of one (node, domain) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DomainState {
    #[default]
    Unpopulated,
    /// Queued for computation
    Populating,
    Populated,
}

/// FIFO of pending domain computations, one entry per (node, domain)
#[derive(Debug, Default)]
pub struct PopulationQueue {
    queue: VecDeque<(NodeId, CacheDomain)>,
    states: HashMap<(NodeId, CacheDomain), DomainState>,
}

impl PopulationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a single domain; returns false if it is already queued
    pub fn push(&mut self, node: NodeId, domain: CacheDomain) -> bool {
        let state = self.states.entry((node, domain)).or_default();
        if *state == DomainState::Populating {
            return false;
        }
        *state = DomainState::Populating;
        self.queue.push_back((node, domain));
        true
    }

    /// Next request still wanted, in submission order
    pub fn pop(&mut self) -> Option<(NodeId, CacheDomain)> {
        while let Some(request) = self.queue.pop_front() {
            if self.state(request.0, request.1) == DomainState::Populating {
                return Some(request);
            }
        }
        None
    }

    /// Record a finished computation
    pub fn complete(&mut self, node: NodeId, domain: CacheDomain) {
        self.states.insert((node, domain), DomainState::Populated);
    }

    /// Record that the pair is no longer populated (and not queued)
    pub fn reset(&mut self, node: NodeId, domain: CacheDomain) {
        self.states.remove(&(node, domain));
    }

    /// Forget every request and state of an evicted node
    pub fn cancel_node(&mut self, node: NodeId) {
        self.states.retain(|(n, _), _| *n != node);
    }

    pub fn state(&self, node: NodeId, domain: CacheDomain) -> DomainState {
        self.states.get(&(node, domain)).copied().unwrap_or_default()
    }

    /// Queued requests (may include cancelled ones not yet skipped)
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.states.clear();
    }
}

/// What a change did to the cache, for the sync layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// These previously populated domains were cleared
    Cleared { node: NodeId, domains: CacheDomain },
    /// Node left the document
    Evicted(NodeId),
}

/// Routes DOM changes to domain invalidations
#[derive(Debug)]
pub struct InvalidationDispatcher {
    map: ChangeMap,
    queue: PopulationQueue,
    active: CacheDomain,
    repopulate: bool,
}

impl InvalidationDispatcher {
    pub fn new(map: ChangeMap, active: CacheDomain, repopulate: bool) -> Self {
        Self {
            map,
            queue: PopulationQueue::new(),
            active,
            repopulate,
        }
    }

    pub fn change_map(&self) -> &ChangeMap {
        &self.map
    }

    /// Domains the consumer asked to keep warm
    pub fn active_domains(&self) -> CacheDomain {
        self.active
    }

    /// Replace the active set, returning the newly activated domains
    pub fn set_active_domains(&mut self, domains: CacheDomain) -> CacheDomain {
        let added = domains - self.active;
        self.active = domains;
        added
    }

    pub fn queue(&self) -> &PopulationQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut PopulationQueue {
        &mut self.queue
    }

    /// Handle one change record.
    ///
    /// Clears the affected domains in `store` and queues repopulation for
    /// domains that were populated or are active.
    pub fn notify_change(
        &mut self,
        doc: &Document,
        store: &mut AttributeStore,
        change: &DomChange,
    ) -> Vec<Invalidation> {
        let target = change.target;

        if change.kind == ChangeKind::NodeRemoved {
            store.evict(target);
            self.queue.cancel_node(target);
            debug!(node = %target, "evicted");
            return vec![Invalidation::Evicted(target)];
        }

        if !doc.contains(target) {
            debug!(node = %target, change = change.kind.name(), "change for detached node dropped");
            return Vec::new();
        }

        let tree = doc.tree();
        let mut targets: Vec<(NodeId, CacheDomain)> = Vec::new();
        let mut add = |rule: ChangeRule, node: NodeId| {
            if rule.subtree {
                targets.extend(tree.descendants(node).into_iter().map(|n| (n, rule.domains)));
            } else {
                targets.push((node, rule.domains));
            }
        };

        match &change.kind {
            ChangeKind::AttributeChanged(name) => {
                if let Some(rule) = self.map.attribute(name) {
                    add(rule, target);
                }
                // Siblings' posinset/setsize count set items
                if SET_MEMBERSHIP_ATTRIBUTES.contains(&name.as_str()) {
                    let siblings = tree.parent(target).into_iter().flat_map(|p| tree.children(p));
                    for sibling in siblings.filter(|&s| s != target) {
                        add(ChangeRule::subtree(CacheDomain::GROUP_INFO), sibling);
                    }
                }
            }
            ChangeKind::StyleChanged(property) => add(self.map.style(property.as_deref()), target),
            ChangeKind::Scrolled => add(ChangeRule::node(CacheDomain::SCROLL_POSITION), target),
            ChangeKind::Reflowed => add(ChangeRule::node(CacheDomain::BOUNDS), target),
            ChangeKind::Zoomed => add(ChangeRule::node(CacheDomain::APZ), target),
            ChangeKind::FocusChanged | ChangeKind::SelectionChanged => {
                add(ChangeRule::node(CacheDomain::STATE), target);
            }
            ChangeKind::TextChanged => {
                let rule = ChangeRule::node(CacheDomain::NAME_AND_DESCRIPTION | CacheDomain::VALUE);
                for ancestor in tree.ancestors(target) {
                    add(rule, ancestor);
                }
            }
            ChangeKind::ChildrenChanged => {
                for child in tree.children(target) {
                    add(ChangeRule::subtree(CacheDomain::GROUP_INFO), child);
                }
                let rule = ChangeRule::node(CacheDomain::NAME_AND_DESCRIPTION);
                add(rule, target);
                for ancestor in tree.ancestors(target) {
                    add(rule, ancestor);
                }
            }
            // Inherited text attributes and nesting level follow the new ancestors
            ChangeKind::Moved => add(ChangeRule::subtree(CacheDomain::TEXT | CacheDomain::GROUP_INFO), target),
            ChangeKind::NodeRemoved => {}
        }

        let out: Vec<Invalidation> = targets
            .into_iter()
            .filter_map(|(node, domains)| self.invalidate(doc, store, node, domains))
            .collect();

        // Freshly inserted nodes need the active domains too
        if change.kind == ChangeKind::ChildrenChanged && !self.active.is_empty() {
            let active = self.active;
            let inserted: Vec<NodeId> = tree.children(target).flat_map(|c| tree.descendants(c)).collect();
            for node in inserted {
                self.schedule(doc, node, active);
            }
        }
        out
    }

    /// Clear `domains` for one node and schedule repopulation
    pub fn invalidate(
        &mut self,
        doc: &Document,
        store: &mut AttributeStore,
        node: NodeId,
        domains: CacheDomain,
    ) -> Option<Invalidation> {
        let domains = applicable(doc, node, domains);
        if domains.is_empty() {
            return None;
        }

        let was_populated = store.clear_domain(node, domains);
        for domain in domains.domains() {
            // Queued work reads the document when it runs, so it is already fresh
            if self.queue.state(node, domain) == DomainState::Populating {
                continue;
            }
            self.queue.reset(node, domain);
            if self.repopulate && (was_populated.contains(domain) || self.active.contains(domain)) {
                self.queue.push(node, domain);
            }
        }
        debug!(node = %node, domains = %domains, cleared = %was_populated, "invalidated");

        if was_populated.is_empty() {
            None
        } else {
            Some(Invalidation::Cleared { node, domains: was_populated })
        }
    }

    /// Queue population of `domains` for a node, skipping domains the node
    /// cannot have and ones already queued or populated. Returns the domains
    /// actually queued.
    pub fn schedule(&mut self, doc: &Document, node: NodeId, domains: CacheDomain) -> CacheDomain {
        if !doc.contains(node) {
            return CacheDomain::NONE;
        }
        let mut queued = CacheDomain::NONE;
        for domain in applicable(doc, node, domains).domains() {
            if self.queue.state(node, domain) == DomainState::Unpopulated && self.queue.push(node, domain) {
                queued |= domain;
            }
        }
        queued
    }
}

/// Domains that can hold values for `node`: elements carry everything
/// but APZ, which only exists on the root of a top-level document.
fn applicable(doc: &Document, node: NodeId, domains: CacheDomain) -> CacheDomain {
    let allowed = if node == doc.root() {
        if doc.is_top_level() { CacheDomain::APZ } else { CacheDomain::NONE }
    } else if doc.element(node).is_some() {
        CacheDomain::ALL - CacheDomain::APZ
    } else {
        CacheDomain::NONE
    };
    if domains == CacheDomain::APZ && !allowed.contains(CacheDomain::APZ) {
        debug!(node = %node, "APZ work off the top-level root dropped");
    }
    domains & allowed
}
