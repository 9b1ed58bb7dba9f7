//! Listener registry and bubble path computation.
//!
//! [`Listeners`] maps nodes to `(event kind, handler)` pairs. The
//! `bubble_path` static method computes the traversal order from a node up
//! to the document root; [`Engine::dispatch`](crate::app::Engine::dispatch)
//! walks it.

use std::fmt;
use std::rc::Rc;

use slotmap::SecondaryMap;

use super::input::Event;
use crate::app::Engine;
use crate::dom::{Document, NodeId};
use crate::template::RenderError;

/// A listener callback. Receives the engine so it can evaluate expressions,
/// write the model and schedule renders.
pub type Handler = Rc<dyn Fn(&mut Engine, &mut Event) -> Result<(), RenderError>>;

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

/// Per-node event listeners, in registration order.
#[derive(Default)]
pub struct Listeners {
    map: SecondaryMap<NodeId, Vec<(String, Handler)>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind` events on `node`.
    pub fn add(&mut self, node: NodeId, kind: impl Into<String>, handler: Handler) {
        let kind = kind.into();
        match self.map.get_mut(node) {
            Some(list) => list.push((kind, handler)),
            None => {
                self.map.insert(node, vec![(kind, handler)]);
            }
        }
    }

    /// Handlers on `node` for `kind`, cloned so they can run while the
    /// registry is mutated.
    pub fn handlers_for(&self, node: NodeId, kind: &str) -> Vec<Handler> {
        self.map
            .get(node)
            .map(|list| {
                list.iter()
                    .filter(|(k, _)| k == kind)
                    .map(|(_, h)| Rc::clone(h))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of listeners on `node` (all kinds).
    pub fn count(&self, node: NodeId) -> usize {
        self.map.get(node).map_or(0, Vec::len)
    }

    /// Drop every listener of the given nodes.
    pub fn remove_nodes(&mut self, nodes: &[NodeId]) {
        for &node in nodes {
            self.map.remove(node);
        }
    }

    /// Compute the bubble path from `start` up to the root (inclusive).
    ///
    /// Returns `[start, parent, grandparent, ..., root]`.
    /// If `start` does not exist in the document, returns an empty vec.
    pub fn bubble_path(doc: &Document, start: NodeId) -> Vec<NodeId> {
        if !doc.contains(start) {
            return Vec::new();
        }
        let mut path = vec![start];
        path.extend(doc.ancestors(start));
        path
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.map
                    .iter()
                    .map(|(node, list)| (node, list.iter().map(|(k, _)| k).collect::<Vec<_>>())),
            )
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeData;

    /// Build a small test tree:
    /// ```text
    ///       root
    ///      /    \
    ///    a        b
    ///   /
    ///  c
    /// ```
    fn build_tree() -> (Document, NodeId, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let root = doc.insert(NodeData::element("body"));
        let a = doc.insert_child(root, NodeData::element("div"));
        let b = doc.insert_child(root, NodeData::element("div"));
        let c = doc.insert_child(a, NodeData::element("button"));
        (doc, root, a, b, c)
    }

    fn noop() -> Handler {
        Rc::new(|_, _| Ok(()))
    }

    #[test]
    fn add_and_filter_by_kind() {
        let (_, _, a, b, _) = build_tree();
        let mut listeners = Listeners::new();
        listeners.add(a, "click", noop());
        listeners.add(a, "click", noop());
        listeners.add(a, "change", noop());
        assert_eq!(listeners.handlers_for(a, "click").len(), 2);
        assert_eq!(listeners.handlers_for(a, "change").len(), 1);
        assert!(listeners.handlers_for(b, "click").is_empty());
        assert_eq!(listeners.count(a), 3);
    }

    #[test]
    fn remove_nodes_drops_listeners() {
        let (_, _, a, b, _) = build_tree();
        let mut listeners = Listeners::new();
        listeners.add(a, "click", noop());
        listeners.add(b, "click", noop());
        listeners.remove_nodes(&[a]);
        assert_eq!(listeners.count(a), 0);
        assert_eq!(listeners.count(b), 1);
    }

    // ── Bubble path ──────────────────────────────────────────────────

    #[test]
    fn bubble_path_from_leaf() {
        let (doc, root, a, _, c) = build_tree();
        assert_eq!(Listeners::bubble_path(&doc, c), vec![c, a, root]);
        assert_eq!(Listeners::bubble_path(&doc, root), vec![root]);
    }

    #[test]
    fn bubble_path_nonexistent_node() {
        let (mut doc, ..) = build_tree();
        let stale = doc.insert(NodeData::element("ghost"));
        doc.remove(stale);
        assert!(Listeners::bubble_path(&doc, stale).is_empty());
    }
}
