//! Tree operations: insert, replace, detach, remove, placehold, instantiate.

use std::collections::VecDeque;

use slotmap::{SecondaryMap, SlotMap};

use super::node::{NodeData, NodeId, NodeKind};
use super::source::SourceNode;

/// Empty slice constant for returning when a node has no children.
const EMPTY_CHILDREN: &[NodeId] = &[];

/// The live document, backed by a slotmap arena.
///
/// All nodes live in a single `SlotMap`. Parent/child relationships are stored
/// in secondary maps. Detached nodes (removed from their parent but not
/// deleted) stay in the arena, which is how placeholders keep the real node
/// alive while it is hidden.
pub struct Document {
    pub(crate) nodes: SlotMap<NodeId, NodeData>,
    children: SecondaryMap<NodeId, Vec<NodeId>>,
    parent: SecondaryMap<NodeId, NodeId>,
    root: Option<NodeId>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            children: SecondaryMap::new(),
            parent: SecondaryMap::new(),
            root: None,
        }
    }

    /// Insert a detached node (no parent).
    ///
    /// If no root has been set yet, this node becomes the root.
    pub fn insert(&mut self, data: NodeData) -> NodeId {
        let id = self.create(data);
        if self.root.is_none() {
            self.root = Some(id);
        }
        id
    }

    /// Create a node in the arena without touching the root.
    fn create(&mut self, data: NodeData) -> NodeId {
        let id = self.nodes.insert(data);
        self.children.insert(id, Vec::new());
        id
    }

    /// Insert a new node as the last child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics (debug) if `parent` does not exist in the tree.
    pub fn insert_child(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        debug_assert!(
            self.nodes.contains_key(parent),
            "parent node does not exist"
        );
        let id = self.create(data);
        self.attach(parent, id, None);
        id
    }

    /// Link a detached `node` under `parent` at `index` (append when `None`).
    fn attach(&mut self, parent: NodeId, node: NodeId, index: Option<usize>) {
        self.parent.insert(node, parent);
        if let Some(siblings) = self.children.get_mut(parent) {
            match index {
                Some(ix) if ix <= siblings.len() => siblings.insert(ix, node),
                _ => siblings.push(node),
            }
        }
    }

    /// Unlink `node` from its parent. The node and its subtree stay in the arena.
    ///
    /// Returns the former parent and the node's index within it.
    pub fn detach(&mut self, node: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent.remove(node)?;
        let siblings = self.children.get_mut(parent)?;
        let index = siblings.iter().position(|&c| c == node)?;
        siblings.remove(index);
        Some((parent, index))
    }

    /// Move `node` (attached or detached) to sit immediately after `anchor`.
    ///
    /// No-op if `anchor` has no parent.
    pub fn insert_after(&mut self, anchor: NodeId, node: NodeId) {
        if anchor == node {
            return;
        }
        let Some(parent) = self.parent(anchor) else {
            return;
        };
        self.detach(node);
        let index = self
            .children(parent)
            .iter()
            .position(|&c| c == anchor)
            .map(|ix| ix + 1);
        self.attach(parent, node, index);
    }

    /// Put `new` where `old` is. `old` becomes detached but stays in the arena.
    ///
    /// Returns `false` if `old` has no parent (nothing is changed).
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> bool {
        if old == new {
            return true;
        }
        self.detach(new);
        let Some((parent, index)) = self.detach(old) else {
            return false;
        };
        self.attach(parent, new, Some(index));
        if self.root == Some(old) {
            self.root = Some(new);
        }
        true
    }

    /// Remove a node and all its descendants from the arena.
    ///
    /// Placeholders take their held node down with them. Returns every removed
    /// id (empty if `id` did not exist).
    pub fn remove(&mut self, id: NodeId) -> Vec<NodeId> {
        if !self.nodes.contains_key(id) {
            return Vec::new();
        }

        self.detach(id);

        // Clear root if we're removing it.
        if self.root == Some(id) {
            self.root = None;
        }

        // Collect all descendants (BFS) to remove them.
        let mut removed = Vec::new();
        let mut to_remove = VecDeque::new();
        to_remove.push_back(id);

        while let Some(current) = to_remove.pop_front() {
            // Queue children before removing.
            if let Some(kids) = self.children.remove(current) {
                to_remove.extend(kids);
            }
            self.parent.remove(current);
            if let Some(data) = self.nodes.remove(current) {
                if let Some(held) = data.held {
                    to_remove.push_back(held);
                }
                removed.push(current);
            }
        }

        removed
    }

    /// Remove every child of `id`, returning the removed ids.
    pub fn clear_children(&mut self, id: NodeId) -> Vec<NodeId> {
        let kids = self.children(id).to_vec();
        kids.into_iter().flat_map(|kid| self.remove(kid)).collect()
    }

    // -- Placeholders -----------------------------------------------------

    /// Swap `node` out for a comment carrying `label` that holds `node` for
    /// later restoration. Returns the placeholder id.
    pub fn placehold(&mut self, node: NodeId, label: impl Into<String>) -> NodeId {
        let mut data = NodeData::comment(label);
        data.held = Some(node);
        let placeholder = self.create(data);
        if !self.replace(node, placeholder) && self.root == Some(node) {
            self.root = Some(placeholder);
        }
        placeholder
    }

    /// Put the held node back where `placeholder` is and delete the placeholder.
    ///
    /// Returns the restored node, or `None` if `placeholder` holds nothing.
    pub fn restore(&mut self, placeholder: NodeId) -> Option<NodeId> {
        let held = self.nodes.get_mut(placeholder)?.held.take()?;
        self.replace(placeholder, held);
        if self.root == Some(placeholder) {
            self.root = Some(held);
        }
        self.remove(placeholder);
        Some(held)
    }

    /// Whether `id` is a comment standing in for a detached node.
    pub fn is_placeholder(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(NodeData::is_placeholder)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(NodeData::is_element)
    }

    /// Whether `id` is connected to the document root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let Some(root) = self.root else {
            return false;
        };
        let mut current = id;
        loop {
            if current == root {
                return true;
            }
            match self.parent.get(current) {
                Some(&p) => current = p,
                None => return false,
            }
        }
    }

    // -- Source snapshots -------------------------------------------------

    /// Build live nodes from a source snapshot. The new subtree is appended to
    /// `parent`, or left detached when `parent` is `None`.
    pub fn instantiate(&mut self, parent: Option<NodeId>, source: &SourceNode) -> NodeId {
        let data = match source {
            SourceNode::Element {
                tag, attributes, ..
            } => {
                let mut data = NodeData::element(tag.as_str());
                for (name, value) in attributes {
                    data.set_attr(name.as_str(), value.as_str());
                }
                data
            }
            SourceNode::Text(text) => NodeData::text(text.as_str()),
            SourceNode::Comment(text) => NodeData::comment(text.as_str()),
        };
        let id = match parent {
            Some(parent) => self.insert_child(parent, data),
            None => self.create(data),
        };
        for child in source.children() {
            self.instantiate(Some(id), child);
        }
        id
    }

    /// Copy a live subtree into an owned snapshot.
    ///
    /// Placeholders snapshot as their held node.
    pub fn snapshot(&self, id: NodeId) -> Option<SourceNode> {
        let data = self.nodes.get(id)?;
        if let Some(held) = data.held {
            return self.snapshot(held);
        }
        Some(match &data.kind {
            NodeKind::Element { tag } => SourceNode::Element {
                tag: tag.clone(),
                attributes: data.attributes.clone(),
                children: self
                    .children(id)
                    .iter()
                    .filter_map(|&c| self.snapshot(c))
                    .collect(),
            },
            NodeKind::Text => SourceNode::Text(data.text.clone()),
            NodeKind::Comment => SourceNode::Comment(data.text.clone()),
        })
    }

    // -- Accessors --------------------------------------------------------

    /// Get the parent of a node, if it has one.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parent.get(id).copied()
    }

    /// Get the children of a node. Returns an empty slice if the node has no children
    /// or does not exist.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(EMPTY_CHILDREN)
    }

    /// The sibling immediately after `id`, if any.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let ix = siblings.iter().position(|&c| c == id)?;
        siblings.get(ix + 1).copied()
    }

    /// Walk from `id` up to the root, collecting ancestor node ids.
    ///
    /// The returned vec does **not** include `id` itself; it starts with the
    /// immediate parent and ends at the topmost ancestor.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = id;
        while let Some(p) = self.parent.get(current).copied() {
            result.push(p);
            current = p;
        }
        result
    }

    /// Immutable access to a node's data.
    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id)
    }

    /// Mutable access to a node's data.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id)
    }

    /// The current root node, if set.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Explicitly set the root node.
    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    /// Number of nodes in the arena (attached or not).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the document is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the arena contains a node with the given id.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Pre-order depth-first traversal starting from `start`.
    pub fn walk_depth_first(&self, start: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !self.nodes.contains_key(current) {
                continue;
            }
            result.push(current);
            // Push children in reverse so the first child is visited first.
            let kids = self.children(current);
            for &child in kids.iter().rev() {
                stack.push(child);
            }
        }
        result
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
