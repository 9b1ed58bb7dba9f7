//! Node types: NodeId, NodeKind, NodeData.

use indexmap::IndexMap;
use slotmap::new_key_type;

new_key_type! {
    /// Unique identifier for a live document node. Copy, lightweight (u64).
    pub struct NodeId;
}

/// What kind of node this is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// An element with a (lowercase) tag name.
    Element { tag: String },
    /// A text node.
    Text,
    /// A comment. Placeholders are comments that hold a detached node.
    Comment,
}

/// Data associated with a single live node.
#[derive(Debug, Clone)]
pub struct NodeData {
    pub kind: NodeKind,
    /// Element attributes, in source order.
    pub attributes: IndexMap<String, String>,
    /// Text content for text and comment nodes.
    pub text: String,
    /// Form value property of an element (initialized from its `value` attribute).
    pub value: String,
    /// For placeholders: the real node detached in its place.
    pub held: Option<NodeId>,
}

impl NodeData {
    /// Create an element node.
    pub fn element(tag: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Element {
                tag: tag.into().to_ascii_lowercase(),
            },
            attributes: IndexMap::new(),
            text: String::new(),
            value: String::new(),
            held: None,
        }
    }

    /// Create a text node.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Text,
            attributes: IndexMap::new(),
            text: text.into(),
            value: String::new(),
            held: None,
        }
    }

    /// Create a comment node.
    pub fn comment(text: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Comment,
            ..Self::text(text)
        }
    }

    /// Set an attribute (builder). A `value` attribute also seeds the value property.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn is_element(&self) -> bool {
        matches!(self.kind, NodeKind::Element { .. })
    }

    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }

    pub fn is_comment(&self) -> bool {
        self.kind == NodeKind::Comment
    }

    /// Whether this comment stands in for a detached node.
    pub fn is_placeholder(&self) -> bool {
        self.is_comment() && self.held.is_some()
    }

    /// Element tag name, if this is an element.
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { tag } => Some(tag),
            _ => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if name == "value" {
            self.value.clone_from(&value);
        }
        self.attributes.insert(name, value);
    }

    /// Remove an attribute, returning its old value.
    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        self.attributes.shift_remove(name)
    }

    /// Whitespace-separated class tokens.
    pub fn classes(&self) -> Vec<&str> {
        self.attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Check whether this node has a given class token.
    pub fn has_class(&self, class: &str) -> bool {
        self.classes().contains(&class)
    }
}
