//! Document queries and serialization.

use super::node::{NodeData, NodeId, NodeKind};
use super::source::{escape_attr, escape_text, is_void};
use super::tree::Document;

impl Document {
    /// Find the first attached-or-detached node in tree order under `start`
    /// whose attribute `name` equals `value`.
    pub fn query_by_attr(&self, start: NodeId, name: &str, value: &str) -> Option<NodeId> {
        self.walk_depth_first(start)
            .into_iter()
            .find(|&id| self.get(id).and_then(|d| d.attr(name)) == Some(value))
    }

    /// Find the first node under the root whose `id` attribute matches.
    pub fn query_by_id(&self, id: &str) -> Option<NodeId> {
        self.root().and_then(|root| self.query_by_attr(root, "id", id))
    }

    /// Find all nodes under `start` (tree order) matching a predicate.
    pub fn query_all(&self, start: NodeId, predicate: impl Fn(&NodeData) -> bool) -> Vec<NodeId> {
        self.walk_depth_first(start)
            .into_iter()
            .filter(|&id| self.get(id).is_some_and(&predicate))
            .collect()
    }

    /// Concatenated text of all text descendants (comments excluded).
    pub fn text_content(&self, id: NodeId) -> String {
        self.walk_depth_first(id)
            .into_iter()
            .filter_map(|n| self.get(n))
            .filter(|d| d.is_text())
            .map(|d| d.text.as_str())
            .collect()
    }

    /// Serialize a live subtree to markup.
    pub fn to_markup(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_markup(id, &mut out);
        out
    }

    fn write_markup(&self, id: NodeId, out: &mut String) {
        let Some(data) = self.get(id) else {
            return;
        };
        match &data.kind {
            NodeKind::Text => out.push_str(&escape_text(&data.text)),
            NodeKind::Comment => {
                out.push_str("<!--");
                out.push_str(&data.text);
                out.push_str("-->");
            }
            NodeKind::Element { tag } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in &data.attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(value));
                    out.push('"');
                }
                out.push('>');
                if is_void(tag) {
                    return;
                }
                for &child in self.children(id) {
                    self.write_markup(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}
