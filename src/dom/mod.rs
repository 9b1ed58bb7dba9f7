//! Live document: slotmap-backed node arena, source snapshots, markup.

pub mod node;
pub mod query;
pub mod source;
pub mod tree;

pub use node::{NodeData, NodeId, NodeKind};
pub use source::{parse_markup, MarkupError, SourceNode};
pub use tree::Document;
