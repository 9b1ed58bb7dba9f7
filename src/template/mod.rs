//! Template tree: compiled descriptors mirroring the live document.
//!
//! Every live node an app governs has a [`TemplateNode`] in the [`Templates`]
//! arena. The compile phase ([`compile`]) builds them once; the apply phase
//! ([`apply`]) walks them on every render pass.

pub mod apply;
pub mod compile;

use std::any::Any;
use std::rc::Rc;

use indexmap::IndexMap;
use slotmap::{new_key_type, SlotMap};

use crate::dom::{NodeId, SourceNode};
use crate::expr::{EvalError, ParseError};
use crate::scope::Scope;

new_key_type! {
    /// Handle to a template node.
    pub struct TemplateId;
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A directive failed to compile. Logged, never fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("syntax error in '{text}': {source}")]
    Syntax {
        text: String,
        #[source]
        source: ParseError,
    },
    #[error("malformed '{text}': {reason}")]
    Malformed { text: String, reason: &'static str },
    #[error("'{0}' cannot be assigned to")]
    NotAssignable(String),
    #[error("unknown component '{0}'")]
    UnknownComponent(String),
}

impl CompileError {
    pub(crate) fn syntax(text: &str, source: ParseError) -> Self {
        CompileError::Syntax {
            text: text.to_owned(),
            source,
        }
    }
}

/// A render pass aborted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error("unknown app '{0}'")]
    UnknownApp(String),
    #[error("template no longer exists")]
    StaleTemplate,
    #[error("compiled parameter of {0} has the wrong type")]
    ParamMismatch(&'static str),
    #[error("no element with id '{0}'")]
    NoSuchElement(String),
}

// ---------------------------------------------------------------------------
// TemplateNode
// ---------------------------------------------------------------------------

/// One matched directive and its compiled parameter. `param` is `None` when
/// compilation failed; such entries are skipped at apply time.
#[derive(Clone)]
pub struct DirectiveEntry {
    pub name: &'static str,
    pub param: Option<Rc<dyn Any>>,
}

impl std::fmt::Debug for DirectiveEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectiveEntry")
            .field("name", &self.name)
            .field("compiled", &self.param.is_some())
            .finish()
    }
}

/// Compiled descriptor for one live node.
#[derive(Debug)]
pub struct TemplateNode {
    pub app: Rc<str>,
    /// The real node this template governs.
    pub node: NodeId,
    pub scope: Rc<Scope>,
    /// Scope handed to children instead of `scope` (set by scoping and
    /// component directives).
    pub inner_scope: Option<Rc<Scope>>,
    /// Snapshot of the node taken when first compiled.
    pub source: Rc<SourceNode>,
    /// Shared with every repetition clone of this template.
    pub directives: Rc<[DirectiveEntry]>,
    pub children: Vec<TemplateId>,
    /// The template this one was cloned from (itself when not a clone).
    pub original: TemplateId,
    pub compiled_once: bool,
    pub last_pass: u64,
    /// Placeholder standing in for `node` while a guard is false.
    pub hidden: Option<NodeId>,
    /// Placeholder marking where repetition clones are inserted.
    pub anchor: Option<NodeId>,
    /// Repetition clones by collection key.
    pub keyed: IndexMap<String, TemplateId>,
}

impl TemplateNode {
    /// The node currently occupying this template's slot in the document.
    pub fn position(&self) -> NodeId {
        self.hidden.or(self.anchor).unwrap_or(self.node)
    }

    /// The scope children are applied under.
    pub fn child_scope(&self) -> Rc<Scope> {
        Rc::clone(self.inner_scope.as_ref().unwrap_or(&self.scope))
    }

    pub fn has_directive(&self, name: &str) -> bool {
        self.directives.iter().any(|d| d.name == name)
    }

    pub fn is_clone(&self, id: TemplateId) -> bool {
        self.original != id
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Arena of template nodes.
#[derive(Debug, Default)]
pub struct Templates {
    nodes: SlotMap<TemplateId, TemplateNode>,
}

impl Templates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: TemplateNode) -> TemplateId {
        let id = self.nodes.insert(node);
        if let Some(tpl) = self.nodes.get_mut(id) {
            if tpl.original == TemplateId::default() {
                tpl.original = id;
            }
        }
        id
    }

    pub fn get(&self, id: TemplateId) -> Option<&TemplateNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: TemplateId) -> Option<&mut TemplateNode> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: TemplateId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Remove a template, its children and its repetition clones.
    pub fn remove_subtree(&mut self, id: TemplateId) -> usize {
        let Some(tpl) = self.nodes.remove(id) else {
            return 0;
        };
        1 + tpl
            .children
            .iter()
            .chain(tpl.keyed.values())
            .map(|&child| self.remove_subtree(child))
            .sum::<usize>()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ShadowPolicy;
    use crate::value::Value;
    use slotmap::SlotMap;

    fn node_ids(n: usize) -> Vec<NodeId> {
        let mut sm = SlotMap::<NodeId, ()>::with_key();
        (0..n).map(|_| sm.insert(())).collect()
    }

    fn template(node: NodeId) -> TemplateNode {
        TemplateNode {
            app: Rc::from("main"),
            node,
            scope: Scope::root(Value::object(), "app", ShadowPolicy::default()),
            inner_scope: None,
            source: Rc::new(SourceNode::element("div")),
            directives: Rc::from(Vec::new()),
            children: Vec::new(),
            original: TemplateId::default(),
            compiled_once: false,
            last_pass: 0,
            hidden: None,
            anchor: None,
            keyed: IndexMap::new(),
        }
    }

    #[test]
    fn insert_defaults_original_to_self() {
        let ids = node_ids(1);
        let mut templates = Templates::new();
        let id = templates.insert(template(ids[0]));
        let tpl = templates.get(id).unwrap();
        assert_eq!(tpl.original, id);
        assert!(!tpl.is_clone(id));
    }

    #[test]
    fn remove_subtree_takes_children_and_clones() {
        let ids = node_ids(4);
        let mut templates = Templates::new();
        let child = templates.insert(template(ids[1]));
        let clone = templates.insert(template(ids[2]));
        let unrelated = templates.insert(template(ids[3]));
        let mut parent = template(ids[0]);
        parent.children.push(child);
        parent.keyed.insert("a".into(), clone);
        let parent = templates.insert(parent);

        assert_eq!(templates.remove_subtree(parent), 3);
        assert!(!templates.contains(child));
        assert!(!templates.contains(clone));
        assert!(templates.contains(unrelated));
    }

    #[test]
    fn position_prefers_placeholders() {
        let ids = node_ids(3);
        let mut tpl = template(ids[0]);
        assert_eq!(tpl.position(), ids[0]);
        tpl.anchor = Some(ids[1]);
        assert_eq!(tpl.position(), ids[1]);
        tpl.hidden = Some(ids[2]);
        assert_eq!(tpl.position(), ids[2]);
    }
}
