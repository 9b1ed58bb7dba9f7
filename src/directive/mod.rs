//! Directives: the `Directive` trait, the ordered registry, and built-ins.
//!
//! Registry order is the per-node execution priority for every app:
//!
//! | # | Name | Matches |
//! |---|------|---------|
//! | 1 | `:if` | `:if="guard"` |
//! | 2 | `:each` | `:each="item in collection"` |
//! | 3 | `:scope` | `:scope="expr [as alias]"` |
//! | 4 | `literals` | text nodes containing `{{expr}}` |
//! | 5 | `:class` | `:class="{name: bool}"` |
//! | 6 | `:attr-*` | `:attr-name="expr"` |
//! | 7 | `:options` | `<select :options="v displayed as d in list">` |
//! | 8 | `:debounce` | `:debounce="{event: ms}"` |
//! | 9 | `:bind` | `:bind="target [on (events)]"` |
//! | 10 | `@events` | `@event="handler"` |
//! | 11 | `:component` | tags with a `-`, or `:component="name"` |

pub mod attr;
pub mod bind;
pub mod class;
pub mod component;
pub mod conditional;
pub mod debounce;
pub mod events;
pub mod interpolate;
pub mod options;
pub mod repeat;
pub mod scoped;

use std::any::Any;
use std::rc::Rc;
use std::time::Duration;

use indexmap::IndexMap;

use crate::app::Engine;
use crate::dom::{NodeId, SourceNode};
use crate::scope::Scope;
use crate::template::{CompileError, RenderError, TemplateId};

/// Whether the apply phase continues with the node's remaining directives
/// and children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The directive handled the rest of this node itself (or hid it).
    Stop,
}

/// What a directive's apply step is working on.
pub struct ApplyCx<'a> {
    pub template: TemplateId,
    pub node: NodeId,
    pub scope: Rc<Scope>,
    /// Directive names skipped for this node on this application.
    pub excludes: &'a [&'static str],
}

impl ApplyCx<'_> {
    /// `excludes` plus `name`.
    pub fn excluding(&self, name: &'static str) -> Vec<&'static str> {
        let mut out = self.excludes.to_vec();
        if !out.contains(&name) {
            out.push(name);
        }
        out
    }
}

/// A named rule: an applicability test, a compile step and an apply step.
pub trait Directive {
    fn name(&self) -> &'static str;

    fn applies_to(&self, node: &SourceNode) -> bool;

    /// Produce the compiled parameter handed to every later `apply`.
    fn compile(
        &self,
        engine: &Engine,
        scope: &Rc<Scope>,
        node: &SourceNode,
    ) -> Result<Rc<dyn Any>, CompileError>;

    fn apply(
        &self,
        engine: &mut Engine,
        cx: ApplyCx<'_>,
        param: &Rc<dyn Any>,
    ) -> Result<Flow, RenderError>;

    /// Children are compiled by the directive itself on first activation.
    fn defers_children(&self) -> bool {
        false
    }

    /// Still runs while the node is swapped out for a placeholder.
    fn runs_on_placeholder(&self) -> bool {
        false
    }
}

/// Per-node state directives keep across render passes.
#[derive(Debug, Default, Clone)]
pub struct NodeState {
    /// Event name to debounce delay, evaluated on first apply.
    pub debounce: Option<IndexMap<String, Duration>>,
    /// The active two-way binding, if any.
    pub bind: Option<Rc<bind::BindParam>>,
    pub bind_wired: bool,
    pub events_wired: bool,
    /// A component has been expanded into this node.
    pub rendered: bool,
}

/// Borrow a compiled parameter as its concrete type.
pub(crate) fn param_ref<'a, T: 'static>(
    param: &'a Rc<dyn Any>,
    directive: &'static str,
) -> Result<&'a T, RenderError> {
    param
        .downcast_ref::<T>()
        .ok_or(RenderError::ParamMismatch(directive))
}

/// Take an owned handle on a compiled parameter.
pub(crate) fn param_rc<T: 'static>(
    param: &Rc<dyn Any>,
    directive: &'static str,
) -> Result<Rc<T>, RenderError> {
    Rc::clone(param)
        .downcast::<T>()
        .map_err(|_| RenderError::ParamMismatch(directive))
}

/// Split `text` at the first `keyword` surrounded by whitespace, returning
/// the trimmed halves. The left half must not be empty.
pub(crate) fn split_clause<'a>(text: &'a str, keyword: &str) -> Option<(&'a str, &'a str)> {
    let mut search = 0;
    while let Some(offset) = text[search..].find(keyword) {
        let at = search + offset;
        let end = at + keyword.len();
        let spaced_before = text[..at].chars().next_back().is_some_and(char::is_whitespace);
        let spaced_after = text[end..].chars().next().is_some_and(char::is_whitespace);
        let left = text[..at].trim();
        if spaced_before && spaced_after && !left.is_empty() {
            return Some((left, text[end..].trim()));
        }
        search = end;
    }
    None
}

/// Matches elements carrying attribute `name`.
pub(crate) fn has_attr(node: &SourceNode, name: &str) -> bool {
    node.is_element() && node.has_attr(name)
}

// ---------------------------------------------------------------------------
// DirectiveRegistry
// ---------------------------------------------------------------------------

/// Ordered directive list plus a name index.
#[derive(Clone, Default)]
pub struct DirectiveRegistry {
    ordered: Vec<Rc<dyn Directive>>,
    by_name: IndexMap<&'static str, usize>,
}

impl DirectiveRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in directive set, in priority order.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(conditional::Conditional);
        registry.register(repeat::Repeat);
        registry.register(scoped::Scoped);
        registry.register(interpolate::Interpolate);
        registry.register(class::ClassMap);
        registry.register(attr::AttrBinding);
        registry.register(options::SelectOptions);
        registry.register(debounce::Debounce);
        registry.register(bind::TwoWayBind);
        registry.register(events::EventHandlers);
        registry.register(component::ComponentExpand);
        registry
    }

    /// Append a directive at the lowest priority. Re-registering a name
    /// replaces the directive in place, keeping its priority.
    pub fn register(&mut self, directive: impl Directive + 'static) {
        let name = directive.name();
        let directive: Rc<dyn Directive> = Rc::new(directive);
        match self.by_name.get(name) {
            Some(&ix) => self.ordered[ix] = directive,
            None => {
                self.by_name.insert(name, self.ordered.len());
                self.ordered.push(directive);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Rc<dyn Directive>> {
        self.by_name.get(name).map(|&ix| &self.ordered[ix])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<dyn Directive>> {
        self.ordered.iter()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.ordered.iter().map(|d| d.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}
