//! Component registry.
//!
//! A component is named markup plus declared attributes, an alias for its
//! bound object, and optionally a [`ComponentBuilder`] producing that object.
//! Elements whose tag contains a `-` (or that carry `:component="name"`) are
//! expanded by the `:component` directive.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::warn;

use crate::directive::split_clause;
use crate::dom::{parse_markup, MarkupError, NodeId, SourceNode};
use crate::reactive::RenderHook;
use crate::value::Value;

/// How a declared attribute is passed to the component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    /// The attribute text is an expression evaluated in the caller's scope.
    Ref,
    /// The attribute text is passed as a string.
    Value,
}

/// What a builder receives when a component is expanded.
#[derive(Debug, Clone)]
pub struct ComponentContext {
    /// The element being expanded.
    pub node: NodeId,
    /// Declared attributes, evaluated.
    pub attrs: Value,
    /// Requests a render of the owning app.
    pub hook: RenderHook,
}

/// Produces the object a component's content is bound to.
pub trait ComponentBuilder {
    fn build(&self, cx: ComponentContext) -> Value;
}

impl<F> ComponentBuilder for F
where
    F: Fn(ComponentContext) -> Value,
{
    fn build(&self, cx: ComponentContext) -> Value {
        self(cx)
    }
}

// ---------------------------------------------------------------------------
// ComponentDef
// ---------------------------------------------------------------------------

/// A registered component.
#[derive(Clone)]
pub struct ComponentDef {
    pub name: String,
    pub markup: Vec<SourceNode>,
    pub attrs: IndexMap<String, PassMode>,
    /// Alias the bound object is visible under (`vm` by default).
    pub alias: String,
    pub builder: Option<Rc<dyn ComponentBuilder>>,
}

impl ComponentDef {
    pub fn new(name: impl Into<String>, markup: Vec<SourceNode>) -> Self {
        Self {
            name: name.into(),
            markup,
            attrs: IndexMap::new(),
            alias: "vm".to_owned(),
            builder: None,
        }
    }

    /// Parse `markup` as the component's content.
    pub fn from_markup(name: impl Into<String>, markup: &str) -> Result<Self, MarkupError> {
        Ok(Self::new(name, parse_markup(markup)?))
    }

    pub fn with_attr(mut self, name: impl Into<String>, mode: PassMode) -> Self {
        self.attrs.insert(name.into(), mode);
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    pub fn with_builder(mut self, builder: impl ComponentBuilder + 'static) -> Self {
        self.builder = Some(Rc::new(builder));
        self
    }
}

impl fmt::Debug for ComponentDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDef")
            .field("name", &self.name)
            .field("attrs", &self.attrs)
            .field("alias", &self.alias)
            .field("has_builder", &self.builder.is_some())
            .finish()
    }
}

/// Parse an `attrs` declaration: `a by ref, b by value`. Entries that do
/// not match are ignored.
fn parse_attr_modes(text: &str) -> IndexMap<String, PassMode> {
    text.split(',')
        .filter_map(|entry| {
            let (name, mode) = split_clause(entry, "by")?;
            let mode = match mode {
                "ref" => PassMode::Ref,
                "value" => PassMode::Value,
                _ => return None,
            };
            Some((name.to_owned(), mode))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Components by case-insensitive name.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    defs: IndexMap<String, Rc<ComponentDef>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a component.
    pub fn register(&mut self, def: ComponentDef) {
        self.defs.insert(def.name.to_ascii_uppercase(), Rc::new(def));
    }

    pub fn get(&self, name: &str) -> Option<Rc<ComponentDef>> {
        self.defs.get(&name.to_ascii_uppercase()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(&name.to_ascii_uppercase())
    }

    /// Attach a builder to a registered component. Returns `false` if the
    /// name is unknown.
    pub fn set_builder(&mut self, name: &str, builder: impl ComponentBuilder + 'static) -> bool {
        let Some(def) = self.defs.get_mut(&name.to_ascii_uppercase()) else {
            return false;
        };
        Rc::make_mut(def).builder = Some(Rc::new(builder));
        true
    }

    pub fn names(&self) -> Vec<&str> {
        self.defs.values().map(|d| d.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Register every `<x-component name=".." attrs=".." scopename="..">`
    /// block in `markup`. `x-script` children are dropped. Returns the number
    /// of components registered.
    pub fn load_definitions(&mut self, markup: &str) -> Result<usize, MarkupError> {
        let nodes = parse_markup(markup)?;
        let mut found = Vec::new();
        collect_definitions(&nodes, &mut found);

        let mut count = 0;
        for block in found {
            let Some(name) = block.attr("name").filter(|n| !n.trim().is_empty()) else {
                warn!("x-component without a name ignored");
                continue;
            };
            let markup = block
                .children()
                .iter()
                .filter(|child| child.tag() != Some("x-script"))
                .cloned()
                .collect();
            let mut def = ComponentDef::new(name.trim(), markup);
            if let Some(attrs) = block.attr("attrs") {
                def.attrs = parse_attr_modes(attrs);
            }
            if let Some(alias) = block.attr("scopename").filter(|a| !a.is_empty()) {
                def.alias = alias.to_owned();
            }
            self.register(def);
            count += 1;
        }
        Ok(count)
    }
}

fn collect_definitions<'a>(nodes: &'a [SourceNode], found: &mut Vec<&'a SourceNode>) {
    for node in nodes {
        if node.tag() == Some("x-component") {
            found.push(node);
        } else {
            collect_definitions(node.children(), found);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn attr_modes() {
        let modes = parse_attr_modes("label by value, item by ref, junk, x by copy");
        assert_eq!(
            modes.into_iter().collect::<Vec<_>>(),
            vec![
                ("label".to_owned(), PassMode::Value),
                ("item".to_owned(), PassMode::Ref)
            ]
        );
    }

    #[test]
    fn names_are_case_insensitive() {
        let mut registry = ComponentRegistry::new();
        registry.register(ComponentDef::new("User-Card", Vec::new()));
        assert!(registry.contains("user-card"));
        assert_eq!(registry.get("USER-CARD").unwrap().name, "User-Card");
        assert!(registry.get("other").is_none());
    }

    #[test]
    fn builder_attached_after_registration() {
        let mut registry = ComponentRegistry::new();
        registry.register(ComponentDef::new("my-box", Vec::new()));
        assert!(registry.set_builder("my-box", |cx: ComponentContext| cx.attrs));
        assert!(!registry.set_builder("nope", |cx: ComponentContext| cx.attrs));
        assert!(registry.get("my-box").unwrap().builder.is_some());
    }

    #[test]
    fn loads_definitions_from_markup() {
        let mut registry = ComponentRegistry::new();
        let count = registry
            .load_definitions(
                r#"<div><x-component name="user-card" attrs="who by ref, title by value" scopename="card"><b>{{ card.title }}</b><x-script>function(){}</x-script></x-component></div><x-component><i></i></x-component><x-component name="plain"><p></p></x-component>"#,
            )
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(registry.names(), vec!["user-card", "plain"]);

        let card = registry.get("user-card").unwrap();
        assert_eq!(card.alias, "card");
        assert_eq!(card.attrs.get("who"), Some(&PassMode::Ref));
        assert_eq!(card.markup.len(), 1);
        assert_eq!(card.markup[0].tag(), Some("b"));
        assert_eq!(registry.get("plain").unwrap().alias, "vm");
    }
}
