//! `<my-widget>` or `:component="name"`: expand a registered component.
//!
//! On first apply the node's content is replaced by the component markup,
//! which is then compiled under a scope bound to the component's object
//! (the builder's result, or the evaluated attribute bag). The node is then
//! marked `rendered` and later passes just walk the expanded content.

use std::any::Any;
use std::rc::Rc;

use tracing::debug;

use super::{param_ref, ApplyCx, Directive, Flow};
use crate::app::Engine;
use crate::component::{ComponentContext, ComponentDef, PassMode};
use crate::dom::SourceNode;
use crate::expr::Expression;
use crate::scope::Scope;
use crate::template::{CompileError, RenderError};
use crate::value::Value;

/// Where one declared attribute's value comes from.
#[derive(Debug)]
pub enum AttrSource {
    Ref(Expression),
    Value(String),
    /// Declared but absent on the element.
    Missing,
}

#[derive(Debug)]
pub struct ComponentParam {
    pub name: String,
    pub def: Rc<ComponentDef>,
    pub attrs: Vec<(String, AttrSource)>,
}

fn component_name(node: &SourceNode) -> Option<&str> {
    node.attr(":component").or_else(|| node.tag())
}

pub struct ComponentExpand;

impl Directive for ComponentExpand {
    fn name(&self) -> &'static str {
        ":component"
    }

    fn applies_to(&self, node: &SourceNode) -> bool {
        node.has_attr(":component") || node.tag().is_some_and(|t| t.find('-').is_some_and(|i| i > 0))
    }

    fn compile(
        &self,
        engine: &Engine,
        scope: &Rc<Scope>,
        node: &SourceNode,
    ) -> Result<Rc<dyn Any>, CompileError> {
        let name = component_name(node).unwrap_or_default();
        let def = engine
            .components
            .get(name)
            .ok_or_else(|| CompileError::UnknownComponent(name.to_owned()))?;

        let mut attrs = Vec::with_capacity(def.attrs.len());
        for (attr, mode) in &def.attrs {
            let source = match (node.attr(attr), mode) {
                (None, _) => AttrSource::Missing,
                (Some(text), PassMode::Value) => AttrSource::Value(text.to_owned()),
                (Some(text), PassMode::Ref) => Expression::compile(text, scope, &[])
                    .map(AttrSource::Ref)
                    .map_err(|e| CompileError::syntax(text, e))?,
            };
            attrs.push((attr.clone(), source));
        }
        Ok(Rc::new(ComponentParam {
            name: name.to_owned(),
            def,
            attrs,
        }))
    }

    fn apply(
        &self,
        engine: &mut Engine,
        cx: ApplyCx<'_>,
        param: &Rc<dyn Any>,
    ) -> Result<Flow, RenderError> {
        let component = param_ref::<ComponentParam>(param, ":component")?;
        let rendered = engine.node_state(cx.node).is_some_and(|s| s.rendered);
        if rendered || !engine.document.is_element(cx.node) {
            return Ok(Flow::Continue);
        }
        // A builder attached after compilation still applies.
        let def = engine
            .components
            .get(&component.name)
            .unwrap_or_else(|| Rc::clone(&component.def));

        let tpl = engine
            .templates
            .get_mut(cx.template)
            .ok_or(RenderError::StaleTemplate)?;
        let app = Rc::clone(&tpl.app);
        for child in std::mem::take(&mut tpl.children) {
            engine.templates.remove_subtree(child);
        }
        let removed = engine.document.clear_children(cx.node);
        engine.purge(&removed);
        for node in &def.markup {
            engine.document.instantiate(Some(cx.node), node);
        }

        let mut bag = Vec::with_capacity(component.attrs.len());
        for (name, source) in &component.attrs {
            let value = match source {
                AttrSource::Ref(expr) => expr.eval_in(&cx.scope, &mut engine.document)?,
                AttrSource::Value(text) => Value::from(text.as_str()),
                AttrSource::Missing => Value::Null,
            };
            bag.push((name.clone(), value));
        }
        let attrs = Value::object_from(bag);
        let hook = engine
            .hook(&app)
            .ok_or_else(|| RenderError::UnknownApp(app.to_string()))?;
        let object = match &def.builder {
            Some(builder) => builder.build(ComponentContext {
                node: cx.node,
                attrs,
                hook,
            }),
            None => attrs,
        };

        let inner = cx.scope.child(object, def.alias.as_str());
        engine.compile_into(cx.template, &inner)?;
        if let Some(tpl) = engine.templates.get_mut(cx.template) {
            tpl.inner_scope = Some(inner);
        }
        if let Some(data) = engine.document.get_mut(cx.node) {
            data.set_attr("rendered", "true");
        }
        if let Some(state) = engine.state_mut(cx.node) {
            state.rendered = true;
        }
        engine.lifecycle.on_expanded(cx.node, &def.name);
        debug!(component = %def.name, "component expanded");
        Ok(Flow::Continue)
    }

    fn defers_children(&self) -> bool {
        true
    }
}
