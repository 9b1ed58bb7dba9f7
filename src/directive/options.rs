//! `<select :options="v displayed as d in list">`: rebuild `option` children
//! on every render, keeping the current selection.

use std::any::Any;
use std::rc::Rc;

use super::{has_attr, param_ref, split_clause, ApplyCx, Directive, Flow};
use crate::app::Engine;
use crate::dom::SourceNode;
use crate::expr::Expression;
use crate::scope::Scope;
use crate::template::{CompileError, RenderError};
use crate::value::Value;

/// Compiled `value displayed as display in collection` clause.
#[derive(Debug)]
pub struct OptionsParam {
    pub value_key: String,
    pub display_key: String,
    pub collection: Expression,
}

/// Split the clause into value key, display key and collection text.
fn parse_clause(text: &str) -> Option<(&str, &str, &str)> {
    let (value_key, rest) = split_clause(text, "displayed")?;
    let rest = rest.strip_prefix("as")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let (display_key, collection) = split_clause(rest, "in")?;
    (!collection.is_empty()).then_some((value_key, display_key, collection))
}

/// `this` selects the item itself, anything else one of its properties.
fn pick(item: &Value, key: &str) -> Value {
    if key == "this" {
        item.clone()
    } else {
        item.get(key)
    }
}

pub struct SelectOptions;

impl Directive for SelectOptions {
    fn name(&self) -> &'static str {
        ":options"
    }

    fn applies_to(&self, node: &SourceNode) -> bool {
        has_attr(node, ":options") && node.tag() == Some("select")
    }

    fn compile(
        &self,
        _engine: &Engine,
        scope: &Rc<Scope>,
        node: &SourceNode,
    ) -> Result<Rc<dyn Any>, CompileError> {
        let text = node.attr(":options").unwrap_or_default();
        let (value_key, display_key, collection) =
            parse_clause(text).ok_or_else(|| CompileError::Malformed {
                text: text.to_owned(),
                reason: "expected `value displayed as display in collection`",
            })?;
        let collection =
            Expression::compile(collection, scope, &[]).map_err(|e| CompileError::syntax(text, e))?;
        Ok(Rc::new(OptionsParam {
            value_key: value_key.to_owned(),
            display_key: display_key.to_owned(),
            collection,
        }))
    }

    fn apply(
        &self,
        engine: &mut Engine,
        cx: ApplyCx<'_>,
        param: &Rc<dyn Any>,
    ) -> Result<Flow, RenderError> {
        let options = param_ref::<OptionsParam>(param, ":options")?;
        let collection = options.collection.eval_in(&cx.scope, &mut engine.document)?;
        let Some(current) = engine.document.get(cx.node).map(|d| d.value.clone()) else {
            return Ok(Flow::Continue);
        };

        let tpl = engine
            .templates
            .get_mut(cx.template)
            .ok_or(RenderError::StaleTemplate)?;
        for child in std::mem::take(&mut tpl.children) {
            engine.templates.remove_subtree(child);
        }
        let removed = engine.document.clear_children(cx.node);
        engine.purge(&removed);

        for (_, item) in collection.entries() {
            let option = SourceNode::element("option")
                .with_attr("value", pick(&item, &options.value_key).to_string())
                .with_child(SourceNode::text(pick(&item, &options.display_key).to_string()));
            engine.document.instantiate(Some(cx.node), &option);
        }
        if let Some(data) = engine.document.get_mut(cx.node) {
            data.value = current;
        }
        Ok(Flow::Continue)
    }
}
