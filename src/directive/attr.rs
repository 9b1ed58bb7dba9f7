//! `:attr-name="expr"`: mirror expression results into attributes.
//!
//! A nullish result removes the attribute, so
//! `:attr-disabled="busy ? true : null"` toggles it.

use std::any::Any;
use std::rc::Rc;

use super::{param_ref, ApplyCx, Directive, Flow};
use crate::app::Engine;
use crate::dom::SourceNode;
use crate::expr::Expression;
use crate::scope::Scope;
use crate::template::{CompileError, RenderError};

const PREFIX: &str = ":attr-";

/// Target attribute name to its compiled expression, in source order.
#[derive(Debug)]
pub struct AttrParam {
    pub bindings: Vec<(String, Expression)>,
}

pub struct AttrBinding;

impl Directive for AttrBinding {
    fn name(&self) -> &'static str {
        ":attr-*"
    }

    fn applies_to(&self, node: &SourceNode) -> bool {
        node.attributes()
            .any(|(name, _)| name.len() > PREFIX.len() && name.starts_with(PREFIX))
    }

    fn compile(
        &self,
        _engine: &Engine,
        scope: &Rc<Scope>,
        node: &SourceNode,
    ) -> Result<Rc<dyn Any>, CompileError> {
        let bindings = node
            .attributes()
            .filter_map(|(name, text)| Some((name.strip_prefix(PREFIX)?, text)))
            .filter(|(target, _)| !target.is_empty())
            .map(|(target, text)| {
                Expression::compile(text, scope, &[])
                    .map(|expr| (target.to_owned(), expr))
                    .map_err(|e| CompileError::syntax(text, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Rc::new(AttrParam { bindings }))
    }

    fn apply(
        &self,
        engine: &mut Engine,
        cx: ApplyCx<'_>,
        param: &Rc<dyn Any>,
    ) -> Result<Flow, RenderError> {
        let attrs = param_ref::<AttrParam>(param, ":attr-*")?;
        if !engine.document.is_element(cx.node) {
            return Ok(Flow::Continue);
        }
        let locals = cx.scope.resolve_locals();
        let mut results = Vec::with_capacity(attrs.bindings.len());
        for (name, expr) in &attrs.bindings {
            results.push((name, expr.eval(&locals, &mut engine.document)?));
        }
        let Some(data) = engine.document.get_mut(cx.node) else {
            return Ok(Flow::Continue);
        };
        for (name, value) in results {
            if value.is_nullish() {
                data.remove_attr(name);
            } else {
                data.set_attr(name.as_str(), value.to_string());
            }
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use crate::app::{AppConfig, Engine};
    use crate::value::Value;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn sets_and_removes_attributes() {
        let model = Value::from(json!({"src": "a.png", "busy": true}));
        let mut engine = Engine::from_markup(
            r#"<div x-app="main"><img id="i" :attr-src="src" :attr-disabled="busy ? true : null"></div>"#,
            AppConfig::default(),
        )
        .unwrap();
        engine.setup("main", model.clone()).unwrap();
        engine.render_now("main").unwrap();
        let img = engine.document().query_by_id("i").unwrap();
        let data = engine.document().get(img).unwrap();
        assert_eq!(data.attr("src"), Some("a.png"));
        assert_eq!(data.attr("disabled"), Some("true"));

        model.set("busy", Value::from(false));
        model.set("src", Value::from(3));
        engine.render_now("main").unwrap();
        let data = engine.document().get(img).unwrap();
        assert_eq!(data.attr("src"), Some("3"));
        assert!(!data.has_attr("disabled"));
    }

    #[test]
    fn value_attribute_updates_value_property() {
        let model = Value::from(json!({"v": "x"}));
        let mut engine = Engine::from_markup(
            r#"<div x-app="main"><input id="i" :attr-value="v"></div>"#,
            AppConfig::default(),
        )
        .unwrap();
        engine.setup("main", model).unwrap();
        engine.render_now("main").unwrap();
        let input = engine.document().query_by_id("i").unwrap();
        assert_eq!(engine.document().get(input).unwrap().value, "x");
    }
}
