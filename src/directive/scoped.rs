//! `:scope="expr [as alias]"`: bind a nested object for the node's content.

use std::any::Any;
use std::rc::Rc;

use super::{has_attr, param_ref, split_clause, ApplyCx, Directive, Flow};
use crate::app::Engine;
use crate::dom::SourceNode;
use crate::expr::Expression;
use crate::scope::Scope;
use crate::template::{CompileError, RenderError};

#[derive(Debug)]
pub struct ScopedParam {
    pub object: Expression,
    pub alias: String,
}

pub struct Scoped;

impl Directive for Scoped {
    fn name(&self) -> &'static str {
        ":scope"
    }

    fn applies_to(&self, node: &SourceNode) -> bool {
        has_attr(node, ":scope")
    }

    fn compile(
        &self,
        _engine: &Engine,
        scope: &Rc<Scope>,
        node: &SourceNode,
    ) -> Result<Rc<dyn Any>, CompileError> {
        let text = node.attr(":scope").unwrap_or_default();
        let (expr, alias) = split_clause(text, "as").unwrap_or((text.trim(), text.trim()));
        let object =
            Expression::compile(expr, scope, &[]).map_err(|e| CompileError::syntax(text, e))?;
        Ok(Rc::new(ScopedParam {
            object,
            alias: alias.to_owned(),
        }))
    }

    fn apply(
        &self,
        engine: &mut Engine,
        cx: ApplyCx<'_>,
        param: &Rc<dyn Any>,
    ) -> Result<Flow, RenderError> {
        let scoped = param_ref::<ScopedParam>(param, ":scope")?;
        let object = scoped.object.eval_in(&cx.scope, &mut engine.document)?;
        if object.is_nullish() {
            return Ok(Flow::Continue);
        }
        let inner = cx.scope.child(object, scoped.alias.as_str());

        let tpl = engine
            .templates
            .get_mut(cx.template)
            .ok_or(RenderError::StaleTemplate)?;
        tpl.inner_scope = Some(Rc::clone(&inner));
        if !tpl.compiled_once {
            engine.recompile_children(cx.template, &inner)?;
        }
        Ok(Flow::Continue)
    }

    fn defers_children(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::app::{AppConfig, Engine};
    use crate::value::Value;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn render(markup: &str, model: &Value) -> Engine {
        let mut engine = Engine::from_markup(markup, AppConfig::default()).unwrap();
        engine.setup("main", model.clone()).unwrap();
        engine.render_now("main").unwrap();
        engine
    }

    #[test]
    fn properties_and_alias_resolve() {
        let model = Value::from(json!({"user": {"name": "ada", "age": 36}, "title": "t"}));
        let engine = render(
            r#"<div x-app="main"><p id="p" :scope="user as u">{{ name }}/{{ u.age }}/{{ app.title }}</p></div>"#,
            &model,
        );
        let p = engine.document().query_by_id("p").unwrap();
        assert_eq!(engine.document().text_content(p), "ada/36/t");
    }

    #[test]
    fn alias_defaults_to_expression_text() {
        let model = Value::from(json!({"user": {"name": "ada"}}));
        let engine = render(
            r#"<div x-app="main"><p id="p" :scope="user">{{ user.name }}</p></div>"#,
            &model,
        );
        let p = engine.document().query_by_id("p").unwrap();
        assert_eq!(engine.document().text_content(p), "ada");
    }

    #[test]
    fn nullish_object_leaves_content_uncompiled() {
        let model = Value::from(json!({"user": null}));
        let mut engine = render(
            r#"<div x-app="main"><p id="p" :scope="user">{{ name }}</p></div>"#,
            &model,
        );
        let p = engine.document().query_by_id("p").unwrap();
        assert_eq!(engine.document().text_content(p), "{{ name }}");

        model.set("user", Value::from(json!({"name": "bo"})));
        engine.render_now("main").unwrap();
        assert_eq!(engine.document().text_content(p), "bo");
    }

    #[test]
    fn compiled_once_then_reused() {
        let model = Value::from(json!({"user": {"name": "ada"}}));
        let mut engine = render(
            r#"<div x-app="main"><p id="p" :scope="user"><b>{{ name }}</b></p></div>"#,
            &model,
        );
        let p = engine.document().query_by_id("p").unwrap();
        let b = engine.document().children(p)[0];

        model.get("user").set("name", Value::from("bo"));
        engine.render_now("main").unwrap();
        assert_eq!(engine.document().children(p)[0], b);
        assert_eq!(engine.document().text_content(p), "bo");
    }
}
