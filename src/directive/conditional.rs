//! `:if="guard"`: swap the node for a placeholder while the guard is false.
//!
//! The real node keeps its subtree, template state and listeners while it is
//! held by the placeholder, so restoring it is an identity-preserving swap.

use std::any::Any;
use std::rc::Rc;

use tracing::debug;

use super::{has_attr, param_ref, ApplyCx, Directive, Flow};
use crate::app::Engine;
use crate::dom::SourceNode;
use crate::expr::Expression;
use crate::scope::Scope;
use crate::template::{CompileError, RenderError};
use crate::value::Value;

pub struct Conditional;

impl Directive for Conditional {
    fn name(&self) -> &'static str {
        ":if"
    }

    fn applies_to(&self, node: &SourceNode) -> bool {
        has_attr(node, ":if")
    }

    fn compile(
        &self,
        _engine: &Engine,
        scope: &Rc<Scope>,
        node: &SourceNode,
    ) -> Result<Rc<dyn Any>, CompileError> {
        let text = node.attr(":if").unwrap_or_default();
        let guard =
            Expression::compile(text, scope, &["$el"]).map_err(|e| CompileError::syntax(text, e))?;
        Ok(Rc::new(guard))
    }

    fn apply(
        &self,
        engine: &mut Engine,
        cx: ApplyCx<'_>,
        param: &Rc<dyn Any>,
    ) -> Result<Flow, RenderError> {
        let guard = param_ref::<Expression>(param, ":if")?;
        let tpl = engine
            .templates
            .get(cx.template)
            .ok_or(RenderError::StaleTemplate)?;
        // On a repetition master each clone evaluates the guard itself.
        if tpl.has_directive(":each") && !cx.excludes.contains(&":each") {
            return Ok(Flow::Continue);
        }
        let hidden = tpl.hidden;

        cx.scope.bind_locals([("$el", Value::Node(cx.node))]);
        let visible = guard.eval_in(&cx.scope, &mut engine.document)?.is_truthy();

        match (visible, hidden) {
            (true, None) => Ok(Flow::Continue),
            (true, Some(placeholder)) => {
                engine.document.restore(placeholder);
                if let Some(tpl) = engine.templates.get_mut(cx.template) {
                    tpl.hidden = None;
                }
                engine.lifecycle.on_restored(cx.node);
                debug!(guard = guard.source(), "node restored");
                let excludes = cx.excluding(":if");
                engine.apply_node(cx.template, &excludes)?;
                Ok(Flow::Stop)
            }
            (false, None) => {
                let placeholder = engine
                    .document
                    .placehold(cx.node, format!("if: {}", guard.source()));
                if let Some(tpl) = engine.templates.get_mut(cx.template) {
                    tpl.hidden = Some(placeholder);
                }
                engine.lifecycle.on_hidden(cx.node);
                debug!(guard = guard.source(), "node hidden");
                engine.finish_node(cx.template)?;
                Ok(Flow::Stop)
            }
            (false, Some(_)) => {
                engine.finish_node(cx.template)?;
                Ok(Flow::Stop)
            }
        }
    }

    fn runs_on_placeholder(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::app::{AppConfig, Engine};
    use crate::event::LifecycleEvent;
    use crate::value::Value;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn engine(model: serde_json::Value) -> (Engine, Value) {
        let mut engine = Engine::from_markup(
            r#"<div x-app="main"><p id="p" :if="count > 0">{{ count }}</p></div>"#,
            AppConfig::default(),
        )
        .unwrap();
        let model = Value::from(model);
        engine.setup("main", model.clone()).unwrap();
        (engine, model)
    }

    fn inner(engine: &Engine) -> String {
        let element = engine.app("main").unwrap().element();
        engine
            .document()
            .children(element)
            .iter()
            .map(|&c| engine.document().to_markup(c))
            .collect()
    }

    #[test]
    fn false_guard_renders_placeholder() {
        let (mut engine, _) = engine(json!({"count": 0}));
        engine.render_now("main").unwrap();
        assert_eq!(inner(&engine), "<!--if: count > 0-->");
    }

    #[test]
    fn toggle_restores_same_node() {
        let (mut engine, model) = engine(json!({"count": 1}));
        let p = engine.document().query_by_id("p").unwrap();
        engine.render_now("main").unwrap();
        assert_eq!(inner(&engine), r#"<p id="p" :if="count > 0">1</p>"#);

        model.set("count", Value::from(0));
        engine.render_now("main").unwrap();
        assert!(!engine.document().is_attached(p));

        model.set("count", Value::from(2));
        engine.render_now("main").unwrap();
        assert!(engine.document().is_attached(p));
        assert_eq!(inner(&engine), r#"<p id="p" :if="count > 0">2</p>"#);

        let swaps = engine
            .drain_lifecycle()
            .into_iter()
            .filter(|e| {
                matches!(
                    e,
                    LifecycleEvent::Hidden { .. } | LifecycleEvent::Restored { .. }
                )
            })
            .collect::<Vec<_>>();
        assert_eq!(
            swaps,
            vec![
                LifecycleEvent::Hidden { node_id: p },
                LifecycleEvent::Restored { node_id: p }
            ]
        );
    }

    #[test]
    fn hidden_node_still_gets_init() {
        let (mut engine, model) = engine(json!({"count": 0}));
        let p = engine.document().query_by_id("p").unwrap();
        let inits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&inits);
        engine.on(p, "init", move |_, _| {
            *counter.borrow_mut() += 1;
            Ok(())
        });

        engine.render_now("main").unwrap();
        assert!(!engine.document().is_attached(p));
        assert_eq!(*inits.borrow(), 1);

        model.set("count", Value::from(1));
        engine.render_now("main").unwrap();
        assert!(engine.document().is_attached(p));
        assert_eq!(*inits.borrow(), 1);
    }

    #[test]
    fn el_is_bound_during_guard() {
        let mut engine = Engine::from_markup(
            r#"<div x-app="main"><p id="p" :if="$el.tagName == 'P'">x</p></div>"#,
            AppConfig::default(),
        )
        .unwrap();
        engine.setup("main", Value::object()).unwrap();
        engine.render_now("main").unwrap();
        let p = engine.document().query_by_id("p").unwrap();
        assert!(engine.document().is_attached(p));
    }
}
