//! `:bind="target [on (events)]"`: two-way binding between a model location
//! and a node's value.
//!
//! Every render writes the model into the node. Each listed event (`change`
//! is always included) writes the node's value back and schedules a render.

use std::any::Any;
use std::rc::Rc;

use super::{has_attr, param_rc, ApplyCx, Directive, Flow};
use crate::app::Engine;
use crate::dom::{NodeId, SourceNode};
use crate::event::Event;
use crate::expr::Expression;
use crate::scope::Scope;
use crate::template::{CompileError, RenderError, TemplateId};
use crate::value::Value;

/// A compiled binding: the assignable target and the events writing it.
#[derive(Debug)]
pub struct BindParam {
    pub target: Expression,
    pub events: Vec<String>,
}

/// Split `expr on (a, b)` into the target text and its event list.
fn parse_binding(text: &str) -> (&str, Vec<String>) {
    let mut events = vec!["change".to_owned()];
    let listed = text.trim_end().strip_suffix(')').and_then(|body| {
        let open = body.rfind('(')?;
        let head = body[..open].trim_end().strip_suffix("on")?;
        if !head.ends_with(char::is_whitespace) || head.trim().is_empty() {
            return None;
        }
        Some((head.trim(), &body[open + 1..]))
    });
    let Some((target, list)) = listed else {
        return (text.trim(), events);
    };
    for event in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        if !events.iter().any(|e| e == event) {
            events.push(event.to_owned());
        }
    }
    (target, events)
}

/// Copy the node's value into the bound model location.
pub(crate) fn write_model(
    engine: &mut Engine,
    scope: &Scope,
    node: NodeId,
    bind: &BindParam,
) -> Result<(), RenderError> {
    let value = engine
        .document
        .get(node)
        .map(|d| Value::from(d.value.as_str()))
        .unwrap_or_default();
    scope.bind_locals([("$el", Value::Node(node))]);
    let locals = scope.resolve_locals();
    bind.target.assign(&locals, &mut engine.document, value)?;
    Ok(())
}

/// Copy the bound model value into the node. Nullish becomes empty.
pub(crate) fn write_view(
    engine: &mut Engine,
    scope: &Scope,
    node: NodeId,
    bind: &BindParam,
) -> Result<(), RenderError> {
    scope.bind_locals([("$el", Value::Node(node))]);
    let value = bind.target.eval_in(scope, &mut engine.document)?;
    let text = if value.is_nullish() {
        String::new()
    } else {
        value.to_string()
    };
    if let Some(data) = engine.document.get_mut(node) {
        data.value = text;
    }
    Ok(())
}

/// Listener for one bound event: write the model, then schedule.
fn on_bound_event(
    template: TemplateId,
    kind: String,
) -> impl Fn(&mut Engine, &mut Event) -> Result<(), RenderError> {
    move |engine, _event| {
        let Some(tpl) = engine.templates.get(template) else {
            return Ok(());
        };
        let (app, node, scope) = (Rc::clone(&tpl.app), tpl.node, Rc::clone(&tpl.scope));
        let Some(bind) = engine.node_state(node).and_then(|s| s.bind.clone()) else {
            return Ok(());
        };
        engine.set_delay_for(&app, node, &kind);
        write_model(engine, &scope, node, &bind)?;
        engine.schedule(&app);
        Ok(())
    }
}

pub struct TwoWayBind;

impl Directive for TwoWayBind {
    fn name(&self) -> &'static str {
        ":bind"
    }

    fn applies_to(&self, node: &SourceNode) -> bool {
        has_attr(node, ":bind")
    }

    fn compile(
        &self,
        _engine: &Engine,
        scope: &Rc<Scope>,
        node: &SourceNode,
    ) -> Result<Rc<dyn Any>, CompileError> {
        let text = node.attr(":bind").unwrap_or_default();
        let (target, events) = parse_binding(text);
        let target =
            Expression::compile(target, scope, &["$el"]).map_err(|e| CompileError::syntax(text, e))?;
        if !target.is_assignable() {
            return Err(CompileError::NotAssignable(target.source().to_owned()));
        }
        Ok(Rc::new(BindParam { target, events }))
    }

    fn apply(
        &self,
        engine: &mut Engine,
        cx: ApplyCx<'_>,
        param: &Rc<dyn Any>,
    ) -> Result<Flow, RenderError> {
        let bind = param_rc::<BindParam>(param, ":bind")?;
        write_view(engine, &cx.scope, cx.node, &bind)?;

        let Some(state) = engine.state_mut(cx.node) else {
            return Ok(Flow::Continue);
        };
        state.bind = Some(Rc::clone(&bind));
        if state.bind_wired {
            return Ok(Flow::Continue);
        }
        state.bind_wired = true;
        for kind in &bind.events {
            engine.on(cx.node, kind.as_str(), on_bound_event(cx.template, kind.clone()));
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppConfig;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn setup(markup: &str, model: &Value) -> (Engine, NodeId) {
        let mut engine = Engine::from_markup(markup, AppConfig::default()).unwrap();
        engine.setup("main", model.clone()).unwrap();
        engine.render_now("main").unwrap();
        let input = engine.document().query_by_id("i").unwrap();
        (engine, input)
    }

    #[test]
    fn parses_event_lists() {
        assert_eq!(parse_binding("name"), ("name", vec!["change".to_owned()]));
        assert_eq!(
            parse_binding("user.name on (input, change, keyup)"),
            ("user.name", vec!["change".to_owned(), "input".into(), "keyup".into()])
        );
        assert_eq!(parse_binding("f(on)"), ("f(on)", vec!["change".to_owned()]));
    }

    #[test]
    fn rejects_unassignable_targets() {
        let engine = Engine::from_markup("<p></p>", AppConfig::default()).unwrap();
        let scope = Scope::root(Value::object(), "app", Default::default());
        let node = SourceNode::element("input").with_attr(":bind", "a + 1");
        let err = TwoWayBind.compile(&engine, &scope, &node).unwrap_err();
        assert_eq!(err, CompileError::NotAssignable("a + 1".into()));
    }

    #[test]
    fn model_flows_into_view() {
        let model = Value::from(json!({"name": "ada", "none": null}));
        let (mut engine, input) = setup(
            r#"<div x-app="main"><input id="i" :bind="name"><input id="j" :bind="none"></div>"#,
            &model,
        );
        assert_eq!(engine.document().get(input).unwrap().value, "ada");
        let other = engine.document().query_by_id("j").unwrap();
        assert_eq!(engine.document().get(other).unwrap().value, "");

        model.set("name", Value::from("bo"));
        engine.render_now("main").unwrap();
        assert_eq!(engine.document().get(input).unwrap().value, "bo");
    }

    #[test]
    fn view_flows_into_model_and_schedules() {
        let model = Value::from(json!({"user": {"name": "ada"}}));
        let (mut engine, input) = setup(
            r#"<div x-app="main"><input id="i" :bind="user.name on (input)"></div>"#,
            &model,
        );
        assert_eq!(engine.listener_count(input), 2);
        assert!(!engine.app("main").unwrap().scheduler().is_pending());

        engine.document_mut().get_mut(input).unwrap().value = "bo".into();
        engine.dispatch(input, Event::new("input")).unwrap();
        assert_eq!(model.get("user").get("name"), Value::from("bo"));
        assert!(engine.app("main").unwrap().scheduler().is_pending());
    }

    #[test]
    fn listeners_wired_once() {
        let model = Value::from(json!({"name": "ada"}));
        let (mut engine, input) = setup(
            r#"<div x-app="main"><input id="i" :bind="name"></div>"#,
            &model,
        );
        engine.render_now("main").unwrap();
        engine.render_now("main").unwrap();
        assert_eq!(engine.listener_count(input), 1);
    }
}
