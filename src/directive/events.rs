//! `@event="handler"`: run an expression when an event reaches the node.
//!
//! `@enter`, `@tab` and `@escape` listen for `keydown` with that key. When
//! the node also has a `:bind`, the handler runs between a view-to-model and
//! a model-to-view sync. The follow-up render is skipped when an earlier
//! listener has already prevented the event's default.

use std::any::Any;
use std::rc::Rc;

use super::bind::{write_model, write_view};
use super::{param_ref, ApplyCx, Directive, Flow};
use crate::app::Engine;
use crate::dom::SourceNode;
use crate::event::{Event, Key};
use crate::expr::Expression;
use crate::scope::Scope;
use crate::template::{CompileError, RenderError, TemplateId};
use crate::value::Value;

/// Compiled handlers by event name, in source order.
#[derive(Debug)]
pub struct EventsParam {
    pub handlers: Vec<(String, Expression)>,
}

fn event_name(attr: &str) -> Option<&str> {
    attr.strip_prefix('@').filter(|name| !name.is_empty())
}

fn on_event(
    template: TemplateId,
    name: String,
    handler: Expression,
) -> impl Fn(&mut Engine, &mut Event) -> Result<(), RenderError> {
    let key = Key::for_pseudo_event(&name);
    move |engine, event| {
        if key.is_some() && event.key != key {
            return Ok(());
        }
        let Some(tpl) = engine.templates.get(template) else {
            return Ok(());
        };
        let (app, node, scope) = (Rc::clone(&tpl.app), tpl.node, Rc::clone(&tpl.scope));
        engine.set_delay_for(&app, node, &name);

        let bind = engine.node_state(node).and_then(|s| s.bind.clone());
        if let Some(bind) = &bind {
            write_model(engine, &scope, node, bind)?;
        }
        scope.bind_locals([("$el", Value::Node(node))]);
        handler.eval_in(&scope, &mut engine.document)?;
        if let Some(bind) = &bind {
            write_view(engine, &scope, node, bind)?;
        }

        if !event.is_default_prevented() {
            engine.schedule(&app);
        }
        Ok(())
    }
}

pub struct EventHandlers;

impl Directive for EventHandlers {
    fn name(&self) -> &'static str {
        "@events"
    }

    fn applies_to(&self, node: &SourceNode) -> bool {
        node.attributes().any(|(name, _)| event_name(name).is_some())
    }

    fn compile(
        &self,
        _engine: &Engine,
        scope: &Rc<Scope>,
        node: &SourceNode,
    ) -> Result<Rc<dyn Any>, CompileError> {
        let handlers = node
            .attributes()
            .filter_map(|(attr, text)| Some((event_name(attr)?, text)))
            .map(|(name, text)| {
                Expression::compile(text, scope, &["$el"])
                    .map(|expr| (name.to_owned(), expr))
                    .map_err(|e| CompileError::syntax(text, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Rc::new(EventsParam { handlers }))
    }

    fn apply(
        &self,
        engine: &mut Engine,
        cx: ApplyCx<'_>,
        param: &Rc<dyn Any>,
    ) -> Result<Flow, RenderError> {
        let events = param_ref::<EventsParam>(param, "@events")?;
        let Some(state) = engine.state_mut(cx.node) else {
            return Ok(Flow::Continue);
        };
        if state.events_wired {
            return Ok(Flow::Continue);
        }
        state.events_wired = true;
        for (name, handler) in &events.handlers {
            let kind = match Key::for_pseudo_event(name) {
                Some(_) => "keydown",
                None => name.as_str(),
            };
            engine.on(cx.node, kind, on_event(cx.template, name.clone(), handler.clone()));
        }
        Ok(Flow::Continue)
    }
}
