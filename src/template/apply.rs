//! Apply phase: run compiled directives top-down, once per node per pass.

use std::rc::Rc;

use tracing::trace;

use super::{RenderError, TemplateId};
use crate::app::Engine;
use crate::directive::{ApplyCx, Flow};
use crate::event::Event;

impl Engine {
    /// Apply `id`'s directives in registry order, skipping `excludes`, then
    /// its children that have not been applied this pass.
    ///
    /// A directive returning [`Flow::Stop`] has taken over the node; nothing
    /// else runs for it here.
    pub(crate) fn apply_node(
        &mut self,
        id: TemplateId,
        excludes: &[&'static str],
    ) -> Result<(), RenderError> {
        let tpl = self.templates.get(id).ok_or(RenderError::StaleTemplate)?;
        let directives = Rc::clone(&tpl.directives);
        let node = tpl.node;
        let scope = Rc::clone(&tpl.scope);
        let registry = Rc::clone(&self.directives);

        for entry in directives.iter() {
            if excludes.contains(&entry.name) {
                continue;
            }
            let (Some(param), Some(directive)) = (&entry.param, registry.get(entry.name)) else {
                continue;
            };
            let hidden = self.templates.get(id).is_some_and(|t| t.hidden.is_some());
            if hidden && !directive.runs_on_placeholder() {
                continue;
            }
            trace!(directive = entry.name, "apply");
            let cx = ApplyCx {
                template: id,
                node,
                scope: Rc::clone(&scope),
                excludes,
            };
            if directive.apply(self, cx, param)? == Flow::Stop {
                return Ok(());
            }
        }

        self.apply_children(id)?;
        self.finish_node(id)
    }

    /// Apply the children of an attached element that are behind the
    /// current pass, under the template's child scope.
    pub(crate) fn apply_children(&mut self, id: TemplateId) -> Result<(), RenderError> {
        let tpl = self.templates.get(id).ok_or(RenderError::StaleTemplate)?;
        let node = tpl.node;
        if !(self.document.is_attached(node) && self.document.is_element(node)) {
            return Ok(());
        }
        let children = tpl.children.clone();
        let child_scope = tpl.child_scope();
        let pass = self.current_pass(&tpl.app);

        for child in children {
            let Some(child_tpl) = self.templates.get_mut(child) else {
                continue;
            };
            child_tpl.scope = Rc::clone(&child_scope);
            if child_tpl.last_pass < pass {
                self.apply_node(child, &[])?;
            }
        }
        Ok(())
    }

    /// Signal `init` on the node's first application and stamp the pass.
    pub(crate) fn finish_node(&mut self, id: TemplateId) -> Result<(), RenderError> {
        let tpl = self.templates.get(id).ok_or(RenderError::StaleTemplate)?;
        let node = tpl.node;
        if self.lifecycle.on_init(node) {
            self.dispatch(node, Event::new("init"))?;
        }
        self.mark_applied(id);
        Ok(())
    }

    /// Record the app's current pass on the template.
    pub(crate) fn mark_applied(&mut self, id: TemplateId) {
        let Some(app) = self.templates.get(id).map(|t| Rc::clone(&t.app)) else {
            return;
        };
        let pass = self.current_pass(&app);
        if let Some(tpl) = self.templates.get_mut(id) {
            tpl.last_pass = pass;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppConfig;
    use crate::event::LifecycleEvent;
    use crate::expr::EvalError;
    use crate::value::Value;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::RefCell;

    fn setup(markup: &str, model: serde_json::Value) -> Engine {
        let mut engine = Engine::from_markup(markup, AppConfig::default()).unwrap();
        engine.setup("main", Value::from(model)).unwrap();
        engine
    }

    fn app_markup(engine: &Engine) -> String {
        let element = engine.app("main").unwrap().element();
        engine.document().to_markup(element)
    }

    #[test]
    fn children_stamped_with_pass() {
        let mut engine = setup(r#"<div x-app="main"><p>{{ a }}</p></div>"#, json!({"a": 1}));
        engine.render_now("main").unwrap();
        engine.render_now("main").unwrap();
        let root = engine.app("main").unwrap().root();
        let p = engine.templates().get(root).unwrap().children[0];
        assert_eq!(engine.templates().get(p).unwrap().last_pass, 2);
        assert_eq!(engine.templates().get(root).unwrap().last_pass, 2);
    }

    #[test]
    fn init_fires_once_per_node() {
        let mut engine = setup(r#"<div x-app="main"><b id="b"></b></div>"#, json!({}));
        let b = engine.document().query_by_id("b").unwrap();
        let inits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&inits);
        engine.on(b, "init", move |_, event| {
            *counter.borrow_mut() += 1;
            event.stop_propagation();
            Ok(())
        });

        engine.render_now("main").unwrap();
        engine.render_now("main").unwrap();
        assert_eq!(*inits.borrow(), 1);
        let initialized = engine
            .drain_lifecycle()
            .into_iter()
            .filter(|e| matches!(e, LifecycleEvent::Initialized { node_id } if *node_id == b))
            .count();
        assert_eq!(initialized, 1);
    }

    #[test]
    fn init_bubbles_to_ancestors() {
        let mut engine = setup(r#"<div x-app="main"><i></i></div>"#, json!({}));
        let element = engine.app("main").unwrap().element();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        engine.on(element, "init", move |_, event| {
            log.borrow_mut().push(event.target);
            Ok(())
        });
        engine.render_now("main").unwrap();
        // The <i> child first, then the app element itself.
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(seen.borrow()[1], Some(element));
    }

    #[test]
    fn eval_error_aborts_pass_leaving_partial_state() {
        let mut engine = setup(
            r#"<div x-app="main"><p>{{ a }}</p><p>{{ missing.x }}</p><p>{{ a }}</p></div>"#,
            json!({"a": 7}),
        );
        let err = engine.render_now("main").unwrap_err();
        assert_eq!(
            err,
            RenderError::Eval(EvalError::Reference("missing".into()))
        );
        assert_eq!(
            app_markup(&engine),
            r#"<div x-app="main"><p>7</p><p>{{ missing.x }}</p><p>{{ a }}</p></div>"#
        );
    }

    #[test]
    fn failed_compile_is_skipped_at_apply() {
        let mut engine = setup(r#"<div x-app="main"><p :if="1 +">x</p></div>"#, json!({}));
        engine.render_now("main").unwrap();
        assert_eq!(
            app_markup(&engine),
            r#"<div x-app="main" rendered="true"><p :if="1 +">x</p></div>"#
        );
    }
}
