//! `:each="item in collection"`: one keyed clone per collection entry.
//!
//! The master node is swapped for an anchor placeholder on first apply.
//! Clones are inserted after the anchor in iteration order and kept by the
//! collection's own keys: surviving keys reuse their clone, new keys get a
//! fresh one, vanished keys are destroyed.

use std::any::Any;
use std::collections::HashSet;
use std::rc::Rc;

use tracing::debug;

use super::{has_attr, param_ref, split_clause, ApplyCx, Directive, Flow};
use crate::app::Engine;
use crate::dom::SourceNode;
use crate::expr::Expression;
use crate::scope::Scope;
use crate::template::{CompileError, RenderError, TemplateId};
use crate::value::Value;

/// Compiled `item in collection` clause.
#[derive(Debug)]
pub struct RepeatParam {
    pub item: String,
    pub text: String,
    pub collection: Expression,
}

pub struct Repeat;

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

impl Directive for Repeat {
    fn name(&self) -> &'static str {
        ":each"
    }

    fn applies_to(&self, node: &SourceNode) -> bool {
        has_attr(node, ":each")
    }

    fn compile(
        &self,
        _engine: &Engine,
        scope: &Rc<Scope>,
        node: &SourceNode,
    ) -> Result<Rc<dyn Any>, CompileError> {
        let text = node.attr(":each").unwrap_or_default();
        let malformed = || CompileError::Malformed {
            text: text.to_owned(),
            reason: "expected `name in collection`",
        };
        let (item, collection) = split_clause(text, "in").ok_or_else(malformed)?;
        if !is_identifier(item) {
            return Err(malformed());
        }
        let collection = Expression::compile(collection, scope, &[item, "$key", "$ix"])
            .map_err(|e| CompileError::syntax(text, e))?;
        Ok(Rc::new(RepeatParam {
            item: item.to_owned(),
            text: text.to_owned(),
            collection,
        }))
    }

    fn apply(
        &self,
        engine: &mut Engine,
        cx: ApplyCx<'_>,
        param: &Rc<dyn Any>,
    ) -> Result<Flow, RenderError> {
        let each = param_ref::<RepeatParam>(param, ":each")?;
        let collection = each.collection.eval_in(&cx.scope, &mut engine.document)?;

        let tpl = engine
            .templates
            .get_mut(cx.template)
            .ok_or(RenderError::StaleTemplate)?;
        let anchor = match tpl.anchor {
            Some(anchor) => anchor,
            None => {
                let anchor = engine
                    .document
                    .placehold(cx.node, format!("each: {}", each.text));
                tpl.anchor = Some(anchor);
                anchor
            }
        };
        let source = Rc::clone(&tpl.source);
        let existing = tpl.keyed.clone();
        let excludes = cx.excluding(":each");

        let mut seen = HashSet::new();
        let mut prev = anchor;
        for (ix, (key, item)) in collection.entries().into_iter().enumerate() {
            let clone = match existing.get(&key) {
                Some(&clone) => clone,
                None => {
                    let fresh = engine.document.instantiate(None, &source);
                    let clone = engine.clone_template(cx.template, fresh)?;
                    if let Some(tpl) = engine.templates.get_mut(cx.template) {
                        tpl.keyed.insert(key.clone(), clone);
                    }
                    engine.lifecycle.on_clone_inserted(fresh, &key);
                    debug!(key = %key, "clone inserted");
                    clone
                }
            };

            let position = clone_position(engine, clone)?;
            if engine.document.next_sibling(prev) != Some(position) {
                engine.document.insert_after(prev, position);
            }
            let scope = cx.scope.local_copy([
                ("$key", Value::from(key.as_str())),
                ("$ix", Value::from(ix)),
                (each.item.as_str(), item),
            ]);
            if let Some(tpl) = engine.templates.get_mut(clone) {
                tpl.scope = scope;
            }
            engine.apply_node(clone, &excludes)?;
            prev = clone_position(engine, clone)?;
            seen.insert(key);
        }

        for (key, clone) in existing {
            if !seen.contains(&key) {
                remove_clone(engine, cx.template, &key, clone);
            }
        }
        engine.mark_applied(cx.template);
        Ok(Flow::Stop)
    }

    fn runs_on_placeholder(&self) -> bool {
        true
    }
}

fn clone_position(engine: &Engine, clone: TemplateId) -> Result<crate::dom::NodeId, RenderError> {
    engine
        .templates
        .get(clone)
        .map(|t| t.position())
        .ok_or(RenderError::StaleTemplate)
}

fn remove_clone(engine: &mut Engine, master: TemplateId, key: &str, clone: TemplateId) {
    if let Some(tpl) = engine.templates.get_mut(master) {
        tpl.keyed.shift_remove(key);
    }
    let Some(tpl) = engine.templates.get(clone) else {
        return;
    };
    let node = tpl.node;
    let mut removed = engine.document.remove(tpl.position());
    removed.extend(engine.document.remove(node));
    engine.purge(&removed);
    engine.templates.remove_subtree(clone);
    engine.lifecycle.on_clone_removed(node, key);
    debug!(key, "clone removed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppConfig;
    use crate::event::LifecycleEvent;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn setup(markup: &str, model: &Value) -> Engine {
        let mut engine = Engine::from_markup(markup, AppConfig::default()).unwrap();
        engine.setup("main", model.clone()).unwrap();
        engine.render_now("main").unwrap();
        engine
    }

    fn list_markup(engine: &Engine) -> String {
        let ul = engine.document().query_by_id("list").unwrap();
        engine.document().to_markup(ul)
    }

    #[test]
    fn parses_clause() {
        assert!(is_identifier("item"));
        assert!(is_identifier("$row"));
        assert!(!is_identifier("a.b"));
        assert!(!is_identifier("1x"));
    }

    #[test]
    fn malformed_clause_is_compile_error() {
        let engine = Engine::from_markup("<p></p>", AppConfig::default()).unwrap();
        let scope = Scope::root(Value::object(), "app", Default::default());
        let node = SourceNode::element("li").with_attr(":each", "items");
        let err = Repeat.compile(&engine, &scope, &node).unwrap_err();
        assert!(matches!(err, CompileError::Malformed { .. }));
    }

    #[test]
    fn renders_clones_in_order() {
        let model = Value::from(json!({"items": [10, 20, 30]}));
        let engine = setup(
            r#"<div x-app="main"><ul id="list"><li :each="item in items">{{ item }}</li></ul></div>"#,
            &model,
        );
        let ul = engine.document().query_by_id("list").unwrap();
        let texts = engine.document().children(ul)[1..]
            .iter()
            .map(|&li| engine.document().text_content(li))
            .collect::<Vec<_>>();
        assert_eq!(texts, vec!["10", "20", "30"]);
        assert!(engine.document().is_placeholder(engine.document().children(ul)[0]));
    }

    #[test]
    fn exposes_key_and_index_for_objects() {
        let model = Value::from(json!({"m": {"x": "a", "y": "b"}}));
        let engine = setup(
            r#"<div x-app="main"><ul id="list"><li :each="v in m">{{ $key }}{{ $ix }}{{ v }}</li></ul></div>"#,
            &model,
        );
        assert_eq!(
            list_markup(&engine),
            r#"<ul id="list"><!--each: v in m--><li :each="v in m">x0a</li><li :each="v in m">y1b</li></ul>"#
        );
    }

    #[test]
    fn stale_keys_are_removed_and_survivors_reused() {
        let model = Value::from(json!({"m": {"a": 1, "b": 2, "c": 3}}));
        let mut engine = setup(
            r#"<div x-app="main"><ul id="list"><li :each="v in m">{{ v }}</li></ul></div>"#,
            &model,
        );
        let ul = engine.document().query_by_id("list").unwrap();
        let before = engine.document().children(ul).to_vec();
        engine.drain_lifecycle();

        let m = model.get("m");
        let Value::Object(map) = &m else {
            panic!("m is not an object");
        };
        map.borrow_mut().shift_remove("a");
        m.set("d", Value::from(4));
        engine.render_now("main").unwrap();

        let after = engine.document().children(ul).to_vec();
        assert_eq!(after.len(), 4);
        assert_eq!(after[1], before[2]);
        assert_eq!(after[2], before[3]);
        assert!(!engine.document().contains(before[1]));
        assert_eq!(engine.document().text_content(ul), "234");

        let events = engine.drain_lifecycle();
        assert!(events.iter().any(|e| matches!(
            e,
            LifecycleEvent::CloneRemoved { key, .. } if key == "a"
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            LifecycleEvent::CloneInserted { key, .. } if key == "d"
        )));
    }

    #[test]
    fn reorder_moves_existing_clones() {
        let model = Value::from(json!({"m": {"a": 1, "b": 2}}));
        let mut engine = setup(
            r#"<div x-app="main"><ul id="list"><li :each="v in m">{{ v }}</li></ul></div>"#,
            &model,
        );
        let ul = engine.document().query_by_id("list").unwrap();
        let before = engine.document().children(ul).to_vec();

        let m = model.get("m");
        let Value::Object(map) = &m else {
            panic!("m is not an object");
        };
        map.borrow_mut().swap_indices(0, 1);
        engine.render_now("main").unwrap();

        let after = engine.document().children(ul).to_vec();
        assert_eq!(after, vec![before[0], before[2], before[1]]);
        assert_eq!(engine.document().text_content(ul), "21");
    }
}
