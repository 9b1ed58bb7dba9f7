//! Compile phase: match directives against live nodes and build templates.

use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{trace, warn};

use super::{DirectiveEntry, RenderError, TemplateId, TemplateNode};
use crate::app::Engine;
use crate::dom::{NodeId, SourceNode};
use crate::scope::Scope;

impl Engine {
    /// Compile `node` and (unless a directive defers them) its descendants.
    ///
    /// Directive compile failures are logged and leave an entry without a
    /// parameter, which the apply phase skips.
    pub(crate) fn compile_node(
        &mut self,
        app: &Rc<str>,
        node: NodeId,
        scope: &Rc<Scope>,
    ) -> TemplateId {
        let source = Rc::new(
            self.document
                .snapshot(node)
                .unwrap_or_else(|| SourceNode::text("")),
        );
        let skipped = source.tag().is_some_and(|tag| self.config.is_skipped(tag));

        let mut entries = Vec::new();
        let mut deferred = skipped;
        if !skipped {
            let registry = Rc::clone(&self.directives);
            for directive in registry.iter() {
                if !directive.applies_to(&source) {
                    continue;
                }
                let param = match directive.compile(self, scope, &source) {
                    Ok(param) => {
                        deferred |= directive.defers_children();
                        Some(param)
                    }
                    Err(err) => {
                        warn!(directive = directive.name(), error = %err, "directive failed to compile");
                        None
                    }
                };
                entries.push(DirectiveEntry {
                    name: directive.name(),
                    param,
                });
            }
        }

        trace!(directives = entries.len(), "compiled node");
        let id = self.templates.insert(TemplateNode {
            app: Rc::clone(app),
            node,
            scope: Rc::clone(scope),
            inner_scope: None,
            source,
            directives: entries.into(),
            children: Vec::new(),
            original: TemplateId::default(),
            compiled_once: skipped,
            last_pass: 0,
            hidden: None,
            anchor: None,
            keyed: IndexMap::new(),
        });

        if !deferred {
            let children = self.compile_children(app, node, scope);
            if let Some(tpl) = self.templates.get_mut(id) {
                tpl.children = children;
                tpl.compiled_once = true;
            }
        }
        id
    }

    fn compile_children(&mut self, app: &Rc<str>, node: NodeId, scope: &Rc<Scope>) -> Vec<TemplateId> {
        let kids = self.document.children(node).to_vec();
        kids.into_iter()
            .map(|kid| self.compile_node(app, kid, scope))
            .collect()
    }

    /// Reset a node's content to its source snapshot and compile it under
    /// `scope`, replacing the template's children.
    pub(crate) fn recompile_children(
        &mut self,
        id: TemplateId,
        scope: &Rc<Scope>,
    ) -> Result<(), RenderError> {
        let tpl = self.templates.get(id).ok_or(RenderError::StaleTemplate)?;
        let app = Rc::clone(&tpl.app);
        let node = tpl.node;
        let source = Rc::clone(&tpl.source);
        let old = tpl.children.clone();

        for child in old {
            self.templates.remove_subtree(child);
        }
        let removed = self.document.clear_children(node);
        self.purge(&removed);
        for child in source.children() {
            self.document.instantiate(Some(node), child);
        }

        let children = self.compile_children(&app, node, scope);
        let tpl = self.templates.get_mut(id).ok_or(RenderError::StaleTemplate)?;
        tpl.children = children;
        tpl.compiled_once = true;
        Ok(())
    }

    /// Compile `node` as the content of an already-existing template.
    pub(crate) fn compile_into(
        &mut self,
        id: TemplateId,
        scope: &Rc<Scope>,
    ) -> Result<(), RenderError> {
        let tpl = self.templates.get(id).ok_or(RenderError::StaleTemplate)?;
        let app = Rc::clone(&tpl.app);
        let node = tpl.node;
        let children = self.compile_children(&app, node, scope);
        let tpl = self.templates.get_mut(id).ok_or(RenderError::StaleTemplate)?;
        tpl.children = children;
        tpl.compiled_once = true;
        Ok(())
    }

    /// Build a template for `node`, a fresh instance of `master`'s source.
    ///
    /// The directive list is shared with `master`; children are mirrored by
    /// position against `node`'s live children.
    pub(crate) fn clone_template(
        &mut self,
        master: TemplateId,
        node: NodeId,
    ) -> Result<TemplateId, RenderError> {
        let tpl = self.templates.get(master).ok_or(RenderError::StaleTemplate)?;
        let clone = TemplateNode {
            app: Rc::clone(&tpl.app),
            node,
            scope: Rc::clone(&tpl.scope),
            inner_scope: None,
            source: Rc::clone(&tpl.source),
            directives: Rc::clone(&tpl.directives),
            children: Vec::new(),
            original: master,
            compiled_once: tpl.compiled_once,
            last_pass: 0,
            hidden: None,
            anchor: None,
            keyed: IndexMap::new(),
        };
        let master_children = tpl.children.clone();
        let id = self.templates.insert(clone);

        let live = self.document.children(node).to_vec();
        let children = master_children
            .into_iter()
            .zip(live)
            .map(|(child, kid)| self.clone_template(child, kid))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(tpl) = self.templates.get_mut(id) {
            tpl.children = children;
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppConfig;
    use crate::scope::ShadowPolicy;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn compiled(markup: &str) -> (Engine, TemplateId) {
        let mut engine = Engine::from_markup(markup, AppConfig::default()).unwrap();
        let root = engine.document().root().unwrap();
        let node = engine.document().children(root)[0];
        let scope = Scope::root(Value::object(), "app", ShadowPolicy::default());
        let id = engine.compile_node(&Rc::from("main"), node, &scope);
        (engine, id)
    }

    fn directive_names(engine: &Engine, id: TemplateId) -> Vec<&'static str> {
        engine
            .templates()
            .get(id)
            .unwrap()
            .directives
            .iter()
            .map(|d| d.name)
            .collect()
    }

    #[test]
    fn template_tree_mirrors_document() {
        let (engine, id) = compiled("<ul><li>a</li><li :class=\"{x: 1}\">{{ b }}</li></ul>");
        let tpl = engine.templates().get(id).unwrap();
        assert!(tpl.compiled_once);
        assert_eq!(tpl.children.len(), 2);
        assert_eq!(tpl.original, id);

        let second = tpl.children[1];
        assert_eq!(directive_names(&engine, second), vec![":class"]);
        let text = engine.templates().get(second).unwrap().children[0];
        assert_eq!(directive_names(&engine, text), vec!["literals"]);
    }

    #[test]
    fn multiple_directives_in_priority_order() {
        let (engine, id) = compiled(r#"<button @click="n = 1" :if="n"></button>"#);
        assert_eq!(directive_names(&engine, id), vec![":if", "@events"]);
    }

    #[test]
    fn skipped_tags_have_no_directives_or_children() {
        let (engine, id) = compiled(r#"<script :if="x">{{ y }}</script>"#);
        let tpl = engine.templates().get(id).unwrap();
        assert!(tpl.directives.is_empty());
        assert!(tpl.children.is_empty());
        assert!(tpl.compiled_once);
    }

    #[test]
    fn failed_compile_keeps_empty_entry() {
        let (engine, id) = compiled(r#"<p :if="a +"></p>"#);
        let tpl = engine.templates().get(id).unwrap();
        assert_eq!(tpl.directives.len(), 1);
        assert!(tpl.directives[0].param.is_none());
    }

    #[test]
    fn scoped_children_are_deferred() {
        let (engine, id) = compiled(r#"<div :scope="user"><b>{{ name }}</b></div>"#);
        let tpl = engine.templates().get(id).unwrap();
        assert!(!tpl.compiled_once);
        assert!(tpl.children.is_empty());
    }

    #[test]
    fn clone_mirrors_children_and_shares_directives() {
        let (mut engine, id) = compiled(r#"<li :class="{a: 1}"><b>{{ x }}</b></li>"#);
        let source = Rc::clone(&engine.templates().get(id).unwrap().source);
        let fresh = engine.document_mut().instantiate(None, &source);
        let clone = engine.clone_template(id, fresh).unwrap();

        let master = engine.templates().get(id).unwrap();
        let copy = engine.templates().get(clone).unwrap();
        assert!(copy.is_clone(clone));
        assert_eq!(copy.original, id);
        assert!(Rc::ptr_eq(&master.directives, &copy.directives));
        assert_eq!(copy.children.len(), 1);
        let b = copy.children[0];
        assert_eq!(engine.templates().get(b).unwrap().node, engine.document().children(fresh)[0]);
    }
}
