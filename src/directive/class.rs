//! `:class="{name: condition}"`: toggle class tokens.

use std::any::Any;
use std::rc::Rc;

use indexmap::IndexMap;

use super::{has_attr, param_ref, ApplyCx, Directive, Flow};
use crate::app::Engine;
use crate::dom::SourceNode;
use crate::expr::Expression;
use crate::scope::Scope;
use crate::template::{CompileError, RenderError};

pub struct ClassMap;

impl Directive for ClassMap {
    fn name(&self) -> &'static str {
        ":class"
    }

    fn applies_to(&self, node: &SourceNode) -> bool {
        has_attr(node, ":class")
    }

    fn compile(
        &self,
        _engine: &Engine,
        scope: &Rc<Scope>,
        node: &SourceNode,
    ) -> Result<Rc<dyn Any>, CompileError> {
        let text = node.attr(":class").unwrap_or_default();
        let map = Expression::compile(text, scope, &[]).map_err(|e| CompileError::syntax(text, e))?;
        Ok(Rc::new(map))
    }

    fn apply(
        &self,
        engine: &mut Engine,
        cx: ApplyCx<'_>,
        param: &Rc<dyn Any>,
    ) -> Result<Flow, RenderError> {
        let map = param_ref::<Expression>(param, ":class")?;
        if !engine.document.is_element(cx.node) {
            return Ok(Flow::Continue);
        }
        let toggles = map.eval_in(&cx.scope, &mut engine.document)?;
        let Some(data) = engine.document.get_mut(cx.node) else {
            return Ok(Flow::Continue);
        };

        // Tokens already present count as on unless the map says otherwise.
        let mut tokens: IndexMap<String, bool> =
            data.classes().into_iter().map(|c| (c.to_owned(), true)).collect();
        for (name, on) in toggles.entries() {
            tokens.insert(name, on.is_truthy());
        }
        let class = tokens
            .into_iter()
            .filter_map(|(name, on)| on.then_some(name))
            .collect::<Vec<_>>()
            .join(" ");
        data.set_attr("class", class);
        Ok(Flow::Continue)
    }
}
