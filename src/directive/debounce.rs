//! `:debounce="{event: ms}"`: per-event render delays for `:bind` and
//! `@event` handlers on the same node. Evaluated once.

use std::any::Any;
use std::rc::Rc;
use std::time::Duration;

use indexmap::IndexMap;

use super::{has_attr, param_ref, ApplyCx, Directive, Flow};
use crate::app::Engine;
use crate::dom::SourceNode;
use crate::expr::Expression;
use crate::scope::Scope;
use crate::template::{CompileError, RenderError};
use crate::value::Value;

pub struct Debounce;

fn to_delay(ms: &Value) -> Duration {
    let ms = ms.to_number();
    if ms.is_finite() && ms > 0.0 {
        Duration::from_millis(ms as u64)
    } else {
        Duration::ZERO
    }
}

impl Directive for Debounce {
    fn name(&self) -> &'static str {
        ":debounce"
    }

    fn applies_to(&self, node: &SourceNode) -> bool {
        has_attr(node, ":debounce")
    }

    fn compile(
        &self,
        _engine: &Engine,
        scope: &Rc<Scope>,
        node: &SourceNode,
    ) -> Result<Rc<dyn Any>, CompileError> {
        let text = node.attr(":debounce").unwrap_or_default();
        let delays =
            Expression::compile(text, scope, &[]).map_err(|e| CompileError::syntax(text, e))?;
        Ok(Rc::new(delays))
    }

    fn apply(
        &self,
        engine: &mut Engine,
        cx: ApplyCx<'_>,
        param: &Rc<dyn Any>,
    ) -> Result<Flow, RenderError> {
        let delays = param_ref::<Expression>(param, ":debounce")?;
        if engine.node_state(cx.node).is_some_and(|s| s.debounce.is_some()) {
            return Ok(Flow::Continue);
        }
        let table = delays
            .eval_in(&cx.scope, &mut engine.document)?
            .entries()
            .into_iter()
            .map(|(event, ms)| (event, to_delay(&ms)))
            .collect::<IndexMap<_, _>>();
        if let Some(state) = engine.state_mut(cx.node) {
            state.debounce = Some(table);
        }
        Ok(Flow::Continue)
    }
}
