//! `{{expr}}` in text nodes.

use std::any::Any;
use std::rc::Rc;

use super::{param_ref, ApplyCx, Directive, Flow};
use crate::app::Engine;
use crate::dom::SourceNode;
use crate::expr::Expression;
use crate::scope::Scope;
use crate::template::{CompileError, RenderError};

/// A piece of interpolated text.
#[derive(Debug)]
pub enum Segment {
    Literal(String),
    Expr(Expression),
}

#[derive(Debug)]
pub struct InterpolateParam {
    pub segments: Vec<Segment>,
}

/// Split `text` into literal runs and `{{ .. }}` bodies. An unterminated
/// `{{` is kept as literal text.
fn split_segments(text: &str) -> Vec<(bool, &str)> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("{{") {
        let Some(close) = rest[open + 2..].find("}}") else {
            break;
        };
        if open > 0 {
            out.push((false, &rest[..open]));
        }
        out.push((true, &rest[open + 2..open + 2 + close]));
        rest = &rest[open + 2 + close + 2..];
    }
    if !rest.is_empty() {
        out.push((false, rest));
    }
    out
}

pub struct Interpolate;

impl Directive for Interpolate {
    fn name(&self) -> &'static str {
        "literals"
    }

    fn applies_to(&self, node: &SourceNode) -> bool {
        node.is_text() && node.text_value().is_some_and(|t| t.contains("{{"))
    }

    fn compile(
        &self,
        _engine: &Engine,
        scope: &Rc<Scope>,
        node: &SourceNode,
    ) -> Result<Rc<dyn Any>, CompileError> {
        let text = node.text_value().unwrap_or_default();
        let segments = split_segments(text)
            .into_iter()
            .map(|(is_expr, part)| {
                if is_expr {
                    Expression::compile(part, scope, &[])
                        .map(Segment::Expr)
                        .map_err(|e| CompileError::syntax(part, e))
                } else {
                    Ok(Segment::Literal(part.to_owned()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Rc::new(InterpolateParam { segments }))
    }

    fn apply(
        &self,
        engine: &mut Engine,
        cx: ApplyCx<'_>,
        param: &Rc<dyn Any>,
    ) -> Result<Flow, RenderError> {
        let interpolation = param_ref::<InterpolateParam>(param, "literals")?;
        let locals = cx.scope.resolve_locals();
        let mut text = String::new();
        for segment in &interpolation.segments {
            match segment {
                Segment::Literal(s) => text.push_str(s),
                Segment::Expr(e) => {
                    let value = e.eval(&locals, &mut engine.document)?;
                    text.push_str(&value.to_string());
                }
            }
        }
        if let Some(data) = engine.document.get_mut(cx.node) {
            data.text = text;
        }
        Ok(Flow::Continue)
    }
}
