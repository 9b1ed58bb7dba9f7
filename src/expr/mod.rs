//! Directive expressions: tokenizer, AST, parser, evaluator.
//!
//! An [`Expression`] is compiled against a scope: names visible in the
//! scope's locals table at compile time are marked local and read through
//! whatever table is passed at evaluation time. Anything else is a free name
//! and raises a reference error when evaluated.

pub mod ast;
pub mod eval;
pub mod parser;
pub mod tokenizer;

use std::fmt;
use std::rc::Rc;

use crate::dom::Document;
use crate::scope::{LocalsTable, Scope};
use crate::value::Value;

pub use ast::Expr;
pub use eval::{Env, EvalError};
pub use parser::{parse_expression, ParseError};

/// A compiled, reusable expression.
#[derive(Clone, PartialEq)]
pub struct Expression {
    source: Rc<str>,
    body: Expr,
}

impl Expression {
    /// Compile `text` for `scope`.
    ///
    /// `extra` names (e.g. `$el`, a loop variable) are declared on the scope
    /// as `undefined` locals first, so they resolve as locals even though
    /// their values only exist at evaluation time.
    pub fn compile(text: &str, scope: &Scope, extra: &[&str]) -> Result<Self, ParseError> {
        let mut body = parse_expression(text)?;
        scope.declare(extra.iter().copied());
        let locals = scope.resolve_locals();
        body.resolve_names(&|name| locals.contains(name));
        Ok(Self {
            source: text.into(),
            body,
        })
    }

    /// Evaluate against a resolved locals table.
    pub fn eval(&self, locals: &LocalsTable, doc: &mut Document) -> Result<Value, EvalError> {
        Env { locals, doc }.eval(&self.body)
    }

    /// Evaluate against a scope's current locals.
    pub fn eval_in(&self, scope: &Scope, doc: &mut Document) -> Result<Value, EvalError> {
        self.eval(&scope.resolve_locals(), doc)
    }

    /// Write `value` through this expression (which must be assignable).
    pub fn assign(
        &self,
        locals: &LocalsTable,
        doc: &mut Document,
        value: Value,
    ) -> Result<(), EvalError> {
        Env { locals, doc }.assign(&self.body, value)
    }

    pub fn is_assignable(&self) -> bool {
        self.body.is_assignable()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn body(&self) -> &Expr {
        &self.body
    }

    /// Names that were not visible as locals when compiled.
    pub fn free_names(&self) -> Vec<&str> {
        self.body.free_names()
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expression({:?})", self.source)
    }
}
