//! Expression AST.

use std::rc::Rc;

/// A literal constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// A bare name. `local` is fixed at compile time: only names present in
    /// the locals table then are read through it.
    Ident { name: String, local: bool },
    Member { object: Box<Expr>, property: String },
    Index { object: Box<Expr>, index: Box<Expr> },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    Logical { op: LogicalOp, left: Box<Expr>, right: Box<Expr> },
    Conditional { test: Box<Expr>, consequent: Box<Expr>, alternate: Box<Expr> },
    Assign { op: AssignOp, target: Box<Expr>, value: Box<Expr> },
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    /// `a; b; c` evaluates each and yields the last.
    Sequence(Vec<Expr>),
}

impl Expr {
    /// Whether this expression can appear on the left of `=`.
    pub fn is_assignable(&self) -> bool {
        matches!(self, Expr::Ident { .. } | Expr::Member { .. } | Expr::Index { .. })
    }

    /// Mark every identifier whose name satisfies `is_local`.
    pub fn resolve_names(&mut self, is_local: &dyn Fn(&str) -> bool) {
        match self {
            Expr::Literal(_) => {}
            Expr::Ident { name, local } => *local = is_local(name),
            Expr::Member { object, .. } => object.resolve_names(is_local),
            Expr::Index { object, index } => {
                object.resolve_names(is_local);
                index.resolve_names(is_local);
            }
            Expr::Call { callee, args } => {
                callee.resolve_names(is_local);
                args.iter_mut().for_each(|a| a.resolve_names(is_local));
            }
            Expr::Unary { operand, .. } => operand.resolve_names(is_local),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                left.resolve_names(is_local);
                right.resolve_names(is_local);
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                test.resolve_names(is_local);
                consequent.resolve_names(is_local);
                alternate.resolve_names(is_local);
            }
            Expr::Assign { target, value, .. } => {
                target.resolve_names(is_local);
                value.resolve_names(is_local);
            }
            Expr::Array(items) | Expr::Sequence(items) => {
                items.iter_mut().for_each(|i| i.resolve_names(is_local));
            }
            Expr::Object(props) => {
                props.iter_mut().for_each(|(_, v)| v.resolve_names(is_local));
            }
        }
    }

    /// Names referenced but not resolved as locals.
    pub fn free_names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_free(&mut out);
        out
    }

    fn collect_free<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Ident { name, local } => {
                if !*local && !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::Member { object, .. } | Expr::Unary { operand: object, .. } => {
                object.collect_free(out)
            }
            Expr::Index { object, index } => {
                object.collect_free(out);
                index.collect_free(out);
            }
            Expr::Call { callee, args } => {
                callee.collect_free(out);
                args.iter().for_each(|a| a.collect_free(out));
            }
            Expr::Binary { left, right, .. }
            | Expr::Logical { left, right, .. }
            | Expr::Assign {
                target: left,
                value: right,
                ..
            } => {
                left.collect_free(out);
                right.collect_free(out);
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                test.collect_free(out);
                consequent.collect_free(out);
                alternate.collect_free(out);
            }
            Expr::Array(items) | Expr::Sequence(items) => {
                items.iter().for_each(|i| i.collect_free(out));
            }
            Expr::Object(props) => props.iter().for_each(|(_, v)| v.collect_free(out)),
        }
    }
}
