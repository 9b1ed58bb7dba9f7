//! Tree-walking evaluator.

use crate::dom::{Document, NodeId};
use crate::expr::ast::*;
use crate::scope::LocalsTable;
use crate::value::Value;

/// Errors raised while evaluating an expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("{0} is not defined")]
    Reference(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("{0} is not a function")]
    NotCallable(String),
    #[error("invalid assignment target")]
    InvalidAssignment,
    /// Raised by native functions.
    #[error("{0}")]
    Native(String),
}

/// Evaluation context: the resolved names plus the live document, which
/// element handles read and write through.
pub struct Env<'a> {
    pub locals: &'a LocalsTable,
    pub doc: &'a mut Document,
}

impl Env<'_> {
    pub fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(lit) => Ok(literal(lit)),
            Expr::Ident { name, local } => self.read_name(name, *local),
            Expr::Member { object, property } => {
                let object = self.eval(object)?;
                self.get_property(&object, property)
            }
            Expr::Index { object, index } => {
                let object = self.eval(object)?;
                let key = property_key(&self.eval(index)?);
                self.get_property(&object, &key)
            }
            Expr::Call { callee, args } => self.call(callee, args),
            Expr::Unary { op, operand } => {
                let v = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!v.is_truthy()),
                    UnaryOp::Neg => Value::Number(-v.to_number()),
                    UnaryOp::Plus => Value::Number(v.to_number()),
                })
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                Ok(binary(*op, &l, &r))
            }
            Expr::Logical { op, left, right } => {
                let l = self.eval(left)?;
                match (op, l.is_truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(l),
                    _ => self.eval(right),
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test)?.is_truthy() {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }
            Expr::Assign { op, target, value } => {
                let rhs = self.eval(value)?;
                let new = match op {
                    AssignOp::Set => rhs,
                    AssignOp::Add => binary(BinaryOp::Add, &self.eval(target)?, &rhs),
                    AssignOp::Sub => binary(BinaryOp::Sub, &self.eval(target)?, &rhs),
                };
                self.assign(target, new.clone())?;
                Ok(new)
            }
            Expr::Array(items) => {
                let items = items
                    .iter()
                    .map(|i| self.eval(i))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::from(items))
            }
            Expr::Object(props) => {
                let mut entries = Vec::with_capacity(props.len());
                for (key, value) in props {
                    entries.push((key.clone(), self.eval(value)?));
                }
                Ok(Value::object_from(entries))
            }
            Expr::Sequence(items) => {
                let mut last = Value::Undefined;
                for item in items {
                    last = self.eval(item)?;
                }
                Ok(last)
            }
        }
    }

    /// Write `value` into an assignable expression.
    pub fn assign(&mut self, target: &Expr, value: Value) -> Result<(), EvalError> {
        match target {
            Expr::Ident { name, local } => {
                if *local && self.locals.set(name, value) {
                    Ok(())
                } else {
                    Err(EvalError::Reference(name.clone()))
                }
            }
            Expr::Member { object, property } => {
                let object = self.eval(object)?;
                self.set_property(&object, property, value)
            }
            Expr::Index { object, index } => {
                let object = self.eval(object)?;
                let key = property_key(&self.eval(index)?);
                self.set_property(&object, &key, value)
            }
            _ => Err(EvalError::InvalidAssignment),
        }
    }

    fn read_name(&self, name: &str, local: bool) -> Result<Value, EvalError> {
        if !local {
            return Err(EvalError::Reference(name.to_owned()));
        }
        Ok(self.locals.get(name).unwrap_or_default())
    }

    fn get_property(&self, object: &Value, key: &str) -> Result<Value, EvalError> {
        match object {
            Value::Undefined | Value::Null => Err(EvalError::Type(format!(
                "cannot read properties of {object} (reading '{key}')"
            ))),
            Value::Node(id) => Ok(self.node_property(*id, key)),
            _ => Ok(object.get(key)),
        }
    }

    fn set_property(&mut self, object: &Value, key: &str, value: Value) -> Result<(), EvalError> {
        match object {
            Value::Node(id) => {
                self.set_node_property(*id, key, value);
                Ok(())
            }
            _ if object.set(key, value) => Ok(()),
            _ => Err(EvalError::Type(format!(
                "cannot set properties of {object} (setting '{key}')"
            ))),
        }
    }

    // ── Element handles ─────────────────────────────────────────────────

    fn node_property(&self, id: NodeId, key: &str) -> Value {
        let Some(data) = self.doc.get(id) else {
            return Value::Undefined;
        };
        match key {
            "value" => Value::from(data.value.as_str()),
            "tagName" => data
                .tag()
                .map(|t| Value::from(t.to_ascii_uppercase()))
                .unwrap_or_default(),
            "textContent" => Value::from(self.doc.text_content(id)),
            _ => data.attr(key).map(Value::from).unwrap_or_default(),
        }
    }

    fn set_node_property(&mut self, id: NodeId, key: &str, value: Value) {
        let Some(data) = self.doc.get_mut(id) else {
            return;
        };
        match key {
            "value" => data.value = display_or_empty(&value),
            "textContent" if !data.is_element() => data.text = display_or_empty(&value),
            _ if value.is_nullish() => {
                data.remove_attr(key);
            }
            _ => data.set_attr(key, value.to_string()),
        }
    }

    // ── Calls ───────────────────────────────────────────────────────────

    fn call(&mut self, callee: &Expr, args: &[Expr]) -> Result<Value, EvalError> {
        let (this, func, label) = match callee {
            Expr::Member { object, property } => {
                let this = self.eval(object)?;
                let func = self.get_property(&this, property)?;
                (this, func, format!("{}.{property}", describe(object)))
            }
            Expr::Ident { name, local } => {
                let func = self.read_name(name, *local)?;
                let this = self.locals.owner_of(name).unwrap_or_default();
                (this, func, name.clone())
            }
            other => (Value::Undefined, self.eval(other)?, describe(other)),
        };
        let args = args
            .iter()
            .map(|a| self.eval(a))
            .collect::<Result<Vec<_>, _>>()?;

        if let Value::Function(func) = func {
            return func.call(&this, args);
        }
        if let Expr::Member { property, .. } = callee {
            if let Some(result) = builtin_method(&this, property, &args) {
                return Ok(result);
            }
        }
        Err(EvalError::NotCallable(label))
    }
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

fn literal(lit: &Literal) -> Value {
    match lit {
        Literal::Undefined => Value::Undefined,
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Number(n) => Value::Number(*n),
        Literal::String(s) => Value::String(s.clone()),
    }
}

/// Whether `+` concatenates rather than adds.
fn is_stringy(v: &Value) -> bool {
    matches!(
        v,
        Value::String(_) | Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Node(_)
    )
}

pub(crate) fn binary(op: BinaryOp, l: &Value, r: &Value) -> Value {
    match op {
        BinaryOp::Add if is_stringy(l) || is_stringy(r) => Value::from(format!("{l}{r}")),
        BinaryOp::Add => Value::Number(l.to_number() + r.to_number()),
        BinaryOp::Sub => Value::Number(l.to_number() - r.to_number()),
        BinaryOp::Mul => Value::Number(l.to_number() * r.to_number()),
        BinaryOp::Div => Value::Number(l.to_number() / r.to_number()),
        BinaryOp::Rem => Value::Number(l.to_number() % r.to_number()),
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
            let ordering = match (l, r) {
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => l.to_number().partial_cmp(&r.to_number()),
            };
            let Some(ordering) = ordering else {
                return Value::Bool(false);
            };
            Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Gt => ordering.is_gt(),
                BinaryOp::Le => ordering.is_le(),
                _ => ordering.is_ge(),
            })
        }
        BinaryOp::Eq => Value::Bool(l.loose_eq(r)),
        BinaryOp::Ne => Value::Bool(!l.loose_eq(r)),
        BinaryOp::StrictEq => Value::Bool(l.strict_eq(r)),
        BinaryOp::StrictNe => Value::Bool(!l.strict_eq(r)),
    }
}

/// Property key for an index expression result.
pub(crate) fn property_key(v: &Value) -> String {
    v.to_string()
}

fn display_or_empty(v: &Value) -> String {
    if v.is_nullish() {
        String::new()
    } else {
        v.to_string()
    }
}

/// Short rendering of an expression for diagnostics.
fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident { name, .. } => name.clone(),
        Expr::Member { object, property } => format!("{}.{property}", describe(object)),
        Expr::Index { object, .. } => format!("{}[..]", describe(object)),
        Expr::Call { callee, .. } => format!("{}(..)", describe(callee)),
        Expr::Literal(lit) => literal(lit).to_string(),
        _ => "expression".to_owned(),
    }
}

// ---------------------------------------------------------------------------
// Built-in methods
// ---------------------------------------------------------------------------

fn arg(args: &[Value], ix: usize) -> Value {
    args.get(ix).cloned().unwrap_or_default()
}

/// Resolve a relative index the way `splice` does.
fn relative_index(v: &Value, len: usize, default: usize) -> usize {
    if v.is_nullish() {
        return default;
    }
    let n = v.to_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        (n as usize).min(len)
    }
}

fn builtin_method(this: &Value, name: &str, args: &[Value]) -> Option<Value> {
    if name == "toString" {
        return Some(Value::from(this.to_string()));
    }
    match this {
        Value::Array(items) => {
            let mut items = items.borrow_mut();
            Some(match name {
                "push" => {
                    items.extend(args.iter().cloned());
                    Value::from(items.len())
                }
                "pop" => items.pop().unwrap_or_default(),
                "indexOf" => {
                    let needle = arg(args, 0);
                    items
                        .iter()
                        .position(|v| v.strict_eq(&needle))
                        .map_or(Value::from(-1), Value::from)
                }
                "includes" => {
                    let needle = arg(args, 0);
                    Value::Bool(items.iter().any(|v| v.strict_eq(&needle)))
                }
                "join" => {
                    let sep = match arg(args, 0) {
                        Value::Undefined => ",".to_owned(),
                        other => other.to_string(),
                    };
                    let joined = items
                        .iter()
                        .map(display_or_empty)
                        .collect::<Vec<_>>()
                        .join(&sep);
                    Value::from(joined)
                }
                "splice" => {
                    let len = items.len();
                    let start = relative_index(&arg(args, 0), len, 0);
                    let count = if args.len() < 2 {
                        len - start
                    } else {
                        (arg(args, 1).to_number().max(0.0) as usize).min(len - start)
                    };
                    let inserted = args.iter().skip(2).cloned();
                    let removed = items.splice(start..start + count, inserted).collect::<Vec<_>>();
                    Value::from(removed)
                }
                _ => return None,
            })
        }
        Value::String(s) => {
            let s: &str = s;
            Some(match name {
                "toUpperCase" => Value::from(s.to_uppercase()),
                "toLowerCase" => Value::from(s.to_lowercase()),
                "trim" => Value::from(s.trim()),
                "includes" => Value::Bool(s.contains(&*arg(args, 0).to_string())),
                "indexOf" => {
                    let needle = arg(args, 0).to_string();
                    s.find(&needle)
                        .map_or(Value::from(-1), |byte| Value::from(s[..byte].chars().count()))
                }
                _ => return None,
            })
        }
        _ => None,
    }
}
