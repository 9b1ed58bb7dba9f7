//! Dynamic model values.
//!
//! A [`Value`] is what compiled expressions read and write. Objects and arrays
//! are shared by reference (`Rc<RefCell<..>>`): every handle to the same model
//! object sees writes made through any other handle, which is what lets a
//! binding write straight into the model without diffing.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::dom::NodeId;
use crate::expr::EvalError;

/// Ordered property map backing [`Value::Object`].
pub type ObjectMap = IndexMap<String, Value>;

/// How far past the end an array index may be written.
pub const MAX_ARRAY_GAP: usize = 1024;

/// Signature of a native function: receives `this` and the evaluated arguments.
pub type NativeFn = dyn Fn(&Value, Vec<Value>) -> Result<Value, EvalError>;

// ---------------------------------------------------------------------------
// Function
// ---------------------------------------------------------------------------

/// A named native function callable from expressions.
#[derive(Clone)]
pub struct Function {
    name: Rc<str>,
    call: Rc<NativeFn>,
}

impl Function {
    /// Wrap a closure as a callable value.
    pub fn new(
        name: impl Into<Rc<str>>,
        call: impl Fn(&Value, Vec<Value>) -> Result<Value, EvalError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            call: Rc::new(call),
        }
    }

    /// The name used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke with an explicit `this`.
    pub fn call(&self, this: &Value, args: Vec<Value>) -> Result<Value, EvalError> {
        (self.call)(this, args)
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.call, &other.call)
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A model value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<ObjectMap>>),
    Function(Function),
    /// Handle to a live document node (e.g. `$el`).
    Node(NodeId),
}

impl Value {
    /// A new, empty object.
    pub fn object() -> Self {
        Value::Object(Rc::new(RefCell::new(ObjectMap::new())))
    }

    /// A new object populated from `(key, value)` pairs, in order.
    pub fn object_from<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect::<ObjectMap>();
        Value::Object(Rc::new(RefCell::new(map)))
    }

    /// A new array.
    pub fn array(items: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        let items = items.into_iter().map(Into::into).collect::<Vec<_>>();
        Value::Array(Rc::new(RefCell::new(items)))
    }

    /// A native function value.
    pub fn function(
        name: impl Into<Rc<str>>,
        call: impl Fn(&Value, Vec<Value>) -> Result<Value, EvalError> + 'static,
    ) -> Self {
        Value::Function(Function::new(name, call))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Truthiness in the usual scripting sense.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Node(_) => true,
        }
    }

    /// Short type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Node(_) => "node",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric conversion (`undefined` and unparsable strings become NaN).
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Array(items) => {
                let items = items.borrow();
                match items.len() {
                    0 => 0.0,
                    1 => items[0].to_number(),
                    _ => f64::NAN,
                }
            }
            Value::Object(_) | Value::Function(_) | Value::Node(_) => f64::NAN,
        }
    }

    /// Read a property. Missing properties read as `undefined`.
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(map) => map.borrow().get(key).cloned().unwrap_or_default(),
            Value::Array(items) => {
                let items = items.borrow();
                if key == "length" {
                    return Value::Number(items.len() as f64);
                }
                key.parse::<usize>()
                    .ok()
                    .and_then(|ix| items.get(ix).cloned())
                    .unwrap_or_default()
            }
            Value::String(s) => {
                if key == "length" {
                    return Value::Number(s.chars().count() as f64);
                }
                key.parse::<usize>()
                    .ok()
                    .and_then(|ix| s.chars().nth(ix))
                    .map(|c| Value::from(c.to_string()))
                    .unwrap_or_default()
            }
            _ => Value::Undefined,
        }
    }

    /// Write a property. Returns `false` when the value cannot hold
    /// properties, or for an array index more than [`MAX_ARRAY_GAP`] past the
    /// end.
    pub fn set(&self, key: &str, value: Value) -> bool {
        match self {
            Value::Object(map) => {
                map.borrow_mut().insert(key.to_owned(), value);
                true
            }
            Value::Array(items) => {
                let Ok(ix) = key.parse::<usize>() else {
                    return false;
                };
                let mut items = items.borrow_mut();
                if ix >= items.len() {
                    if ix - items.len() > MAX_ARRAY_GAP {
                        return false;
                    }
                    items.resize(ix + 1, Value::Undefined);
                }
                items[ix] = value;
                true
            }
            _ => false,
        }
    }

    /// Own enumerable keys, in iteration order.
    pub fn keys(&self) -> Vec<String> {
        match self {
            Value::Object(map) => map.borrow().keys().cloned().collect(),
            Value::Array(items) => (0..items.borrow().len()).map(|ix| ix.to_string()).collect(),
            Value::String(s) => (0..s.chars().count()).map(|ix| ix.to_string()).collect(),
            _ => Vec::new(),
        }
    }

    /// Own enumerable `(key, value)` pairs, in iteration order.
    pub fn entries(&self) -> Vec<(String, Value)> {
        match self {
            Value::Object(map) => map
                .borrow()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            Value::Array(items) => items
                .borrow()
                .iter()
                .enumerate()
                .map(|(ix, v)| (ix.to_string(), v.clone()))
                .collect(),
            Value::String(s) => s
                .chars()
                .enumerate()
                .map(|(ix, c)| (ix.to_string(), Value::from(c.to_string())))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// `===`: primitives by value, everything else by identity.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Node(a), Value::Node(b)) => a == b,
            _ => false,
        }
    }

    /// `==`: `null == undefined`, numbers and strings compare numerically.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => self.to_number() == other.to_number(),
            _ => self.strict_eq(other),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{sign}Infinity")
    } else if n == n.trunc() && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
            Value::Array(items) => {
                let joined = items
                    .borrow()
                    .iter()
                    .map(|v| if v.is_nullish() { String::new() } else { v.to_string() })
                    .collect::<Vec<_>>()
                    .join(",");
                f.write_str(&joined)
            }
            Value::Object(_) => f.write_str("[object Object]"),
            Value::Function(func) => write!(f, "function {}() {{ [native code] }}", func.name()),
            Value::Node(_) => f.write_str("[object Node]"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Array(items) => f.debug_list().entries(items.borrow().iter()).finish(),
            Value::Object(map) => f.debug_map().entries(map.borrow().iter()).finish(),
            Value::Function(func) => write!(f, "Function({})", func.name()),
            Value::Node(id) => write!(f, "Node({id:?})"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Value::Node(id)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::from(items.into_iter().map(Value::from).collect::<Vec<_>>())
            }
            serde_json::Value::Object(map) => Value::object_from(map),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("0").is_truthy());
        assert!(Value::object().is_truthy());
        assert!(Value::array(Vec::<Value>::new()).is_truthy());
    }

    #[test]
    fn number_display() {
        assert_eq!(Value::from(10).to_string(), "10");
        assert_eq!(Value::from(1.5).to_string(), "1.5");
        assert_eq!(Value::from(-0.0).to_string(), "0");
        assert_eq!(Value::Number(f64::NAN).to_string(), "NaN");
        assert_eq!(Value::from(0.1 + 0.2).to_string(), "0.30000000000000004");
    }

    #[test]
    fn array_display_skips_nullish() {
        let arr = Value::array([Value::from(1), Value::Null, Value::from("x")]);
        assert_eq!(arr.to_string(), "1,,x");
    }

    #[test]
    fn objects_are_shared_by_reference() {
        let model = Value::object_from([("count", 1)]);
        let alias = model.clone();
        alias.set("count", Value::from(2));
        assert_eq!(model.get("count"), Value::from(2));
        assert!(model.strict_eq(&alias));
        assert!(!model.strict_eq(&Value::object_from([("count", 2)])));
    }

    #[test]
    fn array_set_extends() {
        let arr = Value::array([1]);
        assert!(arr.set("3", Value::from(4)));
        assert_eq!(arr.get("length"), Value::from(4));
        assert_eq!(arr.get("2"), Value::Undefined);
        assert!(!arr.set("x", Value::Null));
    }

    #[test]
    fn array_set_rejects_far_indices() {
        let arr = Value::array([1]);
        assert!(!arr.set("10000000000000000000", Value::from(1)));
        assert!(!arr.set(&(MAX_ARRAY_GAP + 2).to_string(), Value::from(1)));
        assert_eq!(arr.get("length"), Value::from(1));

        assert!(arr.set(&(MAX_ARRAY_GAP + 1).to_string(), Value::from(2)));
        assert_eq!(arr.get("length"), Value::from(MAX_ARRAY_GAP + 2));
    }

    #[test]
    fn entries_follow_native_keys() {
        let arr = Value::array([10, 20]);
        let keys = arr.entries().into_iter().map(|(k, _)| k).collect::<Vec<_>>();
        assert_eq!(keys, vec!["0", "1"]);

        let obj = Value::from(json!({"b": 1, "a": 2}));
        assert_eq!(obj.keys(), vec!["b", "a"]);
        assert!(Value::Undefined.entries().is_empty());
    }

    #[test]
    fn loose_equality() {
        assert!(Value::Null.loose_eq(&Value::Undefined));
        assert!(Value::from("1").loose_eq(&Value::from(1)));
        assert!(Value::from(true).loose_eq(&Value::from(1)));
        assert!(!Value::from(0).loose_eq(&Value::Null));
        assert!(!Value::Number(f64::NAN).loose_eq(&Value::Number(f64::NAN)));
    }

    #[test]
    fn to_number_conversions() {
        assert_eq!(Value::from(" 42 ").to_number(), 42.0);
        assert_eq!(Value::from("").to_number(), 0.0);
        assert!(Value::from("abc").to_number().is_nan());
        assert_eq!(Value::Null.to_number(), 0.0);
        assert!(Value::Undefined.to_number().is_nan());
    }

    #[test]
    fn functions_receive_this() {
        let model = Value::object_from([("n", 2)]);
        let double = Function::new("double", |this, _| {
            Ok(Value::from(this.get("n").to_number() * 2.0))
        });
        assert_eq!(double.call(&model, vec![]).unwrap(), Value::from(4));
        assert_eq!(double.name(), "double");
    }
}
