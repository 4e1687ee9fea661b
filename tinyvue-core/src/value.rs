//! Dynamic values.
//!
//! Templates evaluate loosely typed expressions, so bindings, props and
//! expression results share one dynamic [`Value`] type. Its coercions follow
//! the usual script-language rules: `undefined`/`null`/`0`/`""`/`NaN` are
//! falsy, `+` concatenates when either side is a string, and numbers print
//! without a trailing `.0`.
//!
//! Plain arrays and objects are immutable and cheap to clone. Shared,
//! observable state is a [`ReactiveObject`] instead.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::dom::Node;
use crate::error::EvalError;
use crate::proxy::ReactiveObject;
use crate::reactive::{Memo, Signal};

/// Signature of a native function callable from expressions and templates.
pub type NativeFn = dyn Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync;

/// A callable value: an event handler, a method exposed in bindings, a
/// builtin, or an arrow function from an expression.
#[derive(Clone)]
pub struct Function {
    name: Arc<str>,
    f: Arc<NativeFn>,
}

impl Function {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Self::named("anonymous", f)
    }

    pub fn named<F>(name: &str, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            f: Arc::new(f),
        }
    }

    /// Wrap a handler that returns nothing.
    pub fn handler<F>(f: F) -> Self
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        Self::new(move |args| {
            f(args);
            Ok(Value::Undefined)
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        (self.f)(args)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.f, &other.f)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.name)
    }
}

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Arc<Vec<Value>>),
    Object(Arc<IndexMap<String, Value>>),
    Function(Function),
    Reactive(ReactiveObject),
    Signal(Signal<Value>),
    Computed(Memo<Value>),
    Node(Node),
}

impl Value {
    pub fn array<I: IntoIterator<Item = Value>>(items: I) -> Self {
        Value::Array(Arc::new(items.into_iter().collect()))
    }

    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Unwrap signal-like values to their current (tracked) value.
    pub fn resolve(&self) -> Value {
        match self {
            Value::Signal(s) => s.get(),
            Value::Computed(c) => c.get(),
            other => other.clone(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            _ => "object",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
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

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_reactive(&self) -> Option<&ReactiveObject> {
        match self {
            Value::Reactive(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(n) => Some(n),
            _ => None,
        }
    }

    /// Items of a sequence-shaped value, if it is one. Reads of a reactive
    /// sequence are tracked.
    pub fn as_sequence(&self) -> Option<Vec<Value>> {
        match self {
            Value::Array(items) => Some(items.as_ref().clone()),
            Value::Reactive(r) if r.is_array() => Some(r.values()),
            Value::Signal(_) | Value::Computed(_) => self.resolve().as_sequence(),
            _ => None,
        }
    }

    /// Key/value entries of a mapping-shaped value, if it is one.
    pub fn as_entries(&self) -> Option<Vec<(String, Value)>> {
        match self {
            Value::Object(map) => Some(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            Value::Reactive(r) if !r.is_array() => Some(r.entries()),
            Value::Signal(_) | Value::Computed(_) => self.resolve().as_entries(),
            _ => None,
        }
    }

    /// Numeric conversion (`Number(x)`).
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => parse_number(s),
            Value::Array(items) => match items.len() {
                0 => 0.0,
                1 => items[0].to_number(),
                _ => f64::NAN,
            },
            Value::Signal(_) | Value::Computed(_) => self.resolve().to_number(),
            _ => f64::NAN,
        }
    }

    /// Text used by `{{ }}` interpolation: `null` and `undefined` render empty.
    pub fn to_text(&self) -> String {
        if self.is_nullish() {
            String::new()
        } else {
            self.to_string()
        }
    }

    /// Attribute text for dynamic attribute bindings.
    ///
    /// Arrays are space-joined; mapping values keep the keys whose values are
    /// truthy, which is how class-name maps work.
    pub fn to_attribute_value(&self) -> String {
        if let Some(items) = self.as_sequence() {
            return items
                .iter()
                .map(Value::to_attribute_value)
                .collect::<Vec<_>>()
                .join(" ");
        }
        if let Some(entries) = self.as_entries() {
            return entries
                .into_iter()
                .filter(|(_, v)| v.is_truthy())
                .map(|(k, _)| k)
                .collect::<Vec<_>>()
                .join(" ");
        }
        self.to_string()
    }

    /// `===`
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Reactive(a), Value::Reactive(b)) => a.ptr_eq(b),
            (Value::Signal(a), Value::Signal(b)) => a.ptr_eq(b),
            (Value::Computed(a), Value::Computed(b)) => a.ptr_eq(b),
            (Value::Node(a), Value::Node(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// `==`
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => self.to_number() == other.to_number(),
            (Value::Signal(_) | Value::Computed(_), _) => self.resolve().loose_equals(other),
            (_, Value::Signal(_) | Value::Computed(_)) => self.loose_equals(&other.resolve()),
            _ => self.strict_equals(other),
        }
    }

    /// Convert to JSON, reading reactive containers.
    ///
    /// Values with no JSON form become `null` in arrays and are skipped in
    /// objects.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Undefined | Value::Function(_) | Value::Node(_) => Json::Null,
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => Json::from(*n as i64),
            Value::Number(n) => serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number),
            Value::String(s) => Json::String(s.clone()),
            Value::Signal(_) | Value::Computed(_) => self.resolve().to_json(),
            _ => {
                if let Some(items) = self.as_sequence() {
                    Json::Array(items.iter().map(Value::to_json).collect())
                } else if let Some(entries) = self.as_entries() {
                    Json::Object(
                        entries
                            .into_iter()
                            .filter(|(_, v)| !matches!(v, Value::Undefined | Value::Function(_)))
                            .map(|(k, v)| (k, v.to_json()))
                            .collect(),
                    )
                } else {
                    Json::Null
                }
            }
        }
    }
}

/// Parse a string as a number the way `Number(s)` does.
pub(crate) fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => trimmed.parse::<f64>().unwrap_or(f64::NAN),
    }
}

/// Format a number the way script engines print it.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    /// `String(x)`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
            Value::Function(func) => write!(f, "function {}() {{ [native code] }}", func.name()),
            Value::Signal(_) | Value::Computed(_) => write!(f, "{}", self.resolve()),
            Value::Node(_) => f.write_str("[object HTMLElement]"),
            Value::Array(_) | Value::Object(_) | Value::Reactive(_) => {
                if let Some(items) = self.as_sequence() {
                    let parts: Vec<String> = items.iter().map(Value::to_text).collect();
                    f.write_str(&parts.join(","))
                } else {
                    f.write_str("[object Object]")
                }
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Array(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Object(map) => f.debug_map().entries(map.iter()).finish(),
            Value::Function(func) => fmt::Debug::fmt(func, f),
            Value::Reactive(r) => fmt::Debug::fmt(r, f),
            Value::Signal(s) => write!(f, "Signal({:?})", s.get_untracked()),
            Value::Computed(c) => write!(f, "Computed({:?})", c.state()),
            Value::Node(n) => fmt::Debug::fmt(n, f),
        }
    }
}

impl PartialEq for Value {
    /// Structural equality for plain data, identity for shared handles.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => self.strict_equals(other),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::array(items.into_iter().map(Value::from)),
            Json::Object(map) => Value::object(map.into_iter().map(|(k, v)| (k, Value::from(v)))),
        }
    }
}

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

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(items))
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<ReactiveObject> for Value {
    fn from(r: ReactiveObject) -> Self {
        Value::Reactive(r)
    }
}

impl From<Signal<Value>> for Value {
    fn from(s: Signal<Value>) -> Self {
        Value::Signal(s)
    }
}

impl From<Memo<Value>> for Value {
    fn from(m: Memo<Value>) -> Self {
        Value::Computed(m)
    }
}

impl From<Node> for Value {
    fn from(n: Node) -> Self {
        Value::Node(n)
    }
}
