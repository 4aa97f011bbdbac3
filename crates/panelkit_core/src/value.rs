//! Dynamic prop values
//!
//! Every prop a widget exposes is a [`Value`]. The enum is deliberately small:
//! - Scalars (null, bool, integer, float, string)
//! - Callbacks (compared by reference, never cloned)
//! - Lists and nested records ([`Props`])
//! - Opaque handles to live UI objects owned by the host runtime
//!
//! Records are ordered so that snapshots and JSON output keep the key order
//! the node type declared.

use std::any::{type_name, Any};
use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{PanelError, Result};

/// An ordered record of prop name to value
pub type Props = IndexMap<String, Value>;

/// Signature of a callback stored in props or registered on an event bus
pub type CallbackFn = dyn Fn(&[Value]);

// ─────────────────────────────────────────────────────────────────────────────
// Value
// ─────────────────────────────────────────────────────────────────────────────

/// A prop value
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A callable, compared by reference identity
    Callback(Callback),
    List(Vec<Value>),
    /// A nested record, diffed key by key during reconciliation
    Map(Props),
    /// A live handle owned by the host runtime, compared by reference identity
    Opaque(OpaqueRef),
}

impl Value {
    /// Short name of the variant, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Callback(_) => "callback",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Opaque(_) => "opaque",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value as f64 (integers are widened)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Props> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            Value::Callback(cb) => Some(cb),
            _ => None,
        }
    }

    pub fn as_opaque(&self) -> Option<&OpaqueRef> {
        match self {
            Value::Opaque(handle) => Some(handle),
            _ => None,
        }
    }

    /// Whether `self` and `other` are the same value for change detection
    ///
    /// Unlike `==`, floats compare by bit pattern, so `NaN` is identical to
    /// itself and `0.0` differs from `-0.0`. Lists and records compare
    /// element by element; callbacks and handles by reference.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.identical(y))
            }
            (Value::Map(a), Value::Map(b)) => props_identical(a, b),
            _ => self == other,
        }
    }

    /// Convert to JSON
    ///
    /// Callbacks and opaque handles have no JSON form and become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Callback(_) | Value::Opaque(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => props_to_json(map),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

/// [`Value::identical`] over whole records, ignoring key order
pub fn props_identical(a: &Props, b: &Props) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .all(|(key, value)| b.get(key).is_some_and(|other| value.identical(other)))
}

/// Optional values are identical when both are absent or both identical
pub(crate) fn identical_opt(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.identical(b),
        (None, None) => true,
        _ => false,
    }
}

/// Build a record from a JSON object
///
/// Fails with [`PanelError::InvalidArgument`] when `json` is not an object.
pub fn props_from_json(json: serde_json::Value) -> Result<Props> {
    match Value::from(json) {
        Value::Map(props) => Ok(props),
        other => Err(PanelError::InvalidArgument(format!(
            "expected a record of props, got {}",
            other.kind()
        ))),
    }
}

/// Convert a record to a JSON object
pub fn props_to_json(props: &Props) -> serde_json::Value {
    serde_json::Value::Object(
        props
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect(),
    )
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<Props> for Value {
    fn from(value: Props) -> Self {
        Value::Map(value)
    }
}

impl From<Callback> for Value {
    fn from(value: Callback) -> Self {
        Value::Callback(value)
    }
}

impl From<OpaqueRef> for Value {
    fn from(value: OpaqueRef) -> Self {
        Value::Opaque(value)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Callback
// ─────────────────────────────────────────────────────────────────────────────

/// A shared callable with a name
///
/// Two callbacks are identical only when they share the same allocation.
/// The name is a weaker identity used by loose event registration: unless one
/// is given explicitly it is the type name of the closure, so every clone of
/// a callback created at the same site shares it.
#[derive(Clone)]
pub struct Callback {
    name: Cow<'static, str>,
    func: Rc<CallbackFn>,
}

impl Callback {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&[Value]) + 'static,
    {
        Self {
            name: Cow::Borrowed(type_name::<F>()),
            func: Rc::new(func),
        }
    }

    pub fn named<F>(name: impl Into<Cow<'static, str>>, func: F) -> Self
    where
        F: Fn(&[Value]) + 'static,
    {
        Self {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the callback
    pub fn call(&self, args: &[Value]) {
        (self.func)(args)
    }

    /// Reference identity
    pub fn ptr_eq(&self, other: &Callback) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").field("name", &self.name).finish()
    }
}

impl TryFrom<Value> for Callback {
    type Error = PanelError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Callback(cb) => Ok(cb),
            other => Err(PanelError::InvalidCallback(format!(
                "expected a callback, got {}",
                other.kind()
            ))),
        }
    }
}

impl TryFrom<&Value> for Callback {
    type Error = PanelError;

    fn try_from(value: &Value) -> Result<Self> {
        Callback::try_from(value.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Opaque handles
// ─────────────────────────────────────────────────────────────────────────────

/// A live object owned by the host UI runtime (e.g. an element handle)
///
/// The props core never looks inside a handle. It compares handles by
/// reference and, when a snapshot is taken, asks the handle to duplicate
/// itself.
pub trait OpaqueHandle: fmt::Debug {
    /// Produce an independent copy using the host's own cloning facility
    fn duplicate(&self) -> Box<dyn OpaqueHandle>;

    /// Unique identifier carried by the handle, if any
    fn id(&self) -> Option<&str> {
        None
    }

    /// Replace the identifier (called on fresh duplicates only)
    fn set_id(&mut self, _id: String) {}

    fn as_any(&self) -> &dyn Any;
}

/// Shared reference to an [`OpaqueHandle`]
#[derive(Clone)]
pub struct OpaqueRef(Rc<dyn OpaqueHandle>);

impl OpaqueRef {
    pub fn new<H: OpaqueHandle + 'static>(handle: H) -> Self {
        Self(Rc::new(handle))
    }

    pub fn from_box(handle: Box<dyn OpaqueHandle>) -> Self {
        Self(Rc::from(handle))
    }

    pub fn handle(&self) -> &dyn OpaqueHandle {
        self.0.as_ref()
    }

    pub fn id(&self) -> Option<&str> {
        self.0.id()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Reference identity
    pub fn ptr_eq(&self, other: &OpaqueRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for OpaqueRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for OpaqueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OpaqueRef").field(&self.0).finish()
    }
}
