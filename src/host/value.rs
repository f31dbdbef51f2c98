//! Host values.
//!
//! The host framework is dynamically typed. `Value` covers what it can hand
//! the engine: primitives, composites with reference identity, and reactive
//! handles stored as values.
//!
//! Equality on `Value` is the framework's strict equality: primitives compare
//! by value, composites and handles by identity.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use super::handle::{HandleId, ReactiveHandle};

/// Shared array with reference identity.
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

/// Shared keyed object with reference identity.
pub type ObjectRef = Rc<RefCell<BTreeMap<String, Value>>>;

// =============================================================================
// Value
// =============================================================================

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Handle(ReactiveHandle),
}

/// Coarse runtime type, used to reject comparisons across types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Undefined,
    Null,
    Bool,
    Number,
    Str,
    Array,
    Object,
    Handle,
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    /// Create a fresh array (new identity).
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    /// Create a fresh keyed object (new identity).
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        let map = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Value::Object(Rc::new(RefCell::new(map)))
    }

    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Undefined => TypeTag::Undefined,
            Value::Null => TypeTag::Null,
            Value::Bool(_) => TypeTag::Bool,
            Value::Number(_) => TypeTag::Number,
            Value::Str(_) => TypeTag::Str,
            Value::Array(_) => TypeTag::Array,
            Value::Object(_) => TypeTag::Object,
            Value::Handle(_) => TypeTag::Handle,
        }
    }

    /// Identity of a composite or handle. Primitives have none.
    pub fn identity(&self) -> Option<HandleId> {
        match self {
            Value::Array(a) => Some(HandleId::of(a)),
            Value::Object(o) => Some(HandleId::of(o)),
            Value::Handle(h) => Some(h.id()),
            _ => None,
        }
    }

    /// Strict equality: `===` for primitives, identity for everything else.
    ///
    /// `NaN` is not equal to itself.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Handle(a), Value::Handle(b)) => a.id() == b.id(),
            _ => false,
        }
    }

    /// Strip every tracked-object wrapper and return the raw value underneath.
    pub fn unwrap_raw(&self) -> Value {
        match self {
            Value::Handle(ReactiveHandle::Object(obj)) => obj.raw().unwrap_raw(),
            other => other.clone(),
        }
    }

    /// Read `key` from an array or object. Missing entries are `Undefined`.
    pub fn get_property(&self, key: &str) -> Value {
        match self.unwrap_raw() {
            Value::Object(map) => map
                .try_borrow()
                .ok()
                .and_then(|m| m.get(key).cloned())
                .unwrap_or_default(),
            Value::Array(items) => {
                let Ok(index) = key.parse::<usize>() else {
                    return Value::Undefined;
                };
                items
                    .try_borrow()
                    .ok()
                    .and_then(|v| v.get(index).cloned())
                    .unwrap_or_default()
            }
            _ => Value::Undefined,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&ReactiveHandle> {
        match self {
            Value::Handle(h) => Some(h),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::str(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Rc::from(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<ReactiveHandle> for Value {
    fn from(value: ReactiveHandle) -> Self {
        Value::Handle(value)
    }
}

/// Builds fresh composites; every array and object gets a new identity.
impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => Value::array(items.into_iter().map(Value::from)),
            serde_json::Value::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

// =============================================================================
// Formatting
// =============================================================================

const DEBUG_DEPTH: usize = 4;

fn write_value(f: &mut fmt::Formatter<'_>, value: &Value, depth: usize) -> fmt::Result {
    match value {
        Value::Undefined => f.write_str("undefined"),
        Value::Null => f.write_str("null"),
        Value::Bool(b) => write!(f, "{b}"),
        Value::Number(n) if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 => {
            write!(f, "{}", *n as i64)
        }
        Value::Number(n) => write!(f, "{n}"),
        Value::Str(s) => write!(f, "{s:?}"),
        Value::Array(items) => {
            let Ok(items) = items.try_borrow() else {
                return f.write_str("[<busy>]");
            };
            if depth == 0 {
                return write!(f, "[… {} items]", items.len());
            }
            f.write_str("[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_value(f, item, depth - 1)?;
            }
            f.write_str("]")
        }
        Value::Object(map) => {
            let Ok(map) = map.try_borrow() else {
                return f.write_str("{<busy>}");
            };
            if depth == 0 {
                return write!(f, "{{… {} keys}}", map.len());
            }
            f.write_str("{")?;
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{k}: ")?;
                write_value(f, v, depth - 1)?;
            }
            f.write_str("}")
        }
        Value::Handle(h) => write!(f, "{h:?}"),
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, DEBUG_DEPTH)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            other => write_value(f, other, DEBUG_DEPTH),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_as_handle() {
        let cell = crate::host::ValueCell::new(1);
        let value = Value::from(cell.clone());
        assert_eq!(value.as_handle().map(|h| h.id()), Some(cell.id()));
        assert!(Value::from(json!({})).as_handle().is_none());
    }

    #[test]
    fn test_strict_eq_primitives() {
        assert!(Value::from(5).strict_eq(&Value::from(5.0)));
        assert!(Value::from("a").strict_eq(&Value::from("a")));
        assert!(!Value::from(1).strict_eq(&Value::from("1")));
        assert!(!Value::Number(f64::NAN).strict_eq(&Value::Number(f64::NAN)));
    }

    #[test]
    fn test_composites_compare_by_identity() {
        let a = Value::from(json!([1, 2]));
        let b = Value::from(json!([1, 2]));
        assert!(a.strict_eq(&a.clone()));
        assert!(!a.strict_eq(&b));
    }

    #[test]
    fn test_get_property() {
        let obj = Value::from(json!({"a": 1, "list": [10, 20]}));
        assert_eq!(obj.get_property("a"), Value::from(1));
        assert!(obj.get_property("missing").is_undefined());

        let list = obj.get_property("list");
        assert_eq!(list.get_property("1"), Value::from(20));
        assert!(list.get_property("x").is_undefined());
    }

    #[test]
    fn test_display() {
        let v = Value::from(json!({"n": 3, "s": "hi", "l": [true, null]}));
        assert_eq!(v.to_string(), r#"{l: [true, null], n: 3, s: "hi"}"#);
        assert_eq!(Value::from("plain").to_string(), "plain");
        assert_eq!(Value::Undefined.to_string(), "undefined");
    }
}
