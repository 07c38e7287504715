//! Values produced by generated parsers
//!
//! A parse produces a tree of [`Value`]s: matched text becomes
//! [`Value::String`], sequences and repetitions become [`Value::Array`],
//! and action code may build anything else. The operand stack of the
//! abstract machine holds [`Slot`]s, which add the two machine-only states
//! (a saved input position and the failure sentinel) on top of values.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A value in a parse result
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Result of a predicate that matched
    #[default]
    Undefined,
    /// Result of an optional expression that did not match
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// String value (matched text)
    String(String),
    /// Array of values (sequence or repetition)
    Array(Vec<Value>),
    /// Key-value pairs built by action code
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Create a string value
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Create an array value
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(items)
    }

    /// Create an object value
    pub fn object(pairs: Vec<(impl Into<String>, Value)>) -> Self {
        Value::Object(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Check if this is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this is undefined
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Truthiness as seen by semantic predicates
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    /// Get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as array
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Get an object field by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Get an array element by index
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        match self {
            Value::Array(arr) => arr.get(index),
            _ => None,
        }
    }

    /// Serialize to JSON (undefined becomes `null`)
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
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

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Object(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// One entry of the abstract machine's operand stack
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Slot {
    /// The failure sentinel
    #[default]
    Failed,
    /// A saved input position (byte offset)
    Pos(usize),
    /// A matched or computed value
    Value(Value),
}

impl Slot {
    /// Wrap a value
    #[inline]
    pub fn value(value: impl Into<Value>) -> Self {
        Slot::Value(value.into())
    }

    /// An empty array, the accumulator of repetitions
    #[inline]
    pub fn empty_array() -> Self {
        Slot::Value(Value::Array(Vec::new()))
    }

    /// Whether this is the failure sentinel
    #[inline]
    pub fn is_failed(&self) -> bool {
        matches!(self, Slot::Failed)
    }

    /// Truthiness of the held value (positions count as truthy)
    #[inline]
    pub fn is_truthy(&self) -> bool {
        match self {
            Slot::Failed => false,
            Slot::Pos(_) => true,
            Slot::Value(v) => v.is_truthy(),
        }
    }

    /// The saved position, if this slot holds one
    #[inline]
    pub fn as_pos(&self) -> Option<usize> {
        match self {
            Slot::Pos(p) => Some(*p),
            _ => None,
        }
    }

    /// Length of the held array (0 for anything else)
    #[inline]
    pub fn array_len(&self) -> usize {
        match self {
            Slot::Value(Value::Array(items)) => items.len(),
            _ => 0,
        }
    }

    /// Append another slot's value to the held array
    pub fn push(&mut self, item: Slot) {
        if let Slot::Value(Value::Array(items)) = self {
            items.push(item.into_value());
        }
    }

    /// Move the slot out, leaving the failure sentinel behind
    #[inline]
    pub fn take(&mut self) -> Slot {
        std::mem::take(self)
    }

    /// Clone the held value (action arguments)
    pub fn to_value(&self) -> Value {
        match self {
            Slot::Value(v) => v.clone(),
            Slot::Pos(p) => Value::Int(*p as i64),
            Slot::Failed => Value::Undefined,
        }
    }

    /// Convert into a plain value
    pub fn into_value(self) -> Value {
        match self {
            Slot::Value(v) => v,
            Slot::Pos(p) => Value::Int(p as i64),
            Slot::Failed => Value::Undefined,
        }
    }

    /// Wrap several slots into an array value
    pub fn wrap(items: Vec<Slot>) -> Self {
        Slot::Value(Value::Array(
            items.into_iter().map(Slot::into_value).collect(),
        ))
    }
}

impl From<Value> for Slot {
    fn from(value: Value) -> Self {
        Slot::Value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::string("x").is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(Value::array(vec![]).is_truthy());
    }

    #[test]
    fn test_slot_array_ops() {
        let mut acc = Slot::empty_array();
        acc.push(Slot::value("a"));
        acc.push(Slot::value("b"));
        assert_eq!(acc.array_len(), 2);
        assert_eq!(
            acc.into_value(),
            Value::array(vec![Value::string("a"), Value::string("b")])
        );
    }

    #[test]
    fn test_slot_take_leaves_failed() {
        let mut slot = Slot::value("x");
        let taken = slot.take();
        assert!(slot.is_failed());
        assert_eq!(taken, Slot::value("x"));
    }

    #[test]
    fn test_json_undefined_is_null() {
        let v = Value::array(vec![Value::Undefined, Value::Null, Value::string("a")]);
        assert_eq!(v.to_json().unwrap(), r#"[null,null,"a"]"#);
    }

    #[test]
    fn test_display() {
        let v = Value::object(vec![("k", Value::Int(1))]);
        assert_eq!(v.to_string(), r#"{"k": 1}"#);
    }
}
