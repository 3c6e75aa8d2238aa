//! Payload values and the map aliases built on them.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single field value in a message payload or component state map.
///
/// The bus treats payloads as opaque; only agents and models interpret
/// field shapes. `Float` covers physical quantities (levels, flows),
/// `Bool` covers switch-like commands (`shutdown`, `open`), `Text`
/// covers symbolic commands and ids embedded in payloads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating-point quantity.
    Float(f64),
    /// Symbolic text.
    Text(String),
}

impl Value {
    /// Numeric view: `Float` as-is, `Int` widened. `None` otherwise.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Boolean view. `None` for non-boolean values.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Text view. `None` for non-text values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// A keyed message payload.
///
/// `IndexMap` keeps insertion order, so iterating a payload is
/// deterministic across runs — a requirement for reproducible replay.
pub type Payload = IndexMap<String, Value>;

/// A component state snapshot (named state fields to values).
pub type StateMap = IndexMap<String, Value>;

/// Build a [`Payload`] from key/value pairs.
///
/// ```
/// use sluice_core::payload;
///
/// let p = payload! { "water_level" => 51.3, "outflow" => 12.0 };
/// assert_eq!(p["water_level"].as_f64(), Some(51.3));
/// ```
#[macro_export]
macro_rules! payload {
    () => { $crate::Payload::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::Payload::new();
        $(map.insert(($key).to_owned(), $crate::Value::from($value));)+
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_views() {
        assert_eq!(Value::Float(1.5).as_f64(), Some(1.5));
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Bool(true).as_f64(), None);
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Text("open".into()).as_str(), Some("open"));
    }

    #[test]
    fn payload_macro_preserves_insertion_order() {
        let p = payload! { "b" => 1.0, "a" => 2.0 };
        let keys: Vec<_> = p.keys().cloned().collect();
        assert_eq!(keys, vec!["b".to_owned(), "a".to_owned()]);
    }

    #[test]
    fn value_serializes_untagged() {
        assert_eq!(serde_json::to_string(&Value::Float(2.5)).unwrap(), "2.5");
        assert_eq!(serde_json::to_string(&Value::Bool(true)).unwrap(), "true");
        let back: Value = serde_json::from_str("\"open\"").unwrap();
        assert_eq!(back, Value::Text("open".into()));
    }
}
