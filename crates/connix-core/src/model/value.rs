// ── Property value primitives ──
//
// PropertyValue, DataType, and PropertyFormat are shared by every
// property variant and by the state store. Values round-trip through
// the JSON snapshot as plain scalars.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};

// ── PropertyValue ───────────────────────────────────────────────────

/// A concrete value carried by a property.
///
/// Serializes untagged so the snapshot document stores plain JSON
/// scalars (`true`, `42`, `21.5`, `"on"`), matching the flattened
/// attribute-map contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl PropertyValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => {
                #[allow(clippy::cast_precision_loss)]
                Some(*i as f64)
            }
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a raw JSON scalar into a typed value. Non-scalar JSON
    /// (objects, arrays, null) has no property-value representation.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self::Int(i))
                } else {
                    n.as_f64().map(Self::Float)
                }
            }
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

// ── DataType ────────────────────────────────────────────────────────

/// Declared data type of a property, as persisted in the relational
/// store. Unknown discriminators deserialize to `Unknown` rather than
/// failing the whole record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DataType {
    Bool,
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Float,
    String,
    Enum,
    #[default]
    #[serde(other)]
    Unknown,
}

// ── PropertyFormat ──────────────────────────────────────────────────

/// Value-domain constraint attached to a property definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PropertyFormat {
    #[default]
    None,
    /// Inclusive numeric range.
    Range { min: f64, max: f64 },
    /// Closed set of permitted string values.
    Enumerated(Vec<String>),
}

impl PropertyFormat {
    /// Whether `value` falls inside the declared domain. `None` formats
    /// accept everything; type mismatches are rejected.
    pub fn permits(&self, value: &PropertyValue) -> bool {
        match self {
            Self::None => true,
            Self::Range { min, max } => value
                .as_float()
                .is_some_and(|v| v >= *min && v <= *max),
            Self::Enumerated(values) => value
                .as_text()
                .is_some_and(|s| values.iter().any(|v| v == s)),
        }
    }
}
