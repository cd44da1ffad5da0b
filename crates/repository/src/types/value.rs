//! Literal values and field types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The declared type of an entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// UTF-8 text.
    Text,
    /// 32-bit signed integer.
    Integer,
    /// 64-bit signed integer.
    Long,
    /// Boolean flag.
    Boolean,
    /// 64-bit float.
    Double,
    /// 32-bit float.
    Float,
    /// UTC timestamp.
    Timestamp,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Long => "long",
            FieldType::Boolean => "boolean",
            FieldType::Double => "double",
            FieldType::Float => "float",
            FieldType::Timestamp => "timestamp",
        };
        write!(f, "{}", name)
    }
}

/// A literal value held by a query operand or read from an entity field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    /// Absent value.
    Null,
    /// Text literal. Literals parsed from filter text are always text.
    Text(String),
    /// 32-bit integer.
    Integer(i32),
    /// 64-bit integer.
    Long(i64),
    /// Boolean.
    Boolean(bool),
    /// 64-bit float.
    Double(f64),
    /// 32-bit float.
    Float(f32),
    /// UTC timestamp.
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The literal's plain string form, as written in a filter.
    pub fn literal(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Text(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Long(l) => l.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Double(d) => d.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Timestamp(ts) => ts.to_rfc3339(),
        }
    }

    /// Returns the value as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value widened to `i64`, if it is integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(i64::from(*i)),
            Value::Long(l) => Some(*l),
            _ => None,
        }
    }

    /// Returns the value widened to `f64`, if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(f64::from(*i)),
            Value::Long(l) => Some(*l as f64),
            Value::Double(d) => Some(*d),
            Value::Float(f) => Some(f64::from(*f)),
            _ => None,
        }
    }
}

fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.eq_ignore_ascii_case("null")
        || s.chars()
            .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | ',' | '"' | '\''))
}

/// Formats the value as it appears in a query definition.
///
/// Text containing whitespace, parentheses, commas or quotes is quoted so the
/// definition parses back to the same literal. So is the text `null`, which
/// would otherwise read back as the null literal.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) if needs_quotes(s) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    if c == '"' || c == '\\' {
                        write!(f, "\\")?;
                    }
                    write!(f, "{}", c)?;
                }
                write!(f, "\"")
            }
            other => write!(f, "{}", other.literal()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i)
    }
}

impl From<i64> for Value {
    fn from(l: i64) -> Self {
        Value::Long(l)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

impl<V: Into<Value>> From<Option<V>> for Value {
    fn from(v: Option<V>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A Rust type that can be stored in an entity field.
///
/// Implemented for the supported scalar types and for `Option` of each,
/// where `None` maps to [`Value::Null`].
pub trait FieldValue: Sized {
    /// The declared field type.
    const FIELD_TYPE: FieldType;

    /// Converts the field to a value.
    fn to_value(&self) -> Value;

    /// Converts a stored value back, returning `None` on a type mismatch.
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! field_value {
    ($ty:ty, $field_type:ident, $variant:ident) => {
        impl FieldValue for $ty {
            const FIELD_TYPE: FieldType = FieldType::$field_type;

            fn to_value(&self) -> Value {
                Value::$variant(self.clone())
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

field_value!(String, Text, Text);
field_value!(i32, Integer, Integer);
field_value!(bool, Boolean, Boolean);
field_value!(f32, Float, Float);
field_value!(DateTime<Utc>, Timestamp, Timestamp);

impl FieldValue for i64 {
    const FIELD_TYPE: FieldType = FieldType::Long;

    fn to_value(&self) -> Value {
        Value::Long(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FieldValue for f64 {
    const FIELD_TYPE: FieldType = FieldType::Double;

    fn to_value(&self) -> Value {
        Value::Double(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Double(d) => Some(d),
            Value::Float(f) => Some(f64::from(f)),
            _ => None,
        }
    }
}

impl<V: FieldValue> FieldValue for Option<V> {
    const FIELD_TYPE: FieldType = V::FIELD_TYPE;

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, V::to_value)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => V::from_value(other).map(Some),
        }
    }
}
