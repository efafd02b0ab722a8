//! Dynamic SQL values.
//!
//! `Value` is the single currency for model attributes, query bindings and
//! result row cells. A closed enum keeps the set of representable types
//! explicit; drivers convert their native column types into it.
//!
//! Raw SQL fragments travel through the same channel as [`Expression`]. The
//! query grammar prints an expression verbatim and never binds it.

use std::fmt;

use serde::{Serialize, Serializer};

/// A raw SQL fragment that is emitted literally instead of being bound.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Expression(String);

impl Expression {
    /// Wrap raw SQL text.
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    /// The SQL text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A dynamically-typed SQL value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// SQL NULL.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit signed integer.
    BigInt(i64),
    /// Double precision float.
    Double(f64),
    /// Text.
    Text(String),
    /// Binary blob.
    Bytes(Vec<u8>),
    /// JSON document.
    Json(serde_json::Value),
    /// Raw SQL, never bound.
    Expression(Expression),
}

impl Value {
    /// Whether this is SQL NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this is a raw expression.
    #[must_use]
    pub fn is_expression(&self) -> bool {
        matches!(self, Value::Expression(_))
    }

    /// Integer view of the value, if it has one.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Floating point view of the value, if numeric.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(f64::from(*v)),
            Value::BigInt(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Text view of the value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Expression(e) => Some(e.as_str()),
            _ => None,
        }
    }

    /// Boolean view of the value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(v) => Some(*v != 0),
            Value::BigInt(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Short name of the variant, used in diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::BigInt(_) => "bigint",
            Value::Double(_) => "double",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Json(_) => "json",
            Value::Expression(_) => "expression",
        }
    }

    /// Convert into a JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(v) => serde_json::Value::from(*v),
            Value::BigInt(v) => serde_json::Value::from(*v),
            Value::Double(v) => serde_json::Number::from_f64(*v)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => {
                serde_json::Value::Array(b.iter().map(|x| serde_json::Value::from(*x)).collect())
            }
            Value::Json(j) => j.clone(),
            Value::Expression(e) => serde_json::Value::String(e.as_str().to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str(""),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Json(j) => write!(f, "{j}"),
            Value::Expression(e) => f.write_str(e.as_str()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(v) => serializer.serialize_i32(*v),
            Value::BigInt(v) => serializer.serialize_i64(*v),
            Value::Double(v) => serializer.serialize_f64(*v),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::Json(j) => j.serialize(serializer),
            Value::Expression(e) => serializer.serialize_str(e.as_str()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::BigInt(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl From<Expression> for Value {
    fn from(v: Expression) -> Self {
        Value::Expression(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A scalar key used to correlate parents and children during eager loading.
///
/// Integer widths collapse into one variant so that an `Int` primary key
/// matches a `BigInt` foreign key coming back from the driver. Text in
/// canonical integer form (`"42"`, not `"042"` or `"+42"`) is read as an
/// integer too, so a driver returning integral keys as text still matches.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    /// Integral key.
    Int(i64),
    /// Textual key (UUIDs, natural keys).
    Text(String),
}

impl Key {
    /// Extract a key from a value. NULL and non-scalar values have no key.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Int(v) => Some(Key::Int(i64::from(*v))),
            Value::BigInt(v) => Some(Key::Int(*v)),
            Value::Text(s) => Some(
                s.parse::<i64>()
                    .ok()
                    .filter(|n| n.to_string() == *s)
                    .map_or_else(|| Key::Text(s.clone()), Key::Int),
            ),
            _ => None,
        }
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        match key {
            Key::Int(v) => Value::BigInt(v),
            Key::Text(s) => Value::Text(s),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(v) => write!(f, "{v}"),
            Key::Text(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_into_value() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".into()));
    }

    #[test]
    fn test_numeric_views() {
        assert_eq!(Value::Int(3).as_i64(), Some(3));
        assert_eq!(Value::BigInt(-7).as_f64(), Some(-7.0));
        assert_eq!(Value::Text("a".into()).as_i64(), None);
        assert_eq!(Value::Int(0).as_bool(), Some(false));
    }

    #[test]
    fn test_key_collapses_integer_widths() {
        assert_eq!(Key::from_value(&Value::Int(5)), Key::from_value(&Value::BigInt(5)));
        assert_eq!(Key::from_value(&Value::Null), None);
        assert_eq!(Key::from_value(&Value::Double(1.5)), None);
    }

    #[test]
    fn test_key_reads_integral_text_as_integer() {
        assert_eq!(Key::from_value(&Value::from("42")), Key::from_value(&Value::Int(42)));
        assert_eq!(Key::from_value(&Value::from("-7")), Some(Key::Int(-7)));
        assert_eq!(
            Key::from_value(&Value::from("042")),
            Some(Key::Text("042".to_string()))
        );
        assert_eq!(
            Key::from_value(&Value::from("abc")),
            Some(Key::Text("abc".to_string()))
        );
    }

    #[test]
    fn test_key_ordering_sorts_integers_numerically() {
        let mut keys = vec![Key::Int(10), Key::Int(2), Key::Int(7)];
        keys.sort();
        assert_eq!(keys, vec![Key::Int(2), Key::Int(7), Key::Int(10)]);
    }

    #[test]
    fn test_value_serializes_to_json() {
        let json = serde_json::to_string(&vec![
            Value::Int(1),
            Value::Null,
            Value::Text("a".into()),
        ])
        .unwrap();
        assert_eq!(json, r#"[1,null,"a"]"#);
        assert_eq!(Value::Double(1.5).to_json(), serde_json::json!(1.5));
    }

    #[test]
    fn test_expression_display() {
        let v = Value::from(Expression::new("count(*)"));
        assert!(v.is_expression());
        assert_eq!(v.to_string(), "count(*)");
    }
}
