//! Decoded JSON field values.
//!
//! Numbers keep their source lexeme so that `3` and `3.0` stay distinguishable:
//! a lexeme with a decimal point is a float, anything else must parse as an
//! integer or the field is skipped.

use serde_json::{Map, Value as JsonValue};

/// One key/value pair of a decoded JSON object, in document order.
pub type JsonObject = Vec<(String, FieldValue)>;

/// Runtime type of a decoded JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Bool(bool),
    Number(NumberLexeme),
    Null,
    /// Nested object or array, re-serialized to JSON text.
    Composite(String),
}

/// A JSON number exactly as it appeared in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberLexeme(String);

impl NumberLexeme {
    pub fn new(lexeme: impl Into<String>) -> Self {
        Self(lexeme.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the lexeme contains a decimal point.
    pub fn is_float(&self) -> bool {
        self.0.contains('.')
    }

    /// Numeric value for the float-valued column.
    ///
    /// Integers that overflow `i64`, exponent forms without a decimal point
    /// and non-finite floats yield `None`.
    pub fn to_f64(&self) -> Option<f64> {
        if self.is_float() {
            self.0.parse::<f64>().ok().filter(|v| v.is_finite())
        } else {
            self.0.parse::<i64>().ok().map(|v| v as f64)
        }
    }
}

impl FieldValue {
    fn from_json(value: JsonValue) -> Option<Self> {
        let converted = match value {
            JsonValue::String(s) => Self::String(s),
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => Self::Number(NumberLexeme(n.to_string())),
            JsonValue::Null => Self::Null,
            composite @ (JsonValue::Array(_) | JsonValue::Object(_)) => {
                Self::Composite(serde_json::to_string(&composite).ok()?)
            }
        };
        Some(converted)
    }
}

/// Decodes `text` as a JSON object. Returns `None` if it is not one.
pub fn decode_object(text: &str) -> Option<JsonObject> {
    let map: Map<String, JsonValue> = serde_json::from_str(text).ok()?;

    Some(
        map.into_iter()
            .filter_map(|(key, value)| FieldValue::from_json(value).map(|v| (key, v)))
            .collect(),
    )
}
