// ── Tag values ──
//
// Controller values arrive as loosely typed JSON plus an optional IEC
// type string (`BOOL`, `INT`, `REAL`, ...). `TagValue` is the closed set
// of shapes the rest of the crate works with.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::error::CoreError;

// ── ValueKind ────────────────────────────────────────────────────────

/// The broad shape of a tag value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Bool,
    Int,
    Real,
    Text,
}

impl ValueKind {
    /// Map an IEC 61131-3 elementary type name onto a kind.
    ///
    /// Unknown or empty names return `None`; the JSON shape decides then.
    pub fn from_declared_type(declared: &str) -> Option<Self> {
        let upper = declared.trim().to_ascii_uppercase();
        match upper.as_str() {
            "BOOL" => Some(Self::Bool),
            "SINT" | "INT" | "DINT" | "LINT" | "USINT" | "UINT" | "UDINT" | "ULINT" | "BYTE"
            | "WORD" | "DWORD" | "LWORD" => Some(Self::Int),
            "REAL" | "LREAL" => Some(Self::Real),
            "STRING" | "WSTRING" => Some(Self::Text),
            _ => None,
        }
    }
}

// ── TagValue ─────────────────────────────────────────────────────────

/// A scalar controller value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
}

impl TagValue {
    /// Interpret a wire value, guided by its declared type when known.
    ///
    /// `null`, arrays and objects are not tag values and yield `None`.
    pub fn from_json(value: &Value, declared_type: &str) -> Option<Self> {
        if matches!(value, Value::Null | Value::Array(_) | Value::Object(_)) {
            return None;
        }

        match (ValueKind::from_declared_type(declared_type), value) {
            (Some(ValueKind::Bool), Value::Number(n)) => {
                Some(Self::Bool(n.as_f64().is_some_and(|f| f != 0.0)))
            }
            (Some(ValueKind::Bool), Value::String(s)) => {
                Some(parse_bool(s).map_or_else(|| Self::Text(s.clone()), Self::Bool))
            }
            (Some(ValueKind::Real), Value::Number(n)) => n.as_f64().map(Self::Real),
            (Some(ValueKind::Text), Value::String(s)) => Some(Self::Text(s.clone())),
            (Some(ValueKind::Text), other) => Some(Self::Text(other.to_string())),
            (_, Value::Bool(b)) => Some(Self::Bool(*b)),
            (_, Value::Number(n)) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Real)),
            (_, Value::String(s)) => Some(Self::Text(s.clone())),
            (_, Value::Null | Value::Array(_) | Value::Object(_)) => None,
        }
    }

    /// Parse user input, e.g. a CLI argument.
    ///
    /// With a declared type the input must fit it. Without one the
    /// narrowest fitting kind wins: bool, then int, then real, then text.
    pub fn parse_literal(input: &str, declared_type: Option<&str>) -> Result<Self, CoreError> {
        let trimmed = input.trim();
        let invalid = |expected: &str| CoreError::InvalidValue {
            input: input.to_owned(),
            expected: expected.to_owned(),
        };

        match declared_type.and_then(ValueKind::from_declared_type) {
            Some(ValueKind::Bool) => parse_bool(trimmed)
                .map(Self::Bool)
                .ok_or_else(|| invalid("BOOL")),
            Some(ValueKind::Int) => trimmed.parse().map(Self::Int).map_err(|_| invalid("INT")),
            Some(ValueKind::Real) => trimmed.parse().map(Self::Real).map_err(|_| invalid("REAL")),
            Some(ValueKind::Text) => Ok(Self::Text(input.to_owned())),
            None => Ok(parse_bool(trimmed)
                .map(Self::Bool)
                .or_else(|| trimmed.parse().ok().map(Self::Int))
                .or_else(|| trimmed.parse().ok().map(Self::Real))
                .unwrap_or_else(|| Self::Text(input.to_owned()))),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Real(_) => ValueKind::Real,
            Self::Text(_) => ValueKind::Text,
        }
    }

    /// Truthiness used by switch controls.
    pub fn as_bool(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Real(f) => *f != 0.0,
            Self::Text(s) => parse_bool(s).unwrap_or(!s.is_empty()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Real(f) => Value::from(*f),
            Self::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for TagValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" => Some(true),
        "false" | "0" | "off" => Some(false),
        _ => None,
    }
}

// ── Keys and updates ─────────────────────────────────────────────────

/// Identity of a variable: `(device, variable)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariableKey {
    pub device_id: String,
    pub variable: String,
}

impl VariableKey {
    pub fn new(device_id: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            variable: variable.into(),
        }
    }
}

impl fmt::Display for VariableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device_id, self.variable)
    }
}

/// What a subscriber callback receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableUpdate {
    pub device_id: String,
    pub variable: String,
    pub value: TagValue,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub declared_type: String,
}

impl VariableUpdate {
    pub fn key(&self) -> VariableKey {
        VariableKey::new(self.device_id.clone(), self.variable.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn declared_bool_accepts_numeric_flags() {
        assert_eq!(TagValue::from_json(&json!(1), "BOOL"), Some(TagValue::Bool(true)));
        assert_eq!(TagValue::from_json(&json!(0), "bool"), Some(TagValue::Bool(false)));
    }

    #[test]
    fn real_stays_real_even_when_integral() {
        assert_eq!(TagValue::from_json(&json!(21), "REAL"), Some(TagValue::Real(21.0)));
        assert_eq!(TagValue::from_json(&json!(21.5), ""), Some(TagValue::Real(21.5)));
    }

    #[test]
    fn untyped_values_follow_json_shape() {
        assert_eq!(TagValue::from_json(&json!(true), ""), Some(TagValue::Bool(true)));
        assert_eq!(TagValue::from_json(&json!(7), "UDT_MOTOR"), Some(TagValue::Int(7)));
        assert_eq!(
            TagValue::from_json(&json!("idle"), ""),
            Some(TagValue::Text("idle".into()))
        );
    }

    #[test]
    fn temporal_and_char_types_follow_json_shape() {
        assert_eq!(TagValue::from_json(&json!(1000), "TIME"), Some(TagValue::Int(1000)));
        assert_eq!(TagValue::from_json(&json!(65), "CHAR"), Some(TagValue::Int(65)));
        assert_eq!(
            TagValue::from_json(&json!("T#5s"), "TIME"),
            Some(TagValue::Text("T#5s".into()))
        );
        assert_eq!(ValueKind::from_declared_type("DATE"), None);
        assert_eq!(
            TagValue::parse_literal("250", Some("TIME")).unwrap(),
            TagValue::Int(250)
        );
    }

    #[test]
    fn structured_values_are_rejected() {
        assert_eq!(TagValue::from_json(&Value::Null, "INT"), None);
        assert_eq!(TagValue::from_json(&json!([1, 2]), ""), None);
        assert_eq!(TagValue::from_json(&json!({"a": 1}), ""), None);
    }

    #[test]
    fn literal_inference_prefers_narrowest_kind() {
        assert_eq!(TagValue::parse_literal("true", None).unwrap(), TagValue::Bool(true));
        assert_eq!(TagValue::parse_literal("42", None).unwrap(), TagValue::Int(42));
        assert_eq!(TagValue::parse_literal("4.5", None).unwrap(), TagValue::Real(4.5));
        assert_eq!(
            TagValue::parse_literal("running", None).unwrap(),
            TagValue::Text("running".into())
        );
    }

    #[test]
    fn literal_with_type_must_fit() {
        assert_eq!(
            TagValue::parse_literal("3", Some("REAL")).unwrap(),
            TagValue::Real(3.0)
        );
        let err = TagValue::parse_literal("fast", Some("INT")).unwrap_err();
        assert!(matches!(err, CoreError::InvalidValue { .. }));
    }

    #[test]
    fn truthiness() {
        assert!(TagValue::Int(5).as_bool());
        assert!(!TagValue::Real(0.0).as_bool());
        assert!(!TagValue::Text("off".into()).as_bool());
        assert!(TagValue::Text("x".into()).as_bool());
        assert!(!TagValue::Text(String::new()).as_bool());
    }

    #[test]
    fn untagged_serde_keeps_numbers_apart() {
        let v: TagValue = serde_json::from_str("21.0").unwrap();
        assert_eq!(v, TagValue::Real(21.0));
        let v: TagValue = serde_json::from_str("21").unwrap();
        assert_eq!(v, TagValue::Int(21));
    }

    #[test]
    fn key_display() {
        assert_eq!(VariableKey::new("plc_001", "M0.0").to_string(), "plc_001/M0.0");
    }
}
