//! Scalar values for metadata maps and component configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single scalar value carried in entity metadata and component config.
///
/// Serialized untagged so JSON maps read naturally
/// (`{"width": 640, "caption": "Hero"}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ScalarValue {
    /// Human-readable kind name, used in schema violation messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ScalarValue::Boolean(_) => "boolean",
            ScalarValue::Integer(_) => "integer",
            ScalarValue::Float(_) => "float",
            ScalarValue::Text(_) => "text",
        }
    }

    /// Text payload, if this value is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ScalarValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric payload widened to f64, if this value is numeric.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ScalarValue::Integer(i) => Some(*i as f64),
            ScalarValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Boolean(b) => write!(f, "{}", b),
            ScalarValue::Integer(i) => write!(f, "{}", i),
            ScalarValue::Float(v) => write!(f, "{}", v),
            ScalarValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::Text(s.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(s: String) -> Self {
        ScalarValue::Text(s)
    }
}

impl From<i64> for ScalarValue {
    fn from(i: i64) -> Self {
        ScalarValue::Integer(i)
    }
}

impl From<f64> for ScalarValue {
    fn from(f: f64) -> Self {
        ScalarValue::Float(f)
    }
}

impl From<bool> for ScalarValue {
    fn from(b: bool) -> Self {
        ScalarValue::Boolean(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_serde_round_trip() {
        let values = vec![
            ScalarValue::Boolean(true),
            ScalarValue::Integer(42),
            ScalarValue::Float(1.5),
            ScalarValue::Text("hero".to_string()),
        ];
        for value in values {
            let json = serde_json::to_string(&value).unwrap();
            let back: ScalarValue = serde_json::from_str(&json).unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn test_untagged_json_reads_naturally() {
        let v: ScalarValue = serde_json::from_str("640").unwrap();
        assert_eq!(v, ScalarValue::Integer(640));
        let v: ScalarValue = serde_json::from_str("\"Hero\"").unwrap();
        assert_eq!(v, ScalarValue::Text("Hero".to_string()));
        let v: ScalarValue = serde_json::from_str("false").unwrap();
        assert_eq!(v, ScalarValue::Boolean(false));
    }

    #[test]
    fn test_as_number_widens_integers() {
        assert_eq!(ScalarValue::Integer(3).as_number(), Some(3.0));
        assert_eq!(ScalarValue::Float(2.5).as_number(), Some(2.5));
        assert_eq!(ScalarValue::Text("x".into()).as_number(), None);
    }
}
