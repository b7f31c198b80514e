//! Store-native value representation
//!
//! Items are maps of typed attribute values in the DynamoDB JSON shape
//! (`{"S": ..}`, `{"N": ..}`, `{"M": {..}}`, ...). Numbers are kept as their
//! decimal text, so converting a JSON number in and back out is lossless.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

use super::StoreError;

/// A stored item: attribute name to typed value
pub type Item = BTreeMap<String, AttributeValue>;

/// Typed attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    S(String),
    /// Decimal number text
    #[serde(rename = "N")]
    N(String),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "M")]
    M(BTreeMap<String, AttributeValue>),
    #[serde(rename = "L")]
    L(Vec<AttributeValue>),
}

impl AttributeValue {
    /// Name of the variant, used in type errors
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::Bool(_) => "BOOL",
            Self::Null(_) => "NULL",
            Self::M(_) => "M",
            Self::L(_) => "L",
        }
    }
}

/// Convert a JSON value into its store representation, recursing through
/// objects and arrays.
pub fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        // serde_json prints floats with the shortest text that parses back
        // to the same f64
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), to_attribute(v)))
                .collect(),
        ),
    }
}

/// Convert a store value back into JSON. Numbers come back as integers when
/// their text is integral, otherwise as `f64`.
pub fn from_attribute(value: &AttributeValue) -> Result<Value, StoreError> {
    Ok(match value {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(raw) => parse_number(raw)?,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(items) => Value::Array(
            items
                .iter()
                .map(from_attribute)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        AttributeValue::M(map) => {
            let mut object = Map::with_capacity(map.len());
            for (k, v) in map {
                object.insert(k.clone(), from_attribute(v)?);
            }
            Value::Object(object)
        }
    })
}

fn parse_number(raw: &str) -> Result<Value, StoreError> {
    let invalid = || StoreError::InvalidNumber(raw.to_string());

    if !raw.contains(['.', 'e', 'E']) {
        if let Ok(n) = raw.parse::<i64>() {
            return Ok(Value::from(n));
        }
        if let Ok(n) = raw.parse::<u64>() {
            return Ok(Value::from(n));
        }
    }

    let n: f64 = raw.parse().map_err(|_| invalid())?;
    Number::from_f64(n).map(Value::Number).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_float_confidences_survive_round_trip() {
        for confidence in [99.123_451_23, 0.1 + 0.2, 87.5, 1e-7, 1.0, 12_345.678_9, -0.5] {
            let original = json!(confidence);
            let stored = to_attribute(&original);
            assert!(matches!(stored, AttributeValue::N(_)));
            let restored = from_attribute(&stored).unwrap();
            assert_eq!(restored.as_f64(), Some(confidence));
            assert!(restored.is_f64());
        }
    }

    #[test]
    fn test_integers_stay_integers() {
        let restored = from_attribute(&to_attribute(&json!(42))).unwrap();
        assert_eq!(restored, json!(42));
        assert!(restored.is_i64());

        let big = json!(u64::MAX);
        assert_eq!(from_attribute(&to_attribute(&big)).unwrap(), big);
    }

    #[test]
    fn test_nested_structures_convert_recursively() {
        let value = json!({
            "CustomLabels": [
                {"Name": "car", "Confidence": 97.25, "Geometry": {"BoundingBox": {"Width": 0.5, "Top": 0.125}}},
                {"Name": "truck", "Confidence": 3.0}
            ],
            "flags": [true, null, "x"],
        });

        let stored = to_attribute(&value);
        let AttributeValue::M(ref top) = stored else {
            panic!("expected a map, got {}", stored.type_name());
        };
        let AttributeValue::L(labels) = &top["CustomLabels"] else {
            panic!("expected a list");
        };
        let AttributeValue::M(first) = &labels[0] else {
            panic!("expected a map");
        };
        assert_eq!(first["Confidence"], AttributeValue::N("97.25".to_string()));

        assert_eq!(from_attribute(&stored).unwrap(), value);
    }

    #[test]
    fn test_invalid_number_text() {
        for raw in ["abc", "", "inf", "NaN", "1.2.3"] {
            let err = from_attribute(&AttributeValue::N(raw.to_string())).unwrap_err();
            assert!(matches!(err, StoreError::InvalidNumber(_)), "{raw}: {err}");
        }
    }

    #[test]
    fn test_serialized_shape() {
        let stored = to_attribute(&json!({"k": "v", "n": 1.5, "z": null}));
        let text = serde_json::to_string(&stored).unwrap();
        assert_eq!(
            text,
            r#"{"M":{"k":{"S":"v"},"n":{"N":"1.5"},"z":{"NULL":true}}}"#
        );
        let parsed: AttributeValue = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, stored);
    }
}
