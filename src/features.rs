use crate::error::{validation_error, AppError};
use serde::de::{DeserializeSeed, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A single named input as decoded from a request body.
///
/// Numbers land in `Number`; anything else is kept verbatim so the
/// rejection can echo the offending value back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Other(serde_json::Value),
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        FeatureValue::Number(value)
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Number(v) => write!(f, "{}", v),
            FeatureValue::Other(v) => write!(f, "{}", v),
        }
    }
}

pub type NamedInputs = HashMap<String, FeatureValue>;

/// Feature values laid out in the model's feature order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }
}

/// Decodes a request body into named inputs.
///
/// A value that fails to parse (e.g. `1e400`) is reported against the key
/// it belongs to; any other malformed body is a plain validation error.
pub fn decode_inputs(body: &[u8]) -> Result<NamedInputs, AppError> {
    let mut current = None;
    let mut de = serde_json::Deserializer::from_slice(body);
    let decoded = InputsSeed {
        current: &mut current,
    }
    .deserialize(&mut de)
    .and_then(|inputs| de.end().map(|_| inputs));

    decoded.map_err(|e| match current.take() {
        Some(name) => AppError::InvalidFeatureValue {
            name,
            value: e.to_string(),
        },
        None => validation_error(&e.to_string()),
    })
}

/// Map visitor that remembers the key whose value is being parsed.
struct InputsSeed<'a> {
    current: &'a mut Option<String>,
}

impl<'de, 'a> DeserializeSeed<'de> for InputsSeed<'a> {
    type Value = NamedInputs;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<NamedInputs, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, 'a> Visitor<'de> for InputsSeed<'a> {
    type Value = NamedInputs;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object mapping feature names to numbers")
    }

    fn visit_map<A: MapAccess<'de>>(mut self, mut map: A) -> Result<NamedInputs, A::Error> {
        let mut inputs = NamedInputs::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(name) = map.next_key::<String>()? {
            *self.current = Some(name.clone());
            let value = map.next_value::<FeatureValue>()?;
            *self.current = None;
            inputs.insert(name, value);
        }
        Ok(inputs)
    }
}

/// Builds a `FeatureVector` ordered by `order`. Names not in `order` are ignored.
pub fn assemble(inputs: &NamedInputs, order: &[String]) -> Result<FeatureVector, AppError> {
    let mut values = Vec::with_capacity(order.len());

    for name in order {
        let raw = inputs
            .get(name)
            .ok_or_else(|| AppError::MissingFeature(name.clone()))?;

        match raw {
            FeatureValue::Number(v) if v.is_finite() => values.push(*v),
            other => {
                return Err(AppError::InvalidFeatureValue {
                    name: name.clone(),
                    value: other.to_string(),
                })
            }
        }
    }

    Ok(FeatureVector::new(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order() -> Vec<String> {
        vec!["alcohol".to_string(), "volatile_acidity".to_string()]
    }

    fn inputs(pairs: &[(&str, FeatureValue)]) -> NamedInputs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_assemble_follows_model_order() {
        let named = inputs(&[
            ("volatile_acidity", FeatureValue::Number(0.7)),
            ("alcohol", FeatureValue::Number(9.4)),
        ]);
        let vector = assemble(&named, &order()).unwrap();
        assert_eq!(vector.values, vec![9.4, 0.7]);
    }

    #[test]
    fn test_missing_feature_is_named() {
        let named = inputs(&[("alcohol", FeatureValue::Number(9.4))]);
        match assemble(&named, &order()) {
            Err(AppError::MissingFeature(name)) => assert_eq!(name, "volatile_acidity"),
            other => panic!("expected missing feature, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_features_ignored() {
        let named = inputs(&[
            ("alcohol", FeatureValue::Number(9.4)),
            ("volatile_acidity", FeatureValue::Number(0.7)),
            ("residual_sugar", FeatureValue::Number(1.9)),
            ("comment", FeatureValue::Other(json!("not a number"))),
        ]);
        let vector = assemble(&named, &order()).unwrap();
        assert_eq!(vector.values, vec![9.4, 0.7]);
    }

    #[test]
    fn test_non_finite_values_rejected() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let named = inputs(&[("alcohol", bad.into()), ("volatile_acidity", FeatureValue::Number(0.7))]);
            match assemble(&named, &order()) {
                Err(AppError::InvalidFeatureValue { name, .. }) => assert_eq!(name, "alcohol"),
                other => panic!("expected invalid value, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_non_numeric_values_rejected() {
        let named = inputs(&[
            ("alcohol", FeatureValue::Number(9.4)),
            ("volatile_acidity", FeatureValue::Other(json!("high"))),
        ]);
        match assemble(&named, &order()) {
            Err(AppError::InvalidFeatureValue { name, value }) => {
                assert_eq!(name, "volatile_acidity");
                assert_eq!(value, "\"high\"");
            }
            other => panic!("expected invalid value, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_inputs() {
        let named = decode_inputs(br#"{"alcohol": 9.4, "volatile_acidity": 0.7, "note": "x"}"#).unwrap();
        assert_eq!(named.len(), 3);
        assert_eq!(named["alcohol"], FeatureValue::Number(9.4));
        assert_eq!(named["note"], FeatureValue::Other(json!("x")));
    }

    #[test]
    fn test_out_of_range_number_names_feature() {
        match decode_inputs(br#"{"alcohol": 9.4, "volatile_acidity": 1e400}"#) {
            Err(AppError::InvalidFeatureValue { name, value }) => {
                assert_eq!(name, "volatile_acidity");
                assert!(value.contains("out of range"), "{}", value);
            }
            other => panic!("expected invalid value, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_bodies_are_validation_errors() {
        for body in [
            &b"{not json"[..],
            &b"[9.4, 0.7]"[..],
            &b""[..],
            &br#"{"alcohol": 9.4} trailing"#[..],
        ] {
            match decode_inputs(body) {
                Err(AppError::InvalidInput(_)) => {}
                other => panic!("expected invalid input, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_request_body_decodes_into_values() {
        let named: NamedInputs = serde_json::from_value(json!({
            "alcohol": 9.4,
            "volatile_acidity": 1,
            "label": null
        }))
        .unwrap();
        assert_eq!(named["alcohol"], FeatureValue::Number(9.4));
        assert_eq!(named["volatile_acidity"], FeatureValue::Number(1.0));
        assert_eq!(named["label"], FeatureValue::Other(serde_json::Value::Null));
    }
}
