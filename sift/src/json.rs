//! Conversions between [`Value`] and `serde_json::Value`.
//!
//! JSON to [`Value`] is total. The reverse is partial: symbols have
//! no JSON counterpart, `Undefined` collapses to null, and big
//! integers outside the `i64` range are rendered as decimal strings.

use num_traits::ToPrimitive;

use crate::value::{PropertyKey, Value};

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(flag) => Value::Bool(flag),
            serde_json::Value::Number(number) => {
                Value::Number(number.as_f64().unwrap_or(f64::NAN))
            }
            serde_json::Value::String(text) => Value::String(text),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (PropertyKey::String(key), Value::from(value)))
                    .collect(),
            ),
        }
    }
}

/// Errors produced when a value has no JSON counterpart.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JsonError {
    #[error("symbols have no JSON representation")]
    Symbol,
    #[error("symbol keys have no JSON representation")]
    SymbolKey,
}

impl Value {
    /// Render the value as JSON.
    pub fn to_json(&self) -> Result<serde_json::Value, JsonError> {
        match self {
            Value::Undefined | Value::Null => Ok(serde_json::Value::Null),
            Value::Bool(flag) => Ok(serde_json::Value::Bool(*flag)),
            Value::Number(number) => Ok(serde_json::Number::from_f64(*number)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null)),
            Value::BigInt(number) => Ok(match number.to_i64() {
                Some(small) => serde_json::Value::from(small),
                None => serde_json::Value::String(number.to_string()),
            }),
            Value::String(text) => Ok(serde_json::Value::String(text.clone())),
            Value::Symbol(_) => Err(JsonError::Symbol),
            Value::Array(items) => items
                .iter()
                .map(Value::to_json)
                .collect::<Result<Vec<_>, _>>()
                .map(serde_json::Value::Array),
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, value) in map.iter() {
                    match key {
                        PropertyKey::String(key) => {
                            out.insert(key.clone(), value.to_json()?);
                        }
                        PropertyKey::Symbol(_) => return Err(JsonError::SymbolKey),
                    }
                }
                Ok(serde_json::Value::Object(out))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigInt;
    use serde_json::json;

    use super::*;
    use crate::symbol::Symbol;

    #[test]
    fn json_round_trip() {
        let json = json!({ "id": "a", "tags": [1, true, null], "nested": { "x": 1.5 } });
        let value = Value::from(json.clone());

        assert_eq!(value.to_json(), Ok(json));
    }

    #[test]
    fn bigints_fall_back_to_strings() {
        let small = Value::BigInt(BigInt::from(42));
        let large = Value::BigInt(BigInt::from(u64::MAX) * 2);

        assert_eq!(small.to_json(), Ok(json!(42)));
        assert_eq!(large.to_json(), Ok(json!("36893488147419103230")));
    }

    #[test]
    fn symbols_are_refused() {
        let symbol = Value::Symbol(Symbol::new("tag"));
        let keyed = Value::object([(Symbol::new("key").into(), Value::Null)]);

        assert_eq!(symbol.to_json(), Err(JsonError::Symbol));
        assert_eq!(keyed.to_json(), Err(JsonError::SymbolKey));
    }
}
