use serde_json::Value;
use thiserror::Error;

/// The recorded envelope cannot be used for instance comparison.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpectationError {
    #[error("recorded envelope is not an Ok result")]
    NotOk,
    #[error("recorded Ok envelope has no instance field")]
    NoInstance,
}

/// Depth-first removal of null values: null-valued keys are dropped from
/// maps, null elements from sequences. The executor omits null fields from
/// its result marker while the recorded envelope keeps them explicit, so
/// both sides are passed through this before comparison.
pub fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|v| !v.is_null())
                .map(strip_nulls)
                .collect(),
        ),
        other => other,
    }
}

/// Pulls the post-call instance out of the recorded result envelope.
pub fn expected_instance(envelope: &Value) -> Result<&Value, ExpectationError> {
    envelope
        .get("Ok")
        .ok_or(ExpectationError::NotOk)?
        .get("instance")
        .ok_or(ExpectationError::NoInstance)
}

/// Deep structural equality after normalizing both sides: unordered key
/// equality for maps, ordered element equality for sequences, exact scalar
/// equality with no coercion.
pub fn matches(produced: &Value, expected: &Value) -> bool {
    strip_nulls(produced.clone()) == strip_nulls(expected.clone())
}
