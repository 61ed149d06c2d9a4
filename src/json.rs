//! A small wrapper around [`serde_json`] that refuses to let untrusted JSON
//! smuggle prototype-pollution keys into the claim/header maps it returns.
//!
//! Rust has no shared object prototype to pollute, so the attack this guards
//! against (an attacker-controlled `__proto__` key silently altering every
//! other object's behaviour) cannot occur at the language level. The check
//! is kept anyway: `__proto__`/`constructor`/`prototype` keys are dropped
//! from any parsed object so a verifier embedded in a polyglot system never
//! forwards them to something downstream that does have a prototype (e.g. a
//! JS side-car reading the claims back out).

use serde_json::{Map, Value};

use crate::error::{VerifierError, VerifierResult};

/// Keys that are never allowed to survive parsing of an untrusted object.
const POISON_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Parse `bytes` as JSON and require the result to be an object, stripping
/// any poison keys (recursively) from the returned map.
pub fn parse_object(bytes: &[u8]) -> VerifierResult<Map<String, Value>> {
    let value: Value = serde_json::from_slice(bytes)?;
    into_safe_object(value)
}

fn into_safe_object(value: Value) -> VerifierResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(strip_poison(map)),
        other => Err(VerifierError::ParseError(format!(
            "expected a JSON object, got {}",
            type_name(&other)
        ))),
    }
}

fn strip_poison(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .filter(|(key, _)| !POISON_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key, strip_poison_value(value)))
        .collect()
}

fn strip_poison_value(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(strip_poison(map)),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_poison_value).collect()),
        other => other,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
