//! `${VAR}` placeholder substitution
//!
//! Resolution is never cached: every call reads the process environment
//! again, so changes are picked up at each use.

use serde_json::Value;

/// Substitute every `${NAME}` in `value` with the environment variable `NAME`
///
/// Unset variables become the empty string. An unterminated `${` is kept verbatim.
pub fn resolve_env_str(value: &str) -> String {
    resolve_env_str_with(value, |name| std::env::var(name).ok())
}

/// Like [`resolve_env_str`] with a custom variable lookup
pub fn resolve_env_str_with<F>(value: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                out.push_str(&lookup(&after[..end]).unwrap_or_default());
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Resolve placeholders in strings, recursing into objects and arrays
///
/// Numbers, booleans and null are returned untouched.
pub fn resolve_env_value(value: &Value) -> Value {
    resolve_env_value_with(value, &|name: &str| std::env::var(name).ok())
}

/// Like [`resolve_env_value`] with a custom variable lookup
pub fn resolve_env_value_with(value: &Value, lookup: &dyn Fn(&str) -> Option<String>) -> Value {
    match value {
        Value::String(s) => Value::String(resolve_env_str_with(s, lookup)),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_env_value_with(v, lookup)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| resolve_env_value_with(v, lookup)).collect())
        }
        other => other.clone(),
    }
}
