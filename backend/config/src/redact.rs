//! Settings redaction: produce safe-to-display snapshots by masking sensitive fields.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Keys whose string values are always masked.
static SENSITIVE_KEYS: &[&str] = &[
    "api_key",
    "apikey",
    "access_token",
    "token",
    "secret",
    "password",
    "passphrase",
    "private_key",
];

/// Values that look like bearer or provider secrets regardless of key.
static SECRET_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:sk-[A-Za-z0-9]{16,}|Bearer\s+\S+|gh[pousr]_[A-Za-z0-9]{20,})$")
        .expect("secret value pattern is valid")
});

/// Redact a settings value, replacing sensitive strings with a short hint.
pub fn redact(value: &Value) -> Value {
    redact_recursive(value, "")
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEYS
        .iter()
        .any(|k| key == *k || key.ends_with(&format!("_{k}")))
}

fn redact_string(s: &str, key: &str) -> Value {
    if s.is_empty() {
        return Value::String(String::new());
    }
    if is_sensitive_key(key) || SECRET_VALUE.is_match(s) {
        let hint: String = s.chars().take(4).collect();
        if s.chars().count() > 4 {
            return Value::String(format!("{hint}***"));
        }
        return Value::String("***".to_string());
    }
    Value::String(s.to_string())
}

fn redact_recursive(value: &Value, key: &str) -> Value {
    match value {
        Value::String(s) => redact_string(s, key),
        Value::Array(arr) => Value::Array(arr.iter().map(|v| redact_recursive(v, key)).collect()),
        Value::Object(map) => {
            let mut result = serde_json::Map::new();
            for (k, v) in map {
                result.insert(k.clone(), redact_recursive(v, k));
            }
            Value::Object(result)
        }
        other => other.clone(),
    }
}
