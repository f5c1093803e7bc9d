//! Log Redaction Layer
//!
//! Scrubs tokens, secrets and phone numbers from strings and event payloads
//! prior to logging.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static TELEPHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\+\d{1,3}[-.\s]?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").expect("phone pattern is valid")
});
static API_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(sk-[a-zA-Z0-9]{32,})|(Bearer\s+[a-zA-Z0-9\-\._~+/]+=*)").expect("token pattern is valid")
});
static SECRET_ASSIGN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(password|passwd|token|secret|api[_-]?key)=\S+").expect("assignment pattern is valid")
});

/// Keys whose values are dropped entirely from logged payloads.
const SECRET_KEYS: &[&str] = &["password", "token", "secret", "api_key", "apikey"];

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = TELEPHONE_RE.replace_all(input, "[REDACTED_PHONE]");
    let redacted = API_KEY_RE.replace_all(&redacted, "[REDACTED_TOKEN]");
    SECRET_ASSIGN_RE
        .replace_all(&redacted, "$1=[REDACTED]")
        .into_owned()
}

/// Redacts every string in a JSON payload, masking values stored under
/// secret-looking keys outright.
pub fn redact_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(redact_sensitive_data(s)),
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let lower = k.to_ascii_lowercase();
                    let masked = SECRET_KEYS.iter().any(|s| lower.contains(s));
                    let v = if masked && !v.is_null() {
                        Value::String("[REDACTED]".into())
                    } else {
                        redact_value(v)
                    };
                    (k.clone(), v)
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redaction() {
        let raw = "Sending to +1-555-123-4567 with Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";
        let clean = redact_sensitive_data(raw);
        assert!(!clean.contains("+1-555-123-4567"));
        assert!(!clean.contains("Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9"));
    }

    #[test]
    fn test_redacts_inline_assignments() {
        let clean = redact_sensitive_data("curl --data password=hunter2 host");
        assert_eq!(clean, "curl --data password=[REDACTED] host");
    }

    #[test]
    fn test_redact_value_masks_secret_keys() {
        let payload = json!({
            "name": "deploy",
            "args": ["--token=abc123", "prod"],
            "options": { "api_key": "zzz", "retries": 3 }
        });
        let clean = redact_value(&payload);
        assert_eq!(clean["name"], "deploy");
        assert_eq!(clean["args"][0], "--token=[REDACTED]");
        assert_eq!(clean["args"][1], "prod");
        assert_eq!(clean["options"]["api_key"], "[REDACTED]");
        assert_eq!(clean["options"]["retries"], 3);
    }
}
