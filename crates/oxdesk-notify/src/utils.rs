//! Utility functions for notification channels

use serde_json::Value;

/// Maximum length for message bodies stored in logs
pub const MAX_BODY_LENGTH: usize = 4000;

/// Truncate a string to the specified maximum length
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}... [truncated]", &s[..max_len])
    }
}

/// Redact sensitive fields from JSON configuration.
///
/// Replaces values of keys that commonly hold credentials (password,
/// token, secret, api_key, authorization, credentials) with `"***"`,
/// recursing into nested objects and arrays. Hyphenated header-style
/// keys (`X-Api-Key`) are matched too.
pub fn redact_sensitive_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = serde_json::Map::new();
            for (key, val) in map {
                let key_lower = key.to_lowercase().replace('-', "_");
                let is_sensitive = key_lower.contains("password")
                    || key_lower.contains("passwd")
                    || key_lower.contains("token")
                    || key_lower.contains("secret")
                    || key_lower.contains("api_key")
                    || key_lower.contains("apikey")
                    || key_lower.contains("authorization")
                    || key_lower.contains("credentials");

                if is_sensitive {
                    redacted.insert(key.clone(), Value::String("***".to_string()));
                } else if val.is_object() || val.is_array() {
                    redacted.insert(key.clone(), redact_sensitive_json(val));
                } else {
                    redacted.insert(key.clone(), val.clone());
                }
            }
            Value::Object(redacted)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(redact_sensitive_json).collect()),
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 5), "hello... [truncated]");
    }

    #[test]
    fn test_redact_sensitive_json() {
        let json = serde_json::json!({
            "from": "desk@example.com",
            "smtp_password": "secret123",
            "nested": {
                "auth_token": "xyz789",
                "url": "https://hooks.example.com"
            }
        });

        let redacted = redact_sensitive_json(&json);
        assert_eq!(redacted["from"], "desk@example.com");
        assert_eq!(redacted["smtp_password"], "***");
        assert_eq!(redacted["nested"]["auth_token"], "***");
        assert_eq!(redacted["nested"]["url"], "https://hooks.example.com");
    }
}
