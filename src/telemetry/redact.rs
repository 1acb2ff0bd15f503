//! Sensitive-value redaction.
//!
//! Values under sensitive keys are replaced with a marker at any nesting
//! depth. Key matching is case-insensitive and tolerant of snake_case,
//! kebab-case and camelCase spellings. Redaction is idempotent.

use serde_json::{Map, Value};

pub const REDACTED: &str = "[REDACTED]";

/// Exact key tokens that are always sensitive.
const SENSITIVE_TOKENS: &[&str] = &[
    "password",
    "passwd",
    "pwd",
    "secret",
    "token",
    "authorization",
    "ssn",
    "cvv",
    "pin",
];

/// Normalized multi-word markers ("creditCard" → "creditcard").
const SENSITIVE_COMPOUNDS: &[&str] = &[
    "creditcard",
    "cardnumber",
    "bankaccount",
    "accountnumber",
    "routingnumber",
    "apikey",
    "accesstoken",
    "refreshtoken",
];

/// Split a key into lowercase word tokens on separators and camelCase
/// boundaries.
fn key_tokens(key: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in key.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

pub fn is_sensitive_key(key: &str) -> bool {
    let tokens = key_tokens(key);
    if tokens
        .iter()
        .any(|token| SENSITIVE_TOKENS.contains(&token.as_str()))
    {
        return true;
    }
    let joined = tokens.concat();
    SENSITIVE_COMPOUNDS
        .iter()
        .any(|marker| joined.contains(marker))
}

/// Recursively redact values under sensitive keys.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(entries) => {
            let mut out = Map::with_capacity(entries.len());
            for (key, item) in entries {
                if is_sensitive_key(key) {
                    out.insert(key.clone(), Value::String(REDACTED.to_string()));
                } else {
                    out.insert(key.clone(), redact(item));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn matches_spellings_case_insensitively() {
        assert!(is_sensitive_key("password"));
        assert!(is_sensitive_key("PASSWORD"));
        assert!(is_sensitive_key("userPassword"));
        assert!(is_sensitive_key("credit_card"));
        assert!(is_sensitive_key("creditCardNumber"));
        assert!(is_sensitive_key("api-key"));
        assert!(is_sensitive_key("bankAccount"));
        assert!(is_sensitive_key("SSN"));
        assert!(is_sensitive_key("refresh_token"));
    }

    #[test]
    fn does_not_overmatch_innocent_keys() {
        assert!(!is_sensitive_key("shipping"));
        assert!(!is_sensitive_key("author"));
        assert!(!is_sensitive_key("opinion"));
        assert!(!is_sensitive_key("cardHolderName"));
        assert!(!is_sensitive_key("account"));
        assert!(!is_sensitive_key("description"));
    }

    #[test]
    fn redacts_at_any_depth() {
        let input = json!({
            "name": "Jordan",
            "password": "hunter2",
            "payment": {
                "creditCard": "4111111111111111",
                "amount": 1200,
                "history": [
                    { "token": "abc", "note": "ok" },
                ],
            },
        });
        let out = redact(&input);
        assert_eq!(out["name"], "Jordan");
        assert_eq!(out["password"], REDACTED);
        assert_eq!(out["payment"]["creditCard"], REDACTED);
        assert_eq!(out["payment"]["amount"], 1200);
        assert_eq!(out["payment"]["history"][0]["token"], REDACTED);
        assert_eq!(out["payment"]["history"][0]["note"], "ok");
    }

    #[test]
    fn redaction_is_idempotent() {
        let input = json!({ "secret": { "nested": "value" }, "ok": 1 });
        let once = redact(&input);
        assert_eq!(once["secret"], REDACTED);
        assert_eq!(redact(&once), once);
    }
}
