//! Recursive string sanitization.
//!
//! Pure and idempotent: `sanitize(sanitize(x)) == sanitize(x)` for any input,
//! independent of key ordering. Dangerous patterns are stripped until a fixed
//! point so fragments reassembled by a removal cannot survive a single pass.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

/// Strings longer than this are truncated before trimming.
pub const MAX_STRING_LEN: usize = 10_000;

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script>").expect("valid regex"));

static SCRIPT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?script\b[^>]*>").expect("valid regex"));

static JS_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)javascript\s*:").expect("valid regex"));

static EVENT_HANDLER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bon[a-z]+\s*=").expect("valid regex"));

/// Sanitized request body attached to request extensions by the validation
/// middleware.
#[derive(Debug, Clone)]
pub struct SanitizedBody(pub Value);

/// Recursively sanitize every string leaf of `value`.
pub fn sanitize(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_string(s)),
        Value::Array(items) => Value::Array(items.iter().map(sanitize).collect()),
        Value::Object(entries) => {
            let mut out = Map::with_capacity(entries.len());
            for (key, item) in entries {
                out.insert(key.clone(), sanitize(item));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Strip dangerous substrings, truncate overly long strings, trim whitespace.
pub fn sanitize_string(input: &str) -> String {
    let mut current = input.to_string();
    loop {
        let next = strip_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    if current.chars().count() > MAX_STRING_LEN {
        current = current.chars().take(MAX_STRING_LEN).collect();
    }
    current.trim().to_string()
}

fn strip_once(input: &str) -> String {
    let stripped = SCRIPT_BLOCK.replace_all(input, "");
    let stripped = SCRIPT_TAG.replace_all(&stripped, "");
    let stripped = JS_URL.replace_all(&stripped, "");
    EVENT_HANDLER.replace_all(&stripped, "").into_owned()
}
