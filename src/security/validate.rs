//! Schema-driven field validation.
//!
//! Schemas are supplied per endpoint and checked field by field. Validation
//! never short-circuits: every field is checked so callers get the complete
//! error list in one response.

use std::collections::HashMap;
use std::sync::LazyLock;

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use regex::Regex;
use serde_json::Value;

use crate::error::Rejection;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::sanitize::{sanitize, SanitizedBody};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("valid uuid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Email,
    Uuid,
}

/// Immutable validation rule for one field.
#[derive(Debug, Clone)]
pub struct FieldRule {
    field_type: FieldType,
    required: bool,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<Regex>,
}

impl FieldRule {
    fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            min_length: None,
            max_length: None,
            pattern: None,
        }
    }

    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    pub fn number() -> Self {
        Self::new(FieldType::Number)
    }

    pub fn boolean() -> Self {
        Self::new(FieldType::Boolean)
    }

    pub fn email() -> Self {
        Self::new(FieldType::Email)
    }

    pub fn uuid() -> Self {
        Self::new(FieldType::Uuid)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }
}

/// Field rules for one endpoint, checked in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ValidationSchema {
    rules: Vec<(String, FieldRule)>,
}

impl ValidationSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.rules.push((name.into(), rule));
        self
    }

    /// Validate `body` against every rule. Returns one message per failed
    /// field; an empty vec means the body is valid.
    pub fn validate(&self, body: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        for (name, rule) in &self.rules {
            let value = body.get(name).filter(|v| !v.is_null());
            let Some(value) = value else {
                if rule.required {
                    errors.push(format!("{name} is required"));
                }
                continue;
            };
            validate_field(name, value, rule, &mut errors);
        }
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn validate_field(name: &str, value: &Value, rule: &FieldRule, errors: &mut Vec<String>) {
    match rule.field_type {
        FieldType::String => {
            let Some(s) = value.as_str() else {
                errors.push(format!("{name} must be a string"));
                return;
            };
            let len = s.chars().count();
            if let Some(min) = rule.min_length {
                if len < min {
                    errors.push(format!("{name} must be at least {min} characters"));
                }
            }
            if let Some(max) = rule.max_length {
                if len > max {
                    errors.push(format!("{name} must be at most {max} characters"));
                }
            }
            if let Some(pattern) = &rule.pattern {
                if !pattern.is_match(s) {
                    errors.push(format!("{name} has an invalid format"));
                }
            }
        }
        FieldType::Number => {
            // Numeric strings are coerced; anything else is rejected.
            let ok = value.is_number()
                || value
                    .as_str()
                    .map(|s| s.trim().parse::<f64>().is_ok())
                    .unwrap_or(false);
            if !ok {
                errors.push(format!("{name} must be a number"));
            }
        }
        FieldType::Boolean => {
            if !value.is_boolean() {
                errors.push(format!("{name} must be a boolean"));
            }
        }
        FieldType::Email => {
            let ok = value.as_str().map(|s| EMAIL_RE.is_match(s)).unwrap_or(false);
            if !ok {
                errors.push(format!("{name} must be a valid email address"));
            }
        }
        FieldType::Uuid => {
            let ok = value.as_str().map(|s| UUID_RE.is_match(s)).unwrap_or(false);
            if !ok {
                errors.push(format!("{name} must be a valid UUID"));
            }
        }
    }
}

/// Per-endpoint schema registry keyed by method and exact path.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<(Method, String), ValidationSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, method: Method, path: impl Into<String>, schema: ValidationSchema) {
        self.schemas.insert((method, path.into()), schema);
    }

    pub fn lookup(&self, method: &Method, path: &str) -> Option<&ValidationSchema> {
        self.schemas.get(&(method.clone(), path.to_string()))
    }
}

fn is_json(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false)
}

/// Middleware: validate the body against the endpoint's schema, then sanitize
/// it. The sanitized body replaces the original and is also stashed in
/// request extensions as [`SanitizedBody`].
pub async fn validate_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let schema = state
        .schemas
        .lookup(request.method(), request.uri().path())
        .cloned();
    if schema.is_none() && !is_json(&request) {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, state.config.security.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(_) => {
            metrics::record_rejection("validation");
            return Rejection::Validation {
                details: vec!["request body is too large or unreadable".to_string()],
            }
            .into_response();
        }
    };

    let value: Value = if bytes.is_empty() {
        Value::Object(Default::default())
    } else {
        match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(_) => {
                metrics::record_rejection("validation");
                return Rejection::Validation {
                    details: vec!["request body must be valid JSON".to_string()],
                }
                .into_response();
            }
        }
    };

    if let Some(schema) = &schema {
        let details = schema.validate(&value);
        if !details.is_empty() {
            tracing::warn!(path = %parts.uri.path(), errors = details.len(), "validation failed");
            metrics::record_rejection("validation");
            return Rejection::Validation { details }.into_response();
        }
    }

    let sanitized = sanitize(&value);
    let body_bytes = serde_json::to_vec(&sanitized).unwrap_or_default();
    parts
        .headers
        .insert(header::CONTENT_LENGTH, HeaderValue::from(body_bytes.len() as u64));
    parts.extensions.insert(SanitizedBody(sanitized));

    let request = Request::from_parts(parts, axum::body::Body::from(body_bytes));
    next.run(request).await
}
