//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, addresses parseable)
//! - Check credential table entries resolve to known roles
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::auth::rbac::Role;
use crate::config::schema::GuardConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn err(errors: &mut Vec<ValidationError>, field: &str, message: impl Into<String>) {
    errors.push(ValidationError {
        field: field.to_string(),
        message: message.into(),
    });
}

/// Validate a parsed configuration, collecting every problem.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        err(
            &mut errors,
            "listener.bind_address",
            format!("not a valid socket address: {}", config.listener.bind_address),
        );
    }
    if config.listener.max_connections == 0 {
        err(&mut errors, "listener.max_connections", "must be > 0");
    }

    if config.timeouts.request_secs == 0 {
        err(&mut errors, "timeouts.request_secs", "must be > 0");
    }

    if config.rate_limit.enabled {
        if config.rate_limit.window_ms == 0 {
            err(&mut errors, "rate_limit.window_ms", "must be > 0");
        }
        if config.rate_limit.max_requests == 0 {
            err(&mut errors, "rate_limit.max_requests", "must be > 0");
        }
    }

    if config.failed_auth.window_ms == 0 {
        err(&mut errors, "failed_auth.window_ms", "must be > 0");
    }
    if config.failed_auth.max_failures == 0 {
        err(&mut errors, "failed_auth.max_failures", "must be > 0");
    }
    if config.failed_auth.block_ttl_secs == 0 {
        err(&mut errors, "failed_auth.block_ttl_secs", "must be > 0");
    }

    if config.security.max_body_bytes == 0 {
        err(&mut errors, "security.max_body_bytes", "must be > 0");
    }

    if config.telemetry.capacity == 0 {
        err(&mut errors, "telemetry.capacity", "must be > 0");
    }
    if config.telemetry.snapshot_cap > config.telemetry.capacity {
        err(
            &mut errors,
            "telemetry.snapshot_cap",
            "must not exceed telemetry.capacity",
        );
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        err(
            &mut errors,
            "observability.metrics_address",
            format!(
                "not a valid socket address: {}",
                config.observability.metrics_address
            ),
        );
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        err(&mut errors, "admin.api_key", "must be set when admin is enabled");
    }

    for (token, identity) in &config.auth.tokens {
        if Role::from_str(&identity.role).is_err() {
            err(
                &mut errors,
                "auth.tokens",
                format!("token for user {} names unknown role {}", identity.id, identity.role),
            );
        }
        if token.trim().is_empty() {
            err(&mut errors, "auth.tokens", "empty token");
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TokenIdentity;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GuardConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = GuardConfig::default();
        config.listener.bind_address = "not-an-address".to_string();
        config.rate_limit.window_ms = 0;
        config.failed_auth.max_failures = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.field == "listener.bind_address"));
        assert!(errors.iter().any(|e| e.field == "rate_limit.window_ms"));
        assert!(errors.iter().any(|e| e.field == "failed_auth.max_failures"));
    }

    #[test]
    fn rejects_unknown_role_in_token_table() {
        let mut config = GuardConfig::default();
        config.auth.tokens.insert(
            "tok-1".to_string(),
            TokenIdentity {
                id: "user-1".to_string(),
                role: "superuser".to_string(),
            },
        );
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].message.contains("superuser"));
    }

    #[test]
    fn disabled_rate_limit_skips_range_checks() {
        let mut config = GuardConfig::default();
        config.rate_limit.enabled = false;
        config.rate_limit.window_ms = 0;
        assert!(validate_config(&config).is_ok());
    }
}
