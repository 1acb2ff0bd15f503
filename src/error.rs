//! Error taxonomy for the defense and telemetry substrate.
//!
//! Three families with very different handling policies:
//! - [`Rejection`]: a policy violation surfaced to the client as a structured
//!   4xx response. Never retried internally.
//! - [`PersistenceError`]: a snapshot read/write failure. Always swallowed with
//!   a warning; telemetry must not crash the feature it observes.
//! - [`AuthError`]: credential verification failure, mapped into
//!   `Rejection::Unauthorized` at the middleware boundary.

use thiserror::Error;

/// A request that violated policy and must be rejected before its handler runs.
///
/// The `IntoResponse` impl lives in `http::response` and produces the fixed
/// rejection shapes handlers and clients rely on.
#[derive(Debug, Error)]
pub enum Rejection {
    /// Fixed-window limit exceeded for this client.
    #[error("too many requests")]
    RateLimited { retry_after_secs: u64 },

    /// Request body failed schema validation. `details` carries one message
    /// per failed field.
    #[error("request validation failed")]
    Validation { details: Vec<String> },

    /// Missing or invalid credential.
    #[error("authentication required: {reason}")]
    Unauthorized { reason: String },

    /// Authenticated but the role does not grant access. Role names are not
    /// secret; disclosing required vs actual supports audit.
    #[error("role {actual} is not permitted here")]
    Forbidden { required: Vec<String>, actual: String },

    /// Identity is on the temporary block list.
    #[error("identity is temporarily blocked")]
    Blocked,

    /// Origin header did not match the allow-list.
    #[error("origin not allowed")]
    OriginDenied,
}

/// Snapshot persistence failure. Callers log and continue.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Credential verification failure from an identity provider.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer credential")]
    MissingCredential,

    #[error("invalid credential")]
    InvalidCredential,
}
