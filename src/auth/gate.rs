//! Credential verification middleware.
//!
//! Extracts the bearer credential, verifies it against the identity provider
//! and attaches the resolved [`Principal`] to request context. A missing or
//! invalid credential rejects before any handler runs; every failure feeds
//! the failed-auth tracker and the critical event log.

use std::collections::HashMap;
use std::net::SocketAddr;

use async_trait::async_trait;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::rbac::Role;
use crate::error::{AuthError, Rejection};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::client_key;
use crate::telemetry::events::CriticalEventKind;

/// The authenticated identity attached to request extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

/// Seam to the platform's identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError>;
}

/// Token → principal lookup from configuration. Used in development and
/// tests; production wires a real provider through the same trait.
#[derive(Debug, Default)]
pub struct StaticTokenProvider {
    tokens: HashMap<String, Principal>,
}

impl StaticTokenProvider {
    pub fn new(tokens: HashMap<String, Principal>) -> Self {
        Self { tokens }
    }

    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.insert(token.into(), principal);
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticTokenProvider {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidCredential)
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}

/// Middleware verifying the bearer credential and attaching the principal.
pub async fn require_auth_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request, addr);
    let path = request.uri().path().to_string();

    let Some(token) = bearer_token(&request) else {
        return reject_unauthenticated(&state, &key, &path, AuthError::MissingCredential);
    };

    match state.identity.verify(token).await {
        Ok(principal) => {
            state.auth_tracker.clear_failures(&key);
            state.sessions.set_current(principal.clone());
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(err) => reject_unauthenticated(&state, &key, &path, err),
    }
}

fn reject_unauthenticated(state: &AppState, key: &str, path: &str, err: AuthError) -> Response {
    let now_blocked = state.auth_tracker.track_failure(key);
    state.telemetry.events.log(
        CriticalEventKind::AuthLoginFailure,
        None,
        json!({ "client": key, "path": path }),
        false,
        Some(err.to_string()),
    );
    tracing::warn!(client = %key, path = %path, blocked = now_blocked, error = %err, "authentication rejected");
    metrics::record_rejection("auth");
    Rejection::Unauthorized {
        reason: err.to_string(),
    }
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_provider_resolves_known_tokens() {
        let provider = StaticTokenProvider::default().with_token(
            "tenant-token",
            Principal {
                id: "user-7".to_string(),
                role: Role::Tenant,
            },
        );
        let principal = provider.verify("tenant-token").await.unwrap();
        assert_eq!(principal.id, "user-7");
        assert_eq!(principal.role, Role::Tenant);
        assert!(matches!(
            provider.verify("wrong").await,
            Err(AuthError::InvalidCredential)
        ));
    }

    #[test]
    fn bearer_extraction_requires_the_scheme() {
        let request = Request::builder()
            .header(header::AUTHORIZATION, "Bearer abc123")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&request), Some("abc123"));

        let request = Request::builder()
            .header(header::AUTHORIZATION, "Basic abc123")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&request), None);

        let request = Request::builder().body(axum::body::Body::empty()).unwrap();
        assert_eq!(bearer_token(&request), None);
    }
}
