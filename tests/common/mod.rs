//! Shared harness for integration tests: a defense server on an ephemeral
//! port with a small echo API behind the full middleware chain.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::Extension;
use axum::http::{Method, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use tokio::net::TcpListener;

use propguard::auth::gate::{Principal, StaticTokenProvider};
use propguard::auth::rbac::{Access, Role, RoutePolicyTable};
use propguard::config::GuardConfig;
use propguard::http::{AppState, DefenseServer};
use propguard::security::sanitize::SanitizedBody;
use propguard::security::validate::{FieldRule, SchemaRegistry, ValidationSchema};

pub const ADMIN_TOKEN: &str = "tok-admin";
pub const TENANT_TOKEN: &str = "tok-tenant";

pub fn test_config() -> GuardConfig {
    let mut config = GuardConfig::default();
    config.rate_limit.max_requests = 50;
    config
}

async fn echo_handler(
    Extension(SanitizedBody(body)): Extension<SanitizedBody>,
) -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::CREATED, Json(body))
}

/// Spawn a server and return its address plus shared state for assertions.
pub async fn spawn_server(config: GuardConfig) -> (SocketAddr, AppState) {
    let identity = StaticTokenProvider::new(HashMap::new())
        .with_token(
            ADMIN_TOKEN,
            Principal {
                id: "admin-1".to_string(),
                role: Role::Admin,
            },
        )
        .with_token(
            TENANT_TOKEN,
            Principal {
                id: "tenant-1".to_string(),
                role: Role::Tenant,
            },
        );

    let mut schemas = SchemaRegistry::new();
    schemas.register(
        Method::POST,
        "/api/properties",
        ValidationSchema::new()
            .field("name", FieldRule::string().required().min_length(1))
            .field("managerEmail", FieldRule::email()),
    );

    let mut policies = RoutePolicyTable::new();
    policies.allow(
        "/api/properties",
        vec![
            Access::Role(Role::Admin),
            Access::Role(Role::PropertyManager),
        ],
    );
    policies.allow("/api/echo", vec![Access::Any]);

    let api = Router::new()
        .route("/api/properties", post(echo_handler))
        .route("/api/echo", post(echo_handler));

    let server = DefenseServer::new(config, Arc::new(identity), schemas, policies, api);
    let state = server.state().clone();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        server.run(listener).await.unwrap();
    });

    (addr, state)
}
