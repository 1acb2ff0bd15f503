use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use clap::Parser;
use serde_json::json;
use tokio::net::TcpListener;
use uuid::Uuid;

use propguard::auth::gate::{Principal, StaticTokenProvider};
use propguard::auth::rbac::{Access, Role, RoutePolicyTable};
use propguard::config::{load_config, GuardConfig};
use propguard::http::{AppState, DefenseServer};
use propguard::observability::{logging, metrics};
use propguard::security::sanitize::SanitizedBody;
use propguard::security::validate::{FieldRule, SchemaRegistry, ValidationSchema};
use propguard::telemetry::CriticalEventKind;

#[derive(Parser)]
#[command(name = "propguard")]
#[command(about = "Request defense and telemetry for the property platform", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };

    logging::init(&config.observability.log_level);
    tracing::info!("propguard v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        rate_limit_enabled = config.rate_limit.enabled,
        admin_enabled = config.admin.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let identity = Arc::new(identity_provider(&config));
    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let server = DefenseServer::new(
        config,
        identity,
        platform_schemas(),
        platform_policies(),
        platform_routes(),
    );
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Static credential table from config. Entries with roles that failed
/// validation never reach this point.
fn identity_provider(config: &GuardConfig) -> StaticTokenProvider {
    let mut tokens = HashMap::new();
    for (token, identity) in &config.auth.tokens {
        if let Ok(role) = Role::from_str(&identity.role) {
            tokens.insert(
                token.clone(),
                Principal {
                    id: identity.id.clone(),
                    role,
                },
            );
        }
    }
    StaticTokenProvider::new(tokens)
}

/// Body schemas for the write endpoints.
fn platform_schemas() -> SchemaRegistry {
    let mut schemas = SchemaRegistry::new();
    schemas.register(
        Method::POST,
        "/api/properties",
        ValidationSchema::new()
            .field("name", FieldRule::string().required().min_length(1).max_length(200))
            .field("address", FieldRule::string().required().min_length(1).max_length(500))
            .field("units", FieldRule::number())
            .field("managerEmail", FieldRule::email()),
    );
    schemas.register(
        Method::POST,
        "/api/maintenance",
        ValidationSchema::new()
            .field("propertyId", FieldRule::uuid().required())
            .field("description", FieldRule::string().required().min_length(10).max_length(5000))
            .field("urgent", FieldRule::boolean()),
    );
    schemas
}

/// Role policies per route prefix.
fn platform_policies() -> RoutePolicyTable {
    let mut policies = RoutePolicyTable::new();
    policies.allow(
        "/api/properties",
        vec![Access::Role(Role::Admin), Access::Role(Role::PropertyManager)],
    );
    policies.allow("/api/maintenance", vec![Access::Any]);
    policies
}

fn platform_routes() -> Router<AppState> {
    Router::new()
        .route("/api/properties", post(create_property))
        .route("/api/maintenance", post(request_maintenance))
        .route("/api/me", get(whoami))
}

async fn create_property(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(SanitizedBody(body)): Extension<SanitizedBody>,
) -> (StatusCode, Json<serde_json::Value>) {
    let id = Uuid::new_v4().to_string();
    state.telemetry.events.log(
        CriticalEventKind::PropertyCreated,
        Some(&principal),
        json!({ "propertyId": id, "name": body["name"] }),
        true,
        None,
    );
    (StatusCode::CREATED, Json(json!({ "id": id, "property": body })))
}

async fn request_maintenance(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(SanitizedBody(body)): Extension<SanitizedBody>,
) -> (StatusCode, Json<serde_json::Value>) {
    let id = Uuid::new_v4().to_string();
    state.telemetry.events.log(
        CriticalEventKind::MaintenanceRequested,
        Some(&principal),
        json!({ "requestId": id, "propertyId": body["propertyId"] }),
        true,
        None,
    );
    (StatusCode::CREATED, Json(json!({ "id": id, "request": body })))
}

async fn whoami(Extension(principal): Extension<Principal>) -> Json<serde_json::Value> {
    Json(json!({ "id": principal.id, "role": principal.role.as_str() }))
}
