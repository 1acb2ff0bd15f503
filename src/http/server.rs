//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the full defense chain wired around the
//!   application routes
//! - Configure timeouts, tracing and request IDs
//! - Bind server to listener and serve with graceful shutdown
//! - Periodically sweep stale limiter and block-list entries
//!
//! # Defense Chain
//! Execution order for application routes:
//! ```text
//! request id → block check → request log → origin check → rate limit
//!     → validate + sanitize → authenticate → authorize → handler
//! ```
//! Axum applies layers inside-out, so they are added in reverse below. The
//! health and admin routes sit outside the chain; admin carries its own
//! API-key gate.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::auth::gate::{require_auth_middleware, IdentityProvider};
use crate::auth::rbac::{require_role_middleware, RoutePolicyTable};
use crate::auth::session::SessionStore;
use crate::config::GuardConfig;
use crate::http::request::request_id_middleware;
use crate::observability::metrics;
use crate::security::block_list::{block_check_middleware, FailedAuthTracker};
use crate::security::client_key;
use crate::security::origin::origin_check_middleware;
use crate::security::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::security::validate::{validate_middleware, SchemaRegistry};
use crate::store::persistence::{JsonFileStore, KeyValueStore};
use crate::telemetry::{FaultLevel, Telemetry};

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GuardConfig>,
    pub rate_limiter: Arc<RateLimiter>,
    pub auth_tracker: Arc<FailedAuthTracker>,
    pub schemas: Arc<SchemaRegistry>,
    pub policies: Arc<RoutePolicyTable>,
    pub identity: Arc<dyn IdentityProvider>,
    pub sessions: Arc<SessionStore>,
    pub telemetry: Arc<Telemetry>,
}

/// HTTP server wrapping application routes in the defense chain.
pub struct DefenseServer {
    router: Router,
    state: AppState,
}

impl DefenseServer {
    /// Assemble the server around the caller's API routes.
    pub fn new(
        config: GuardConfig,
        identity: Arc<dyn IdentityProvider>,
        schemas: SchemaRegistry,
        policies: RoutePolicyTable,
        api: Router<AppState>,
    ) -> Self {
        let config = Arc::new(config);

        let sink: Option<Arc<dyn KeyValueStore>> = config
            .telemetry
            .persist_dir
            .as_ref()
            .map(|dir| Arc::new(JsonFileStore::new(dir)) as Arc<dyn KeyValueStore>);

        let sessions = Arc::new(SessionStore::new(sink.clone()));
        sessions.load();
        let telemetry = Arc::new(Telemetry::new(&config.telemetry, sink, sessions.clone()));

        let state = AppState {
            rate_limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
            auth_tracker: Arc::new(FailedAuthTracker::new(&config.failed_auth)),
            schemas: Arc::new(schemas),
            policies: Arc::new(policies),
            identity,
            sessions,
            telemetry,
            config,
        };

        let router = Self::build_router(state.clone(), api);
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState, api: Router<AppState>) -> Router {
        let timeout = Duration::from_secs(state.config.timeouts.request_secs);

        let mut router = api
            .layer(middleware::from_fn_with_state(
                state.clone(),
                require_role_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                require_auth_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                validate_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                origin_check_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                request_log_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                block_check_middleware,
            ))
            .route("/health", get(health_handler));

        if state.config.admin.enabled {
            router = router.merge(admin::router(state.clone()));
        }

        router
            .layer(middleware::from_fn(request_id_middleware))
            .layer(TimeoutLayer::new(timeout))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Shared state, exposed for tests and embedding.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Defense server starting");

        self.spawn_sweeper();

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Defense server stopped");
        Ok(())
    }

    /// Periodically drop stale limiter windows and expired blocks so idle
    /// clients do not accumulate.
    fn spawn_sweeper(&self) {
        let rate_limiter = self.state.rate_limiter.clone();
        let auth_tracker = self.state.auth_tracker.clone();
        let interval = Duration::from_secs(self.state.config.security.sweep_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                rate_limiter.sweep();
                auth_tracker.sweep();
                tracing::debug!(
                    tracked_clients = rate_limiter.tracked_keys(),
                    "Swept stale defense entries"
                );
            }
        });
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Log every request outcome and feed the fault monitor's API-call window.
/// Server errors are additionally captured as faults.
pub async fn request_log_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let client = client_key(&request, addr);

    let response = next.run(request).await;
    let status = response.status().as_u16();

    tracing::info!(
        method = %method,
        path = %path,
        status,
        client = %client,
        latency_ms = start.elapsed().as_millis() as u64,
        "request completed"
    );
    metrics::record_request(&method, status, start);

    state.telemetry.faults.record_api_call(status);
    if status >= 500 {
        state.telemetry.faults.capture_error(
            &format!("{method} {path} returned {status}"),
            None,
            &json!({ "client": client, "path": path }),
            FaultLevel::Error,
        );
    }

    response
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}
