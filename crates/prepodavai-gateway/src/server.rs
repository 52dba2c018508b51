// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! API server built on axum.
//!
//! Sets up routes, middleware, and shared state.

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use prepodavai_config::model::ServerConfig;
use prepodavai_core::PrepodavaiError;
use prepodavai_credits::CreditLedger;
use prepodavai_generation::Orchestrator;
use prepodavai_storage::Database;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::{AuthConfig, USER_ID_HEADER, auth_middleware, service_middleware};
use crate::handlers;

/// Health state for the unauthenticated health endpoint and metrics.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

impl HealthState {
    pub fn new(prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>) -> Self {
        Self {
            start_time: std::time::Instant::now(),
            prometheus_render,
        }
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub db: Database,
    pub orchestrator: Orchestrator,
    pub ledger: CreditLedger,
    pub auth: AuthConfig,
    pub health: HealthState,
}

impl GatewayState {
    pub fn new(db: Database, max_attempts: u32, auth: AuthConfig, health: HealthState) -> Self {
        Self {
            orchestrator: Orchestrator::new(db.clone(), max_attempts),
            ledger: CreditLedger::new(db.clone()),
            db,
            auth,
            health,
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin, error = %e, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(USER_ID_HEADER),
        ])
}

/// Build the application router.
///
/// - GET /health (no auth)
/// - GET /metrics (service token)
/// - POST /generate/{type}, GET /generate/{id}, GET /subscriptions/me (user auth)
pub fn router(state: GatewayState, cors_origins: &[String]) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let operator_routes = Router::new()
        .route("/metrics", get(handlers::get_metrics))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            service_middleware,
        ))
        .with_state(state.clone());

    // `{key}` is the generation type on POST and the request id on GET.
    let api_routes = Router::new()
        .route(
            "/generate/{key}",
            post(handlers::post_generate).get(handlers::get_generate),
        )
        .route("/subscriptions/me", get(handlers::get_subscription))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(operator_routes)
        .merge(api_routes)
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

/// Bind `host:port` and serve until `cancel` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), PrepodavaiError> {
    if !state.auth.is_configured() {
        warn!("no auth method configured; every authenticated route will answer 401");
    }
    let app = router(state, &config.cors_origins);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| PrepodavaiError::Internal(format!("failed to bind API server to {addr}: {e}")))?;

    info!("API server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| PrepodavaiError::Internal(format!("API server error: {e}")))?;

    info!("API server stopped");
    Ok(())
}
