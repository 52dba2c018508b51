// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the REST API.
//!
//! Handles POST /generate/{type}, GET /generate/{id}, GET /subscriptions/me,
//! GET /health and GET /metrics.

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use prepodavai_core::{PrepodavaiError, SubscriptionStatus};
use prepodavai_generation::StatusView;
use serde::Serialize;
use tracing::{error, warn};

use crate::auth::AuthenticatedUser;
use crate::server::GatewayState;

/// Error returned by API handlers.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Domain(PrepodavaiError),
}

impl From<PrepodavaiError> for ApiError {
    fn from(err: PrepodavaiError) -> Self {
        ApiError::Domain(err)
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    /// Terse error code.
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// HTTP status for a domain error.
pub fn status_for(err: &PrepodavaiError) -> StatusCode {
    match err {
        PrepodavaiError::InsufficientCredits { .. } | PrepodavaiError::NoSubscription { .. } => {
            StatusCode::PAYMENT_REQUIRED
        }
        PrepodavaiError::Validation(_) => StatusCode::BAD_REQUEST,
        PrepodavaiError::UnknownGenerationType(_) | PrepodavaiError::NotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    success: false,
                    error: "unauthorized".to_string(),
                    message: None,
                },
            ),
            ApiError::Domain(err) => {
                let status = status_for(&err);
                if status.is_server_error() {
                    error!(error = %err, "request failed");
                }
                // Only validation failures explain themselves to the client.
                let message = match &err {
                    PrepodavaiError::Validation(msg) => Some(msg.clone()),
                    _ => None,
                };
                let code = if status.is_server_error() {
                    "internal_error"
                } else {
                    err.error_code()
                };
                (
                    status,
                    ErrorResponse {
                        success: false,
                        error: code.to_string(),
                        message,
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Response body for an accepted POST /generate/{type}.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedResponse {
    pub success: bool,
    pub request_id: String,
}

/// Response body for GET /generate/{id}.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub status: StatusView,
}

/// Subscription fields exposed to clients.
#[derive(Debug, Serialize)]
pub struct SubscriptionView {
    pub credits_balance: i64,
    pub extra_credits: i64,
    pub credits_used: i64,
    pub overage_credits_used: i64,
    pub status: SubscriptionStatus,
    pub allow_overage: bool,
    pub overage_cost_per_credit: Option<f64>,
}

/// Response body for GET /subscriptions/me.
#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub success: bool,
    pub subscription: SubscriptionView,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// POST /generate/{type}
///
/// Validates, reserves credits and enqueues. Never waits for generation.
pub async fn post_generate(
    State(state): State<GatewayState>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Path(type_name): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    let params = if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::Value::Object(Default::default())
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            warn!(user_id, error = %e, "malformed request body");
            PrepodavaiError::Validation(format!("request body is not valid JSON: {e}"))
        })?
    };

    let submission = state
        .orchestrator
        .submit_named(&user_id, &type_name, params)
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            success: true,
            request_id: submission.request_id,
        }),
    ))
}

/// GET /generate/{id}
pub async fn get_generate(
    State(state): State<GatewayState>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Path(request_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let status = state.orchestrator.get_status(&request_id, &user_id).await?;
    Ok(Json(StatusResponse {
        success: true,
        status,
    }))
}

/// GET /subscriptions/me
pub async fn get_subscription(
    State(state): State<GatewayState>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let sub = state.ledger.balance(&user_id).await?;
    Ok(Json(SubscriptionResponse {
        success: true,
        subscription: SubscriptionView {
            credits_balance: sub.credits_balance,
            extra_credits: sub.extra_credits,
            credits_used: sub.credits_used,
            overage_credits_used: sub.overage_credits_used,
            status: sub.status,
            allow_overage: sub.allow_overage,
            overage_cost_per_credit: sub.overage_cost_per_credit,
        },
    }))
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
    })
}

/// GET /metrics
///
/// Prometheus text format, or 404 when metrics are disabled.
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
