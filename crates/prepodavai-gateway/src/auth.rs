// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication middleware for the API.
//!
//! Two methods are accepted:
//! 1. Telegram Mini App init data (`Authorization: tma <initData>`)
//! 2. Service token plus user id (`Authorization: Bearer <token>` + `X-User-Id`)
//!
//! When neither method is configured, all requests are rejected (fail-closed).
//! The resolved user travels to handlers as an [`AuthenticatedUser`] extension.

use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use prepodavai_config::PrepodavaiConfig;
use prepodavai_credits::grant_in;
use prepodavai_storage::queries::users;
use prepodavai_telegram::verify_init_data;
use tracing::{debug, error, info};

use crate::handlers::ApiError;
use crate::server::GatewayState;

/// Header naming the acting user on service-token requests.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authentication configuration for the API.
#[derive(Clone)]
pub struct AuthConfig {
    /// Bot token for Mini App init-data verification. If `Some`, `tma` auth is enabled.
    pub bot_token: Option<String>,
    /// Oldest acceptable `auth_date`.
    pub init_data_max_age: Duration,
    /// Token the web backend presents. If `Some`, service auth is enabled.
    pub service_token: Option<String>,
    /// Credits granted when a user is first seen.
    pub signup_grant: i64,
}

impl AuthConfig {
    pub fn from_config(config: &PrepodavaiConfig) -> Self {
        Self {
            bot_token: config.telegram.bot_token.clone(),
            init_data_max_age: Duration::from_secs(config.telegram.init_data_max_age_secs),
            service_token: config.auth.service_token.clone(),
            signup_grant: config.credits.signup_grant,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some() || self.service_token.is_some()
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "[redacted]"))
            .field("init_data_max_age", &self.init_data_max_age)
            .field(
                "service_token",
                &self.service_token.as_ref().map(|_| "[redacted]"),
            )
            .field("signup_grant", &self.signup_grant)
            .finish()
    }
}

/// The user a request acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

/// Length-independent byte comparison for secrets.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
}

/// Check the service token alone. Used by operator endpoints such as `/metrics`.
fn service_token_matches(auth: &AuthConfig, headers: &HeaderMap) -> bool {
    match (
        auth.service_token.as_deref(),
        authorization(headers).and_then(|v| v.strip_prefix("Bearer ")),
    ) {
        (Some(expected), Some(token)) => constant_time_eq(token.as_bytes(), expected.as_bytes()),
        _ => false,
    }
}

async fn resolve_user(state: &GatewayState, headers: &HeaderMap) -> Result<String, ApiError> {
    let auth = &state.auth;
    let header = authorization(headers).ok_or(ApiError::Unauthorized)?;

    // Priority 1: Mini App init data.
    if let (Some(bot_token), Some(raw)) = (auth.bot_token.as_deref(), header.strip_prefix("tma ")) {
        let init = verify_init_data(
            raw,
            bot_token,
            auth.init_data_max_age,
            chrono::Utc::now().timestamp(),
        )
        .map_err(|e| {
            debug!(error = %e, "init data rejected");
            ApiError::Unauthorized
        })?;

        let telegram_id = init.user.id;
        let username = init.user.username;
        let grant = auth.signup_grant;
        let new_id = uuid::Uuid::new_v4().to_string();
        let (user, created) = state
            .db
            .write(move |tx| {
                // Private chats share the user's id.
                let (user, created) = users::upsert_telegram(
                    tx,
                    &new_id,
                    telegram_id,
                    telegram_id,
                    username.as_deref(),
                )?;
                if created && grant > 0 {
                    grant_in(tx, &user.id, grant, "signup grant")?;
                }
                Ok((user, created))
            })
            .await?;
        if created {
            info!(user_id = %user.id, telegram_id, "registered Mini App user");
        }
        return Ok(user.id);
    }

    // Priority 2: service token with an explicit user id.
    if service_token_matches(auth, headers) {
        let user_id = headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(ApiError::Unauthorized)?
            .to_string();
        let grant = auth.signup_grant;
        let uid = user_id.clone();
        let created = state
            .db
            .write(move |tx| {
                let created = users::ensure(tx, &uid)?;
                if created && grant > 0 {
                    grant_in(tx, &uid, grant, "signup grant")?;
                }
                Ok(created)
            })
            .await?;
        if created {
            info!(user_id = %user_id, "registered service user");
        }
        return Ok(user_id);
    }

    Err(ApiError::Unauthorized)
}

/// Middleware resolving the acting user via init data or service token.
pub async fn auth_middleware(
    State(state): State<GatewayState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.auth.is_configured() {
        error!("no auth method configured, rejecting request");
        return Err(ApiError::Unauthorized);
    }

    let user_id = resolve_user(&state, request.headers()).await?;
    request.extensions_mut().insert(AuthenticatedUser(user_id));
    Ok(next.run(request).await)
}

/// Middleware for operator endpoints: service token only, no user.
pub async fn service_middleware(
    State(state): State<GatewayState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if service_token_matches(&state.auth, request.headers()) {
        Ok(next.run(request).await)
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}
