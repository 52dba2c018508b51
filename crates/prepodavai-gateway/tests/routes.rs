// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Route-level tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use prepodavai_core::GenerationType;
use prepodavai_credits::{CostTable, CreditLedger};
use prepodavai_gateway::{AuthConfig, GatewayState, HealthState, router};
use prepodavai_storage::Database;
use prepodavai_telegram::sign_init_data;
use serde_json::{Value, json};
use tower::ServiceExt;

const SERVICE_TOKEN: &str = "svc-token";
const BOT_TOKEN: &str = "123456:test-bot-token";

fn auth(signup_grant: i64) -> AuthConfig {
    AuthConfig {
        bot_token: Some(BOT_TOKEN.into()),
        init_data_max_age: Duration::from_secs(3600),
        service_token: Some(SERVICE_TOKEN.into()),
        signup_grant,
    }
}

async fn app_with(auth: AuthConfig, metrics: bool) -> (Router, Database) {
    let db = Database::open_in_memory().await.unwrap();
    let render: Option<Arc<dyn Fn() -> String + Send + Sync>> = if metrics {
        Some(Arc::new(|| "prepodavai_generations_submitted_total 1\n".to_string()))
    } else {
        None
    };
    let state = GatewayState::new(db.clone(), 3, auth, HealthState::new(render));
    (router(state, &["https://app.example".into()]), db)
}

async fn app() -> (Router, Database) {
    app_with(auth(0), false).await
}

fn as_service(builder: axum::http::request::Builder, user: &str) -> axum::http::request::Builder {
    builder
        .header(header::AUTHORIZATION, format!("Bearer {SERVICE_TOKEN}"))
        .header("x-user-id", user)
}

fn post(uri: &str, user: &str, body: Value) -> Request<Body> {
    as_service(Request::post(uri), user)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, user: &str) -> Request<Body> {
    as_service(Request::get(uri), user)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 1 << 20).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}

fn quiz() -> Value {
    json!({"subject": "Biology", "topic": "Cells"})
}

#[tokio::test]
async fn health_needs_no_auth() {
    let (app, _db) = app().await;
    let (status, body) = send(
        &app,
        Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
    assert!(body["uptime_secs"].is_u64());
}

#[tokio::test]
async fn unconfigured_auth_rejects_everything() {
    let (app, _db) = app_with(
        AuthConfig {
            bot_token: None,
            init_data_max_age: Duration::from_secs(60),
            service_token: None,
            signup_grant: 0,
        },
        false,
    )
    .await;
    let (status, body) = send(&app, get("/subscriptions/me", "u1")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn wrong_token_or_missing_user_is_unauthorized() {
    let (app, _db) = app().await;
    let request = Request::get("/subscriptions/me")
        .header(header::AUTHORIZATION, "Bearer nope")
        .header("x-user-id", "u1")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.0, StatusCode::UNAUTHORIZED);

    let request = Request::get("/subscriptions/me")
        .header(header::AUTHORIZATION, format!("Bearer {SERVICE_TOKEN}"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn submit_then_poll() {
    let (app, db) = app().await;
    CreditLedger::new(db.clone())
        .grant("web-1", 10, "test")
        .await
        .unwrap();

    let (status, body) = send(&app, post("/generate/quiz", "web-1", quiz())).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["success"], true);
    let id = body["requestId"].as_str().unwrap().to_string();

    let (status, body) = send(&app, get(&format!("/generate/{id}"), "web-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["status"]["status"], "pending");
    assert!(body["status"].get("result").is_none());
}

#[tokio::test]
async fn overspend_is_rejected_and_balance_kept() {
    let (app, db) = app().await;
    CreditLedger::new(db.clone())
        .grant("web-1", 10, "test")
        .await
        .unwrap();
    let costs = CostTable::new(db.clone());
    costs.set_cost(GenerationType::Quiz, 5).await.unwrap();

    let (status, _) = send(&app, post("/generate/quiz", "web-1", quiz())).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    costs.set_cost(GenerationType::Quiz, 8).await.unwrap();
    let (status, body) = send(&app, post("/generate/quiz", "web-1", quiz())).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body, json!({"success": false, "error": "insufficient_credits"}));

    let (status, body) = send(&app, get("/subscriptions/me", "web-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subscription"]["credits_balance"], 5);
    assert_eq!(body["subscription"]["credits_used"], 5);
    assert_eq!(body["subscription"]["status"], "active");
}

#[tokio::test]
async fn invalid_params_are_a_validation_error() {
    let (app, db) = app().await;
    CreditLedger::new(db.clone())
        .grant("web-1", 10, "test")
        .await
        .unwrap();

    let (status, body) = send(
        &app,
        post("/generate/quiz", "web-1", json!({"subject": "Biology"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert!(body["message"].as_str().unwrap().contains("topic"));

    let request = as_service(Request::post("/generate/quiz"), "web-1")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    // Nothing was charged.
    let (_, body) = send(&app, get("/subscriptions/me", "web-1")).await;
    assert_eq!(body["subscription"]["credits_balance"], 10);
}

#[tokio::test]
async fn unknown_type_is_not_found() {
    let (app, _db) = app().await;
    let (status, body) = send(&app, post("/generate/sonnet", "web-1", json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "unknown_generation_type");
}

#[tokio::test]
async fn user_without_subscription_gets_402() {
    let (app, _db) = app().await;
    let (status, body) = send(&app, post("/generate/quiz", "fresh", quiz())).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "no_subscription");
}

#[tokio::test]
async fn other_users_request_is_not_found() {
    let (app, db) = app().await;
    CreditLedger::new(db.clone())
        .grant("web-1", 10, "test")
        .await
        .unwrap();
    let (_, body) = send(&app, post("/generate/quiz", "web-1", quiz())).await;
    let id = body["requestId"].as_str().unwrap().to_string();

    let (status, body) = send(&app, get(&format!("/generate/{id}"), "web-2")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"success": false, "error": "not_found"}));

    let (status, _) = send(&app, get("/generate/does-not-exist", "web-1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn init_data(auth_date: i64) -> String {
    sign_init_data(
        &[
            ("auth_date", &auth_date.to_string()),
            ("query_id", "AAH"),
            (
                "user",
                r#"{"id":777,"first_name":"Anna","username":"anna_teacher"}"#,
            ),
        ],
        BOT_TOKEN,
    )
}

#[tokio::test]
async fn mini_app_user_is_registered_with_signup_grant() {
    let (app, _db) = app_with(auth(7), false).await;
    let raw = init_data(chrono::Utc::now().timestamp());
    let me = || {
        Request::get("/subscriptions/me")
            .header(header::AUTHORIZATION, format!("tma {raw}"))
            .body(Body::empty())
            .unwrap()
    };

    let (status, body) = send(&app, me()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subscription"]["credits_balance"], 7);

    // The second contact finds the same user and grants nothing more.
    let (_, body) = send(&app, me()).await;
    assert_eq!(body["subscription"]["credits_balance"], 7);
}

#[tokio::test]
async fn stale_or_tampered_init_data_is_rejected() {
    let (app, _db) = app_with(auth(7), false).await;
    let old = init_data(chrono::Utc::now().timestamp() - 7200);
    let request = Request::get("/subscriptions/me")
        .header(header::AUTHORIZATION, format!("tma {old}"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.0, StatusCode::UNAUTHORIZED);

    let tampered = init_data(chrono::Utc::now().timestamp()).replace("anna_teacher", "mallory");
    let request = Request::get("/subscriptions/me")
        .header(header::AUTHORIZATION, format!("tma {tampered}"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn metrics_need_the_service_token() {
    let (app, _db) = app_with(auth(0), true).await;
    let request = Request::get("/metrics").body(Body::empty()).unwrap();
    assert_eq!(send(&app, request).await.0, StatusCode::UNAUTHORIZED);

    let request = Request::get("/metrics")
        .header(header::AUTHORIZATION, format!("Bearer {SERVICE_TOKEN}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_str().unwrap().contains("prepodavai_generations_submitted_total"));
}

#[tokio::test]
async fn metrics_are_404_when_disabled() {
    let (app, _db) = app().await;
    let request = Request::get("/metrics")
        .header(header::AUTHORIZATION, format!("Bearer {SERVICE_TOKEN}"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.0, StatusCode::NOT_FOUND);
}
