//! API Integration Tests
//!
//! Drives the full router over in-memory backends.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

use wallet_gateway::api::{self, AppState};
use wallet_gateway::auth::PasswordService;
use wallet_gateway::{EngineSettings, ErrorResponse, Wallet};

struct Actor {
    user_id: Uuid,
    account_number: String,
    token: String,
}

fn app() -> Router {
    let wallet = Wallet::in_memory(
        EngineSettings::default(),
        PasswordService::with_cost(1024, 1).unwrap(),
    );
    api::build_router(AppState::new(wallet))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    dispatch(app, builder.body(body).unwrap()).await
}

async fn dispatch(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn register(app: &Router, name: &str, role: &'static str) -> Actor {
    let (status, json) = send(
        app,
        "POST",
        "/api/v1/users",
        None,
        Some(json!({
            "full_name": name,
            "email": format!("{}@example.com", name.to_lowercase()),
            "password": "password123",
            "role": role,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "registration of {} failed", name);
    let user_id = json["user_id"].as_str().unwrap().parse().unwrap();
    let account_number = json["account_number"].as_str().unwrap().to_string();

    let (status, session) = send(
        app,
        "POST",
        "/api/v1/sessions",
        None,
        Some(json!({
            "email": format!("{}@example.com", name.to_lowercase()),
            "password": "password123",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login of {} failed", name);

    Actor {
        user_id,
        account_number,
        token: session["token"].as_str().unwrap().to_string(),
    }
}

impl Actor {
    fn header(&self) -> Option<&str> {
        Some(&self.token)
    }
}

fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_login_and_lookup() {
    let app = app();
    let alice = register(&app, "Alice", "Customer").await;
    assert_eq!(alice.account_number, "1001");

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/sessions",
        None,
        Some(json!({"email": "ALICE@example.com", "password": "password123"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user_id"], alice.user_id.to_string());
    assert_eq!(json["role"], "Customer");
    assert!(json["expires_at"].is_string());

    // Every login opens its own session
    let token = json["token"].as_str().unwrap();
    assert_eq!(token.len(), 64);
    assert_ne!(token, alice.token);

    let uri = format!("/api/v1/users/{}/account", alice.user_id);
    let (status, json) = send(&app, "GET", &uri, alice.header(), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["account_number"], "1001");

    let uri = format!("/api/v1/users/{}/balance", alice.user_id);
    let (status, json) = send(&app, "GET", &uri, alice.header(), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&json["balances"]["USDollar"]), Decimal::ZERO);
    assert_eq!(decimal(&json["commission_balance"]), Decimal::ZERO);
}

#[tokio::test]
async fn test_login_and_registration_failures() {
    let app = app();
    register(&app, "Alice", "Customer").await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/sessions",
        None,
        Some(json!({"email": "alice@example.com", "password": "wrong-password"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error_code"], "invalid_credentials");

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/users",
        None,
        Some(json!({
            "full_name": "Alice Again",
            "email": "alice@example.com",
            "password": "password123",
            "role": "Customer",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error_code"], "duplicate_email");
}

#[tokio::test]
async fn test_transfer_e2e() {
    let app = app();
    let a = register(&app, "A", "Customer").await;
    let b = register(&app, "B", "Customer").await;
    let admin = register(&app, "Root", "Admin").await;

    // 1. Admin funds A
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/deposits",
        admin.header(),
        Some(json!({
            "account_number": a.account_number,
            "currency": "ZambianKwacha",
            "amount": "200",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // 2. A transfers to B out of their own account
    let (status, receipt) = send(
        &app,
        "POST",
        "/api/v1/transfers",
        a.header(),
        Some(json!({"destination_account": b.account_number, "currency": "ZMW", "amount": "50"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["kind"], "Transfer");
    assert_eq!(receipt["source_account"], a.account_number);

    // 3. Balances
    let uri = format!("/api/v1/users/{}/balance", a.user_id);
    let (_, json) = send(&app, "GET", &uri, a.header(), None).await;
    assert_eq!(decimal(&json["balances"]["ZambianKwacha"]), dec!(150));

    let uri = format!("/api/v1/users/{}/balance", b.user_id);
    let (_, json) = send(&app, "GET", &uri, admin.header(), None).await;
    assert_eq!(decimal(&json["balances"]["ZambianKwacha"]), dec!(50));
}

#[tokio::test]
async fn test_rejections_map_to_status_codes() {
    let app = app();
    let a = register(&app, "A", "Customer").await;
    let b = register(&app, "B", "Customer").await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/withdrawals",
        a.header(),
        Some(json!({"account_number": a.account_number, "currency": "USD", "amount": "500"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_code"], "insufficient_funds");

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/withdrawals",
        a.header(),
        Some(json!({"account_number": a.account_number, "currency": "EUR", "amount": "1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_code"], "invalid_currency");

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/transfers",
        a.header(),
        Some(json!({"destination_account": "9999", "currency": "USD", "amount": "1"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error_code"], "account_not_found");

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/exchanges",
        a.header(),
        Some(json!({
            "account_number": a.account_number,
            "from_currency": "USD",
            "to_currency": "USD",
            "amount": "1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_code"], "invalid_currency_pair");

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/bills",
        a.header(),
        Some(json!({
            "account_number": b.account_number,
            "bill_type": "Water",
            "currency": "USD",
            "amount": "1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error_code"], "unauthorized");
}

#[tokio::test]
async fn test_identity_comes_from_the_session_token() {
    let app = app();
    let a = register(&app, "A", "Customer").await;
    let b = register(&app, "B", "Customer").await;
    let admin = register(&app, "Root", "Admin").await;

    let deposit = json!({"account_number": b.account_number, "currency": "USD", "amount": "1000"});

    let (status, json) = send(&app, "POST", "/api/v1/deposits", None, Some(deposit.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error_code"], "missing_credentials");

    // Identity headers naming the admin carry no weight without a token
    let forged = Request::builder()
        .method("POST")
        .uri("/api/v1/deposits")
        .header("content-type", "application/json")
        .header("X-Request-User-Id", admin.user_id.to_string())
        .header("X-Request-Role", "Admin")
        .body(Body::from(deposit.to_string()))
        .unwrap();
    let (status, json) = dispatch(&app, forged).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error_code"], "missing_credentials");

    // Nor do they upgrade a customer's session
    let forged = Request::builder()
        .method("POST")
        .uri("/api/v1/deposits")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", a.token))
        .header("X-Request-User-Id", admin.user_id.to_string())
        .header("X-Request-Role", "Admin")
        .body(Body::from(deposit.to_string()))
        .unwrap();
    let (status, json) = dispatch(&app, forged).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error_code"], "unauthorized");

    let uri = format!("/api/v1/users/{}/balance", b.user_id);
    let (status, json) = send(&app, "GET", &uri, b.header(), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&json["balances"]["USDollar"]), Decimal::ZERO);

    let (status, json) = send(&app, "GET", &uri, Some("not-a-session"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error_code"], "invalid_session");

    let (status, _) = send(&app, "GET", &uri, a.header(), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_authorization_header_must_be_bearer() {
    let app = app();
    let a = register(&app, "A", "Customer").await;

    let request = Request::builder()
        .uri(format!("/api/v1/users/{}/account", a.user_id))
        .header("authorization", format!("Basic {}", a.token))
        .body(Body::empty())
        .unwrap();
    let (status, json) = dispatch(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_code"], "invalid_header");
}

#[tokio::test]
async fn test_logout_revokes_the_token() {
    let app = app();
    let a = register(&app, "A", "Customer").await;
    let uri = format!("/api/v1/users/{}/account", a.user_id);

    let (status, _) = send(&app, "GET", &uri, a.header(), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "DELETE", "/api/v1/sessions", a.header(), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, json) = send(&app, "GET", &uri, a.header(), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error_code"], "invalid_session");

    let (status, json) = send(&app, "DELETE", "/api/v1/sessions", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error_code"], "missing_credentials");
}

#[tokio::test]
async fn test_malformed_body_is_invalid_request() {
    let app = app();
    let a = register(&app, "A", "Customer").await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/withdrawals")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", a.token))
        .body(Body::from("{\"account_number\": "))
        .unwrap();
    let (status, json) = dispatch(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let error: ErrorResponse = serde_json::from_value(json).unwrap();
    assert_eq!(error.error_code, "invalid_request");
    assert!(error.details.is_some());

    // Well-formed JSON of the wrong shape is rejected the same way
    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/withdrawals",
        a.header(),
        Some(json!({"account_number": a.account_number, "currency": "USD"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_code"], "invalid_request");
}

#[tokio::test]
async fn test_correlation_id_is_echoed() {
    let app = app();
    let correlation_id = Uuid::new_v4();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/users/00000000-0000-0000-0000-000000000000/account")
                .header("X-Correlation-Id", correlation_id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let echoed = response
        .headers()
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert_eq!(echoed, correlation_id.to_string());
}

#[tokio::test]
async fn test_history_lists_completed_and_rejected() {
    let app = app();
    let a = register(&app, "A", "Customer").await;
    let admin = register(&app, "Root", "Admin").await;

    send(
        &app,
        "POST",
        "/api/v1/deposits",
        admin.header(),
        Some(json!({"account_number": a.account_number, "currency": "USD", "amount": "10"})),
    )
    .await;
    send(
        &app,
        "POST",
        "/api/v1/withdrawals",
        a.header(),
        Some(json!({"account_number": a.account_number, "currency": "USD", "amount": "11"})),
    )
    .await;

    let uri = format!("/api/v1/accounts/{}/history", a.account_number);
    let (status, json) = send(&app, "GET", &uri, a.header(), None).await;
    assert_eq!(status, StatusCode::OK);

    let entries = json["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["status"], "completed");
    assert_eq!(entries[1]["status"], "rejected");
    assert_eq!(entries[1]["reason"], "insufficient_funds");
}

#[tokio::test]
async fn test_agent_commission_visible_in_balance() {
    let app = app();
    let customer = register(&app, "Customer", "Customer").await;
    let agent = register(&app, "Agent", "Agent").await;

    let (status, receipt) = send(
        &app,
        "POST",
        "/api/v1/deposits",
        agent.header(),
        Some(json!({
            "account_number": customer.account_number,
            "currency": "MWK",
            "amount": "500",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(decimal(&receipt["commission_applied"]), Decimal::ONE);

    let uri = format!("/api/v1/users/{}/balance", agent.user_id);
    let (_, json) = send(&app, "GET", &uri, agent.header(), None).await;
    assert_eq!(decimal(&json["commission_balance"]), Decimal::ONE);
}
