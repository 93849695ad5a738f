mod helpers;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use helpers::*;
use marathon_bet::http_service;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceExt;

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().unwrap(),
        other => other.to_string().parse().unwrap(),
    }
}

#[sqlx::test]
async fn test_protected_route_requires_session(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    let router = http_service::router(app.state.clone());

    let (status, body) = send(router.clone(), get_request("/api/users/me/bets", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let (status, body) = send(router, get_request("/api/users/me/bets", Some("not-a-jwt"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");
}

#[sqlx::test]
async fn test_register_sets_session_cookie(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    let router = http_service::router(app.state.clone());

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/users/register",
            None,
            json!({ "name": "Ana", "email": "ana@example.com", "password": "secret123" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("auth_token="));
    assert!(cookie.contains("HttpOnly"));

    // The cookie alone authenticates later requests
    let pair = cookie.split(';').next().unwrap().to_string();
    let request = Request::builder()
        .uri("/api/users/me/groups")
        .header(header::COOKIE, pair)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[sqlx::test]
async fn test_unknown_route_is_json_404(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    let router = http_service::router(app.state.clone());

    let (status, body) = send(router, get_request("/api/nowhere", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[sqlx::test]
async fn test_place_and_cancel_bet_over_http(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    app.gateway.add_race_in_days(47, 10, &[1]);
    let ana = create_test_account(&app, "Ana", 10).await;
    let offer = create_test_offer(&app, 47, 1, 3).await;
    let token = app.state.session_keys.issue(&ana).unwrap();
    let router = http_service::router(app.state.clone());

    let (status, placed) = send(
        router.clone(),
        json_request(
            "POST",
            "/api/users/me/bets",
            Some(&token),
            json!({ "bet_id": offer.id, "solde": "4" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(decimal(&placed["balance"]), Decimal::from(6));
    assert_eq!(decimal(&placed["potential_payout"]), Decimal::from(12));

    let (status, again) = send(
        router.clone(),
        json_request(
            "POST",
            "/api/users/me/bets",
            Some(&token),
            json!({ "bet_id": offer.id, "amount": "1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(again["code"], "business_rule");

    let stake_id = placed["id"].as_str().unwrap();
    let (status, cancelled) = send(
        router,
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/users/me/bets/{}", stake_id))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&cancelled["balance"]), Decimal::from(10));
    assert_eq!(app.balance_of(ana.id).await, Decimal::from(10));
}

#[sqlx::test]
async fn test_insufficient_balance_over_http(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    app.gateway.add_race_in_days(47, 10, &[1]);
    let ana = create_test_account(&app, "Ana", 2).await;
    let offer = create_test_offer(&app, 47, 1, 3).await;
    let token = app.state.session_keys.issue(&ana).unwrap();
    let router = http_service::router(app.state.clone());

    let (status, body) = send(
        router,
        json_request(
            "POST",
            "/api/users/me/bets",
            Some(&token),
            json!({ "bet_id": offer.id, "amount": "5" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "insufficient_balance");
}

#[sqlx::test]
async fn test_admin_routes_refuse_regular_users(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    app.gateway.add_race_in_days(47, 10, &[1, 2]);
    let ana = create_test_account(&app, "Ana", 10).await;
    let root = create_test_admin(&app, "Root").await;
    let user_token = app.state.session_keys.issue(&ana).unwrap();
    let admin_token = app.state.session_keys.issue(&root).unwrap();
    let router = http_service::router(app.state.clone());

    let (status, _) = send(
        router.clone(),
        json_request("POST", "/api/bets/generate/47", Some(&user_token), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, report) = send(
        router,
        json_request("POST", "/api/bets/generate/47", Some(&admin_token), json!({})),
    )
    .await;
    assert!(status.is_success());
    assert_eq!(report["created"], 2);
}

#[sqlx::test]
async fn test_window_violation_reports_days_remaining(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    app.gateway.add_race_in_days(47, 1, &[1]);
    let root = create_test_admin(&app, "Root").await;
    let token = app.state.session_keys.issue(&root).unwrap();
    let router = http_service::router(app.state.clone());

    let (status, body) = send(
        router,
        json_request("POST", "/api/bets/generate/47", Some(&token), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "race_imminent");
    assert_eq!(body["days_remaining"], 1);
}

#[sqlx::test]
async fn test_malformed_requests_use_json_errors(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    let ana = create_test_account(&app, "Ana", 10).await;
    let token = app.state.session_keys.issue(&ana).unwrap();
    let router = http_service::router(app.state.clone());

    // Missing bet_id
    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/users/me/bets",
            Some(&token),
            json!({ "amount": "4" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("application/json"));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "validation");
    assert!(body["error"].as_str().unwrap().contains("bet_id"));

    // Body that is not JSON at all
    let request = Request::builder()
        .method("POST")
        .uri("/api/groups")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(router.clone(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");

    // Path segment that is not a UUID
    let (status, body) = send(router.clone(), get_request("/api/users/not-a-uuid", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");

    let (status, body) = send(router, get_request("/api/bets/race/abc", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");
}

#[sqlx::test]
async fn test_sub_cent_stake_rejected_over_http(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    app.gateway.add_race_in_days(47, 10, &[1]);
    let ana = create_test_account(&app, "Ana", 1).await;
    let offer = create_test_offer(&app, 47, 1, 3).await;
    let token = app.state.session_keys.issue(&ana).unwrap();
    let router = http_service::router(app.state.clone());

    let (status, body) = send(
        router,
        json_request(
            "POST",
            "/api/users/me/bets",
            Some(&token),
            json!({ "bet_id": offer.id, "solde": "0.005" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");
    assert_eq!(app.balance_of(ana.id).await, Decimal::ONE);
}
