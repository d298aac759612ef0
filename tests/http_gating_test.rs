mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use common::TestApp;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn send(
    app: &TestApp,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }

    let request = match body {
        Some(value) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(value.to_string()))
            .expect("request builds"),
        None => builder.body(Body::empty()).expect("request builds"),
    };

    let response = app
        .router()
        .oneshot(request)
        .await
        .expect("router responds");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body reads")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn guest_token(app: &TestApp) -> String {
    let (status, body) = send(app, Method::POST, "/api/v1/auth/guest", None, None).await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["access_token"]
        .as_str()
        .expect("guest token present")
        .to_string()
}

#[tokio::test]
async fn public_routes_need_no_session() {
    let app = TestApp::new().await;

    let (status, _) = send(&app, Method::GET, "/api/v1/menu", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::GET, "/api/v1/reviews", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admin_routes_unreachable_without_admin_identity() {
    let app = TestApp::new().await;

    // No session at all
    let (status, _) = send(&app, Method::GET, "/api/v1/admin/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Guest session: authenticated but never admin, regardless of the
    // guest flag
    let token = guest_token(&app).await;
    let (status, _) = send(
        &app,
        Method::GET,
        "/api/v1/admin/orders",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn guest_sessions_cannot_submit_reviews() {
    let app = TestApp::new().await;
    let token = guest_token(&app).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/reviews",
        Some(&token),
        Some(json!({"item_name": "Samosa", "rating": 5, "comment": "Crisp"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn guest_session_shape() {
    let app = TestApp::new().await;
    let token = guest_token(&app).await;

    let (status, body) = send(&app, Method::GET, "/api/v1/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_guest"], json!(true));
    assert_eq!(body["data"]["is_admin"], json!(false));
    assert_eq!(body["data"]["user"], Value::Null);
}

#[tokio::test]
async fn registered_flow_review_and_like() {
    let app = TestApp::new().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/register",
        None,
        Some(json!({
            "full_name": "John Student",
            "email": "student@college.edu",
            "phone": "9876543210",
            "password": "student123",
            "role": "Student",
            "roll_number": "CS-2021-042"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["needs_email_confirmation"], json!(false));
    let token = body["data"]["token"]["access_token"]
        .as_str()
        .expect("token issued")
        .to_string();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/reviews",
        Some(&token),
        Some(json!({"item_name": "Samosa", "rating": 5, "comment": "Crisp and fresh"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    // Author name and role are denormalized at write time
    assert_eq!(body["data"]["user_name"], json!("John Student"));
    assert_eq!(body["data"]["user_role"], json!("Student"));
    let review_id = body["data"]["id"].as_str().expect("review id").to_string();

    // Likes are unauthenticated and unbounded
    let like_uri = format!("/api/v1/reviews/{}/like", review_id);
    let (status, body) = send(&app, Method::POST, &like_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["likes"], json!(1));
    let (status, body) = send(&app, Method::POST, &like_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["likes"], json!(2));
}

#[tokio::test]
async fn admin_login_requires_code_and_role() {
    let app = TestApp::new().await;

    // A registered admin (created with the access code)
    app.auth_service
        .register(canteen_api::auth::RegisterRequest {
            full_name: "Canteen Admin".to_string(),
            email: "admin@college.edu".to_string(),
            phone: "9876543212".to_string(),
            password: "admin123".to_string(),
            role: canteen_api::entities::profile::Role::Admin,
            roll_number: None,
            admin_code: Some("ADMIN123".to_string()),
        })
        .await
        .expect("admin registers");

    // Student presenting the admin code is rejected outright
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/auth/register",
        None,
        Some(json!({
            "full_name": "John Student",
            "email": "student@college.edu",
            "phone": "9876543210",
            "password": "student123",
            "role": "Student"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({
            "identifier": "student@college.edu",
            "password": "student123",
            "admin_code": "ADMIN123"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Wrong code fails even for a real admin
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({
            "identifier": "admin@college.edu",
            "password": "admin123",
            "admin_code": "WRONG"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Correct code and role opens the admin surface
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({
            "identifier": "admin@college.edu",
            "password": "admin123",
            "admin_code": "ADMIN123"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"]["access_token"]
        .as_str()
        .expect("admin token")
        .to_string();

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/v1/admin/orders",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/v1/admin/users/stats",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
