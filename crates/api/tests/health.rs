//! Integration tests for the health check endpoint and general HTTP behaviour.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{body_json, TestApp};

#[tokio::test]
async fn health_without_database_reports_ok() {
    let t = TestApp::new();
    let response = t.get("/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert!(json["db_healthy"].is_null());
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let t = TestApp::new();
    let response = t.get("/this-route-does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let t = TestApp::new();
    let response = t.get("/health").await;
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn preflight_from_dashboard_origin_is_allowed() {
    let t = TestApp::new();
    let request = Request::options("/optimize")
        .header("origin", "http://localhost:5173")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type,x-request-id")
        .body(Body::empty())
        .unwrap();

    let response = t.send(request).await;

    assert!(response.status().is_success());
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "http://localhost:5173");
    let allowed = headers["access-control-allow-headers"].to_str().unwrap();
    assert!(allowed.contains("x-request-id"));
}

#[tokio::test]
async fn unknown_origin_gets_no_cors_grant() {
    let t = TestApp::new();
    let request = Request::get("/health")
        .header("origin", "https://evil.test")
        .body(Body::empty())
        .unwrap();

    let response = t.send(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key("access-control-allow-origin"));
}
