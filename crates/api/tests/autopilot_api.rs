//! HTTP-level tests for autopilot settings and the review queue.

mod common;

use axum::http::StatusCode;
use common::{body_json, TestApp};
use serde_json::json;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[tokio::test]
async fn settings_are_created_with_defaults_on_first_read() {
    let t = TestApp::new();
    let site = t.site().await;

    let response = t
        .get(&format!("/api/v1/sites/{}/autopilot/settings", site.id))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let data = &body_json(response).await["data"];
    assert_eq!(data["enabled"], false);
    assert_eq!(data["confidence_threshold"], 80);
    assert_eq!(data["max_daily_changes"], 5);
    assert_eq!(data["high_traffic_threshold"], 1000);
    assert_eq!(data["auto_revert_threshold"], 20.0);
}

#[tokio::test]
async fn partial_update_keeps_other_fields() {
    let t = TestApp::new();
    let site = t.site().await;
    let uri = format!("/api/v1/sites/{}/autopilot/settings", site.id);

    let response = t
        .put_json(&uri, json!({ "enabled": true, "max_daily_changes": 2 }))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let data = &body_json(response).await["data"];
    assert_eq!(data["enabled"], true);
    assert_eq!(data["max_daily_changes"], 2);
    assert_eq!(data["confidence_threshold"], 80);

    let reread = body_json(t.get(&uri).await).await;
    assert_eq!(reread["data"]["max_daily_changes"], 2);
}

#[tokio::test]
async fn out_of_range_threshold_is_rejected() {
    let t = TestApp::new();
    let site = t.site().await;
    let uri = format!("/api/v1/sites/{}/autopilot/settings", site.id);

    let response = t.put_json(&uri, json!({ "confidence_threshold": 101 })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    let response = t.put_json(&uri, json!({ "max_daily_changes": 0 })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let unchanged = body_json(t.get(&uri).await).await;
    assert_eq!(unchanged["data"]["confidence_threshold"], 80);
    assert_eq!(unchanged["data"]["max_daily_changes"], 5);
}

#[tokio::test]
async fn mistyped_settings_field_returns_error_envelope() {
    let t = TestApp::new();
    let site = t.site().await;
    let uri = format!("/api/v1/sites/{}/autopilot/settings", site.id);

    let response = t.put_json(&uri, json!({ "max_daily_changes": "lots" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_BODY");
}

#[tokio::test]
async fn unknown_change_type_is_rejected() {
    let t = TestApp::new();
    let site = t.site().await;

    let response = t
        .put_json(
            &format!("/api/v1/sites/{}/autopilot/settings", site.id),
            json!({ "allowed_change_types": ["title", "body_rewrite"] }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

#[tokio::test]
async fn queue_list_filters_by_status() {
    let t = TestApp::new();
    let site = t.site().await;
    let first = t.seed_item(site.id, 90, false).await;
    t.seed_item(site.id, 70, true).await;

    t.post_json(
        &format!("/api/v1/autopilot/queue/{}/approve", first.id),
        json!({}),
    )
    .await;

    let all = body_json(
        t.get(&format!("/api/v1/sites/{}/autopilot/queue", site.id))
            .await,
    )
    .await;
    assert_eq!(all["data"].as_array().unwrap().len(), 2);

    let approved = body_json(
        t.get(&format!("/api/v1/sites/{}/autopilot/queue?status=approved", site.id))
            .await,
    )
    .await;
    let items = approved["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], first.id);
}

#[tokio::test]
async fn queue_list_rejects_unknown_status() {
    let t = TestApp::new();
    let site = t.site().await;

    let response = t
        .get(&format!("/api/v1/sites/{}/autopilot/queue?status=queued", site.id))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn approve_records_reviewer() {
    let t = TestApp::new();
    let site = t.site().await;
    let item = t.seed_item(site.id, 85, true).await;

    let response = t
        .post_json(
            &format!("/api/v1/autopilot/queue/{}/approve", item.id),
            json!({ "reviewed_by": "ops@acme.test" }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let data = &body_json(response).await["data"];
    assert_eq!(data["status"], "approved");
    assert_eq!(data["reviewed_by"], "ops@acme.test");
    assert!(data["reviewed_at"].is_string());
}

#[tokio::test]
async fn rejected_item_cannot_be_approved() {
    let t = TestApp::new();
    let site = t.site().await;
    let item = t.seed_item(site.id, 85, true).await;

    let response = t
        .post_json(&format!("/api/v1/autopilot/queue/{}/reject", item.id), json!({}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "rejected");

    let response = t
        .post_json(&format!("/api/v1/autopilot/queue/{}/approve", item.id), json!({}))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn apply_now_publishes_low_confidence_item() {
    let t = TestApp::new();
    let site = t.site().await;
    let item = t.seed_item(site.id, 40, true).await;

    let response = t
        .post_json(&format!("/api/v1/autopilot/queue/{}/apply", item.id), json!({}))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let data = &body_json(response).await["data"];
    assert_eq!(data["status"], "applied");
    assert_eq!(data["baseline_clicks"], 120);
    assert!(data["applied_at"].is_string());
    assert_eq!(t.publisher.published().await, vec![item.id]);
}

#[tokio::test]
async fn apply_now_respects_daily_cap() {
    let t = TestApp::new();
    let site = t.site().await;
    t.enable_autopilot(site.id, 1).await;
    let first = t.seed_item(site.id, 90, false).await;
    let second = t.seed_item(site.id, 90, false).await;

    let response = t
        .post_json(&format!("/api/v1/autopilot/queue/{}/apply", first.id), json!({}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = t
        .post_json(&format!("/api/v1/autopilot/queue/{}/apply", second.id), json!({}))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "CONFLICT");
    assert!(json["error"].as_str().unwrap().contains("daily change cap of 1 reached"));

    assert_eq!(t.publisher.published().await, vec![first.id]);
}

#[tokio::test]
async fn applied_item_cannot_be_applied_again() {
    let t = TestApp::new();
    let site = t.site().await;
    let item = t.seed_item(site.id, 90, false).await;
    let uri = format!("/api/v1/autopilot/queue/{}/apply", item.id);

    assert_eq!(t.post_json(&uri, json!({})).await.status(), StatusCode::OK);

    let response = t.post_json(&uri, json!({})).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn publish_failure_maps_to_502() {
    let t = TestApp::new();
    let site = t.site().await;
    let item = t.seed_item(site.id, 90, false).await;
    t.publisher.fail_publishes(true);

    let response = t
        .post_json(&format!("/api/v1/autopilot/queue/{}/apply", item.id), json!({}))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["code"], "UPSTREAM_ERROR");
}

#[tokio::test]
async fn actions_on_missing_item_return_404() {
    let t = TestApp::new();

    for action in ["approve", "reject", "apply"] {
        let response = t
            .post_json(&format!("/api/v1/autopilot/queue/999999/{action}"), json!({}))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "action {action}");
    }
}
