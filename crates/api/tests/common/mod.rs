//! Shared helpers for API integration tests.
//!
//! The app is built over the in-memory stores so tests exercise the full
//! middleware stack and handlers without a database.

#![allow(dead_code)]

use std::sync::Arc;

use autopilot_api::config::ServerConfig;
use autopilot_api::router::build_app_router;
use autopilot_api::state::AppState;
use autopilot_core::types::{DbId, SiteId};
use autopilot_db::models::autopilot::{CreateQueueItem, QueueItem};
use autopilot_db::models::site::Site;
use autopilot_events::EventBus;
use autopilot_pipeline::memory::{MemoryPublisher, MemoryStore, StaticCompletion};
use autopilot_pipeline::store::{QueueStore, SettingsStore};
use autopilot_pipeline::{EngineConfig, Orchestrator};
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
    }
}

pub struct TestApp {
    pub app: Router,
    pub store: Arc<MemoryStore>,
    pub publisher: Arc<MemoryPublisher>,
    pub orchestrator: Arc<Orchestrator>,
}

impl TestApp {
    /// App whose completion service returns no recommendations.
    pub fn new() -> Self {
        Self::with_completion(StaticCompletion::new(json!({ "recommendations": [] })))
    }

    pub fn with_completion(completion: StaticCompletion) -> Self {
        let store = MemoryStore::new();
        let publisher = MemoryPublisher::new();
        let stores = store.collaborators(Arc::new(completion), publisher.clone());
        let event_bus = Arc::new(EventBus::default());
        let orchestrator = Arc::new(Orchestrator::new(
            stores,
            event_bus,
            EngineConfig::default(),
        ));

        let config = test_config();
        let state = AppState {
            pool: None,
            config: Arc::new(config.clone()),
            orchestrator: orchestrator.clone(),
        };

        Self {
            app: build_app_router(state, &config),
            store,
            publisher,
            orchestrator,
        }
    }

    pub async fn site(&self) -> Site {
        self.store.add_site("Acme", "acme.test").await
    }

    /// Enable the autopilot with the given daily cap.
    pub async fn enable_autopilot(&self, site_id: SiteId, cap: i32) {
        let mut settings = self.store.get_or_create(site_id).await.unwrap();
        settings.enabled = true;
        settings.max_daily_changes = cap;
        self.store.put_settings(settings).await;
    }

    /// Queue a title change on a fresh page.
    pub async fn seed_item(&self, site_id: SiteId, confidence: i16, requires_approval: bool) -> QueueItem {
        let page = self
            .store
            .add_page(site_id, "https://acme.test/pricing", 120, 130, 200)
            .await;
        self.store
            .create_item(&CreateQueueItem {
                site_id,
                recommendation_id: None,
                page_id: Some(page.id),
                change_type: "title".to_string(),
                field: "title".to_string(),
                old_value: Some("Pricing".to_string()),
                suggested_value: "Pricing Plans for Teams".to_string(),
                ai_confidence: confidence,
                is_high_traffic: false,
                requires_approval,
            })
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        send(self.app.clone(), Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response<Body> {
        send(self.app.clone(), json_request("POST", uri, body)).await
    }

    pub async fn put_json(&self, uri: &str, body: serde_json::Value) -> Response<Body> {
        send(self.app.clone(), json_request("PUT", uri, body)).await
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        send(self.app.clone(), request).await
    }

    /// POST an arbitrary body, optionally with a content type.
    pub async fn post_raw(&self, uri: &str, content_type: Option<&str>, body: &str) -> Response<Body> {
        let mut request = Request::post(uri);
        if let Some(content_type) = content_type {
            request = request.header("content-type", content_type);
        }
        send(self.app.clone(), request.body(Body::from(body.to_string())).unwrap()).await
    }
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll a run until it leaves `running`.
pub async fn wait_for_run(t: &TestApp, run_id: DbId) -> serde_json::Value {
    for _ in 0..200 {
        let run = body_json(t.get(&format!("/api/v1/runs/{run_id}")).await).await;
        if run["data"]["status"] != "running" {
            return run["data"].clone();
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("run {run_id} never finished");
}
