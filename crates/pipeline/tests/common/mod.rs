//! Shared fixtures for pipeline integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use autopilot_core::types::{DbId, SiteId};
use autopilot_db::models::autopilot::{AutopilotSettings, CreateQueueItem, QueueItem};
use autopilot_db::models::site::{Site, SitePage};
use autopilot_events::EventBus;
use autopilot_pipeline::memory::{MemoryPublisher, MemoryStore, StaticCompletion};
use autopilot_pipeline::store::{QueueStore, RankFetcher, SettingsStore};
use autopilot_pipeline::{EngineConfig, Orchestrator};
use chrono::Utc;
use serde_json::json;

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub publisher: Arc<MemoryPublisher>,
    pub completion: Arc<StaticCompletion>,
    pub events: Arc<EventBus>,
    pub orchestrator: Arc<Orchestrator>,
}

impl Harness {
    pub fn new(completion: StaticCompletion) -> Self {
        Self::build(completion, EngineConfig::default(), None)
    }

    pub fn build(
        completion: StaticCompletion,
        config: EngineConfig,
        ranks: Option<Arc<dyn RankFetcher>>,
    ) -> Self {
        let store = MemoryStore::new();
        let publisher = MemoryPublisher::new();
        let completion = Arc::new(completion);
        let events = Arc::new(EventBus::default());

        let mut stores = store.collaborators(completion.clone(), publisher.clone());
        stores.ranks = ranks;
        let orchestrator = Arc::new(Orchestrator::new(stores, Arc::clone(&events), config));

        Self {
            store,
            publisher,
            completion,
            events,
            orchestrator,
        }
    }

    pub async fn site(&self) -> Site {
        self.store.add_site("Acme", "acme.test").await
    }

    /// Add a page at `https://acme.test{path}` with 200 impressions in the last week.
    pub async fn page(&self, site_id: SiteId, path: &str, clicks_28d: i64, clicks_prev_28d: i64) -> SitePage {
        self.store
            .add_page(site_id, &format!("https://acme.test{path}"), clicks_28d, clicks_prev_28d, 200)
            .await
    }

    /// Enable the autopilot with the given confidence threshold and daily cap.
    pub async fn enable_autopilot(&self, site_id: SiteId, threshold: i16, cap: i32) -> AutopilotSettings {
        let mut settings = self.store.get_or_create(site_id).await.unwrap();
        settings.enabled = true;
        settings.confidence_threshold = threshold;
        settings.max_daily_changes = cap;
        self.store.put_settings(settings.clone()).await;
        settings
    }
}

pub fn no_recommendations() -> StaticCompletion {
    StaticCompletion::new(json!({ "recommendations": [] }))
}

/// An auto-fixable recommendation for `path`.
pub fn rec(path: &str, title: &str, category: &str, confidence: f64) -> serde_json::Value {
    json!({
        "page_url": format!("https://acme.test{path}"),
        "title": title,
        "description": "Generated in test",
        "category": category,
        "priority": "medium",
        "current_value": "Old value",
        "suggested_value": format!("New value for {title}"),
        "confidence": confidence,
        "auto_fixable": true
    })
}

pub fn completion_with(items: Vec<serde_json::Value>) -> StaticCompletion {
    StaticCompletion::new(json!({ "recommendations": items }))
}

pub fn today() -> chrono::NaiveDate {
    Utc::now().date_naive()
}

/// Queue a title change for `page_id` directly, bypassing admission.
pub async fn seed_item(
    h: &Harness,
    site_id: SiteId,
    page_id: DbId,
    recommendation_id: Option<DbId>,
    confidence: i16,
    requires_approval: bool,
) -> QueueItem {
    h.store
        .create_item(&CreateQueueItem {
            site_id,
            recommendation_id,
            page_id: Some(page_id),
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
