//! Collaborator seams.
//!
//! The orchestrator, queue service and background tasks never touch the
//! database or the network directly. Each concern is a trait object so runs
//! can be driven against Postgres in production and against
//! [`MemoryStore`](crate::memory::MemoryStore) in tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use autopilot_core::queue::QueueStatus;
use autopilot_core::recommendation::RecommendationStatus;
use autopilot_core::run::{RunCounters, RunMode};
use autopilot_core::types::{DbId, SiteId, Timestamp};
use autopilot_db::models::alert::{Alert, CreateAlert};
use autopilot_db::models::autopilot::{AutopilotSettings, CreateQueueItem, QueueItem};
use autopilot_db::models::recommendation::{CreateRecommendation, Recommendation};
use autopilot_db::models::run::OptimizationRun;
use autopilot_db::models::site::{Site, SiteKnowledge, SitePage, TrackedKeyword};
use chrono::NaiveDate;

use crate::error::PipelineResult;

#[async_trait]
pub trait SiteStore: Send + Sync {
    async fn find_site(&self, site_id: SiteId) -> PipelineResult<Option<Site>>;
}

#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn get_knowledge(&self, site_id: SiteId) -> PipelineResult<Option<SiteKnowledge>>;
    async fn flag_retrain(&self, site_id: SiteId) -> PipelineResult<()>;
}

/// Page traffic metrics and tracked keyword positions.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Pages for a site ordered by recent clicks, busiest first.
    async fn page_metrics(&self, site_id: SiteId) -> PipelineResult<Vec<SitePage>>;
    async fn find_page(&self, page_id: DbId) -> PipelineResult<Option<SitePage>>;
    async fn mark_decaying(
        &self,
        page_id: DbId,
        severity: &str,
        detected_at: Timestamp,
    ) -> PipelineResult<()>;
    async fn tracked_keywords(&self, site_id: SiteId) -> PipelineResult<Vec<TrackedKeyword>>;
    async fn record_position(
        &self,
        keyword_id: DbId,
        position: Option<i32>,
        checked_at: Timestamp,
    ) -> PipelineResult<()>;
}

/// External keyword position lookup.
#[async_trait]
pub trait RankFetcher: Send + Sync {
    /// Current position for each keyword. Missing or `None` means unranked.
    async fn fetch_positions(
        &self,
        site: &Site,
        keywords: &[String],
    ) -> PipelineResult<HashMap<String, Option<i32>>>;
}

/// Language-model completion returning a structured JSON document.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        response_schema: &serde_json::Value,
    ) -> PipelineResult<serde_json::Value>;

    /// Model identifier recorded as recommendation provenance.
    fn model(&self) -> &str;
}

#[async_trait]
pub trait RecommendationStore: Send + Sync {
    /// Insert unless an identical `(site, page, title)` is already pending.
    async fn insert_if_absent(
        &self,
        input: &CreateRecommendation,
    ) -> PipelineResult<Option<Recommendation>>;
    async fn find_recommendation(&self, id: DbId) -> PipelineResult<Option<Recommendation>>;
    async fn list_recommendations(
        &self,
        site_id: SiteId,
        status: Option<RecommendationStatus>,
        limit: i64,
        offset: i64,
    ) -> PipelineResult<Vec<Recommendation>>;
    async fn list_pending_unqueued(&self, site_id: SiteId) -> PipelineResult<Vec<Recommendation>>;
    async fn count_pending_urgent(&self, site_id: SiteId) -> PipelineResult<i64>;
    /// Conditional status change. `None` when the row is not in any of `from`.
    async fn transition_recommendation(
        &self,
        id: DbId,
        from: &[RecommendationStatus],
        to: RecommendationStatus,
    ) -> PipelineResult<Option<Recommendation>>;
}

#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Admit an item. `None` when its recommendation is already queued.
    async fn create_item(&self, input: &CreateQueueItem) -> PipelineResult<Option<QueueItem>>;
    async fn find_item(&self, id: DbId) -> PipelineResult<Option<QueueItem>>;
    async fn list_items(
        &self,
        site_id: SiteId,
        status: Option<QueueStatus>,
        limit: i64,
        offset: i64,
    ) -> PipelineResult<Vec<QueueItem>>;
    /// `pending` and `approved` items, highest confidence first, then oldest.
    async fn list_applicable(&self, site_id: SiteId) -> PipelineResult<Vec<QueueItem>>;
    async fn review_item(
        &self,
        id: DbId,
        from: QueueStatus,
        to: QueueStatus,
        reviewed_by: Option<&str>,
        now: Timestamp,
    ) -> PipelineResult<Option<QueueItem>>;
    async fn mark_applied(
        &self,
        id: DbId,
        from: QueueStatus,
        baseline_clicks: i64,
        reviewed_by: Option<&str>,
        now: Timestamp,
    ) -> PipelineResult<Option<QueueItem>>;
    async fn mark_reverted(
        &self,
        id: DbId,
        reason: &str,
        now: Timestamp,
    ) -> PipelineResult<Option<QueueItem>>;
    async fn list_applied_since(&self, cutoff: Timestamp) -> PipelineResult<Vec<QueueItem>>;
}

/// Per-site, per-UTC-day applied change counter.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically take a slot if fewer than `cap` are used. `None` at the cap.
    async fn try_reserve(&self, site_id: SiteId, day: NaiveDate, cap: i32)
        -> PipelineResult<Option<i32>>;
    async fn release(&self, site_id: SiteId, day: NaiveDate) -> PipelineResult<()>;
    async fn applied_count(&self, site_id: SiteId, day: NaiveDate) -> PipelineResult<i32>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_or_create(&self, site_id: SiteId) -> PipelineResult<AutopilotSettings>;
    async fn update(&self, settings: &AutopilotSettings) -> PipelineResult<AutopilotSettings>;
}

#[async_trait]
pub trait RunStore: Send + Sync {
    /// Fails with [`RunInProgress`](crate::error::PipelineError::RunInProgress)
    /// when the site already has a running run.
    async fn create_running(
        &self,
        site_id: SiteId,
        mode: RunMode,
        started_at: Timestamp,
    ) -> PipelineResult<OptimizationRun>;
    async fn complete_run(
        &self,
        id: DbId,
        results: &serde_json::Value,
        counters: RunCounters,
        completed_at: Timestamp,
    ) -> PipelineResult<Option<OptimizationRun>>;
    async fn fail_run(
        &self,
        id: DbId,
        results: &serde_json::Value,
        error_message: &str,
        completed_at: Timestamp,
    ) -> PipelineResult<Option<OptimizationRun>>;
    async fn find_run(&self, id: DbId) -> PipelineResult<Option<OptimizationRun>>;
    async fn list_runs(
        &self,
        site_id: SiteId,
        limit: i64,
        offset: i64,
    ) -> PipelineResult<Vec<OptimizationRun>>;
    /// Fail runs still running since before `started_before`; returns their ids.
    async fn fail_stale(
        &self,
        started_before: Timestamp,
        error_message: &str,
        now: Timestamp,
    ) -> PipelineResult<Vec<DbId>>;
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn create_alert(&self, input: &CreateAlert, triggered_at: Timestamp) -> PipelineResult<Alert>;
    async fn find_alert(&self, id: DbId) -> PipelineResult<Option<Alert>>;
    async fn list_active_alerts(&self, site_id: SiteId) -> PipelineResult<Vec<Alert>>;
    /// `None` when the alert is missing or no longer active.
    async fn resolve_alert(&self, id: DbId, now: Timestamp) -> PipelineResult<Option<Alert>>;
}

/// Writes a queue item's field change to live content and undoes it.
#[async_trait]
pub trait ContentPublisher: Send + Sync {
    async fn publish(&self, item: &QueueItem) -> PipelineResult<()>;
    async fn rollback(&self, item: &QueueItem) -> PipelineResult<()>;
}

/// Every collaborator the engine needs, shared behind `Arc`s.
#[derive(Clone)]
pub struct Collaborators {
    pub sites: Arc<dyn SiteStore>,
    pub knowledge: Arc<dyn KnowledgeStore>,
    pub metrics: Arc<dyn MetricsStore>,
    /// `None` when no rank source is configured; ranking is then skipped.
    pub ranks: Option<Arc<dyn RankFetcher>>,
    pub completion: Arc<dyn CompletionService>,
    pub recommendations: Arc<dyn RecommendationStore>,
    pub queue: Arc<dyn QueueStore>,
    pub counters: Arc<dyn CounterStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub runs: Arc<dyn RunStore>,
    pub alerts: Arc<dyn AlertStore>,
    pub publisher: Arc<dyn ContentPublisher>,
}
