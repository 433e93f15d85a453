//! In-process collaborators.
//!
//! [`MemoryStore`] implements every store trait over a single mutex-guarded
//! state so runs, queue actions and the HTTP layer can be exercised without a
//! database. The fakes at the bottom stand in for the network collaborators.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use autopilot_core::alert::{ALERT_STATUS_ACTIVE, ALERT_STATUS_RESOLVED};
use autopilot_core::queue::QueueStatus;
use autopilot_core::recommendation::{Priority, RecommendationStatus};
use autopilot_core::run::{RunCounters, RunMode, RunStatus};
use autopilot_core::types::{DbId, SiteId, Timestamp};
use autopilot_db::models::alert::{Alert, CreateAlert};
use autopilot_db::models::autopilot::{AutopilotSettings, CreateQueueItem, QueueItem};
use autopilot_db::models::recommendation::{CreateRecommendation, Recommendation};
use autopilot_db::models::run::OptimizationRun;
use autopilot_db::models::site::{Site, SiteKnowledge, SitePage, TrackedKeyword};
use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;

use crate::error::{PipelineError, PipelineResult};
use crate::store::*;

#[derive(Default)]
struct MemoryState {
    next_id: DbId,
    sites: HashMap<SiteId, Site>,
    knowledge: HashMap<SiteId, SiteKnowledge>,
    pages: BTreeMap<DbId, SitePage>,
    keywords: BTreeMap<DbId, TrackedKeyword>,
    recommendations: BTreeMap<DbId, Recommendation>,
    queue: BTreeMap<DbId, QueueItem>,
    counters: HashMap<(SiteId, NaiveDate), i32>,
    settings: HashMap<SiteId, AutopilotSettings>,
    runs: BTreeMap<DbId, OptimizationRun>,
    alerts: BTreeMap<DbId, Alert>,
}

impl MemoryState {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

/// Every store seam kept in memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wire every store seam to this instance. Ranking is left unconfigured.
    pub fn collaborators(
        self: &Arc<Self>,
        completion: Arc<dyn CompletionService>,
        publisher: Arc<dyn ContentPublisher>,
    ) -> Collaborators {
        Collaborators {
            sites: self.clone(),
            knowledge: self.clone(),
            metrics: self.clone(),
            ranks: None,
            completion,
            recommendations: self.clone(),
            queue: self.clone(),
            counters: self.clone(),
            settings: self.clone(),
            runs: self.clone(),
            alerts: self.clone(),
            publisher,
        }
    }

    // -- seeding ------------------------------------------------------------

    pub async fn add_site(&self, name: &str, domain: &str) -> Site {
        let now = Utc::now();
        let site = Site {
            id: SiteId::new_v4(),
            name: name.to_string(),
            domain: domain.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.state.lock().await.sites.insert(site.id, site.clone());
        site
    }

    pub async fn set_knowledge(&self, site_id: SiteId, last_trained_at: Option<Timestamp>) {
        let knowledge = SiteKnowledge {
            site_id,
            business_profile: serde_json::json!({ "industry": "software" }),
            last_trained_at,
            needs_retrain: false,
            retrain_requested_at: None,
            updated_at: Utc::now(),
        };
        self.state.lock().await.knowledge.insert(site_id, knowledge);
    }

    pub async fn add_page(
        &self,
        site_id: SiteId,
        url: &str,
        clicks_28d: i64,
        clicks_prev_28d: i64,
        impressions_7d: i64,
    ) -> SitePage {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let page = SitePage {
            id: state.next_id(),
            site_id,
            url: url.to_string(),
            clicks_28d,
            clicks_prev_28d,
            impressions_28d: impressions_7d * 4,
            impressions_7d,
            is_decaying: false,
            decay_severity: None,
            decay_detected_at: None,
            created_at: now,
            updated_at: now,
        };
        state.pages.insert(page.id, page.clone());
        page
    }

    /// Overwrite a page's current 28-day clicks, as a metrics refresh would.
    pub async fn set_page_clicks(&self, page_id: DbId, clicks_28d: i64) {
        if let Some(page) = self.state.lock().await.pages.get_mut(&page_id) {
            page.clicks_28d = clicks_28d;
            page.updated_at = Utc::now();
        }
    }

    pub async fn track_keyword(&self, site_id: SiteId, keyword: &str, position: Option<i32>) -> TrackedKeyword {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let kw = TrackedKeyword {
            id: state.next_id(),
            site_id,
            keyword: keyword.to_string(),
            page_id: None,
            position,
            previous_position: None,
            checked_at: None,
            created_at: now,
            updated_at: now,
        };
        state.keywords.insert(kw.id, kw.clone());
        kw
    }

    pub async fn put_settings(&self, settings: AutopilotSettings) {
        self.state.lock().await.settings.insert(settings.site_id, settings);
    }

    /// Shift a queue item's `applied_at` into the past.
    pub async fn backdate_applied(&self, item_id: DbId, applied_at: Timestamp) {
        if let Some(item) = self.state.lock().await.queue.get_mut(&item_id) {
            item.applied_at = Some(applied_at);
        }
    }

    /// Shift a run's `started_at` into the past.
    pub async fn backdate_run(&self, run_id: DbId, started_at: Timestamp) {
        if let Some(run) = self.state.lock().await.runs.get_mut(&run_id) {
            run.started_at = started_at;
        }
    }

    // -- inspection ---------------------------------------------------------

    pub async fn knowledge(&self, site_id: SiteId) -> Option<SiteKnowledge> {
        self.state.lock().await.knowledge.get(&site_id).cloned()
    }

    pub async fn page(&self, page_id: DbId) -> Option<SitePage> {
        self.state.lock().await.pages.get(&page_id).cloned()
    }

    pub async fn keywords(&self, site_id: SiteId) -> Vec<TrackedKeyword> {
        let state = self.state.lock().await;
        state.keywords.values().filter(|k| k.site_id == site_id).cloned().collect()
    }

    pub async fn recommendations(&self, site_id: SiteId) -> Vec<Recommendation> {
        let state = self.state.lock().await;
        state
            .recommendations
            .values()
            .filter(|r| r.site_id == site_id)
            .cloned()
            .collect()
    }

    pub async fn queue_items(&self, site_id: SiteId) -> Vec<QueueItem> {
        let state = self.state.lock().await;
        state.queue.values().filter(|q| q.site_id == site_id).cloned().collect()
    }

    pub async fn alerts(&self, site_id: SiteId) -> Vec<Alert> {
        let state = self.state.lock().await;
        state.alerts.values().filter(|a| a.site_id == site_id).cloned().collect()
    }
}

#[async_trait]
impl SiteStore for MemoryStore {
    async fn find_site(&self, site_id: SiteId) -> PipelineResult<Option<Site>> {
        Ok(self.state.lock().await.sites.get(&site_id).cloned())
    }
}

#[async_trait]
impl KnowledgeStore for MemoryStore {
    async fn get_knowledge(&self, site_id: SiteId) -> PipelineResult<Option<SiteKnowledge>> {
        Ok(self.knowledge(site_id).await)
    }

    async fn flag_retrain(&self, site_id: SiteId) -> PipelineResult<()> {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        let entry = state.knowledge.entry(site_id).or_insert_with(|| SiteKnowledge {
            site_id,
            business_profile: serde_json::json!({}),
            last_trained_at: None,
            needs_retrain: false,
            retrain_requested_at: None,
            updated_at: now,
        });
        entry.needs_retrain = true;
        entry.retrain_requested_at = Some(now);
        entry.updated_at = now;
        Ok(())
    }
}

#[async_trait]
impl MetricsStore for MemoryStore {
    async fn page_metrics(&self, site_id: SiteId) -> PipelineResult<Vec<SitePage>> {
        let state = self.state.lock().await;
        let mut pages: Vec<SitePage> = state
            .pages
            .values()
            .filter(|p| p.site_id == site_id)
            .cloned()
            .collect();
        pages.sort_by(|a, b| b.clicks_28d.cmp(&a.clicks_28d).then(a.id.cmp(&b.id)));
        Ok(pages)
    }

    async fn find_page(&self, page_id: DbId) -> PipelineResult<Option<SitePage>> {
        Ok(self.page(page_id).await)
    }

    async fn mark_decaying(
        &self,
        page_id: DbId,
        severity: &str,
        detected_at: Timestamp,
    ) -> PipelineResult<()> {
        if let Some(page) = self.state.lock().await.pages.get_mut(&page_id) {
            page.is_decaying = true;
            page.decay_severity = Some(severity.to_string());
            page.decay_detected_at = Some(detected_at);
        }
        Ok(())
    }

    async fn tracked_keywords(&self, site_id: SiteId) -> PipelineResult<Vec<TrackedKeyword>> {
        Ok(self.keywords(site_id).await)
    }

    async fn record_position(
        &self,
        keyword_id: DbId,
        position: Option<i32>,
        checked_at: Timestamp,
    ) -> PipelineResult<()> {
        if let Some(kw) = self.state.lock().await.keywords.get_mut(&keyword_id) {
            kw.previous_position = kw.position;
            kw.position = position;
            kw.checked_at = Some(checked_at);
        }
        Ok(())
    }
}

#[async_trait]
impl RecommendationStore for MemoryStore {
    async fn insert_if_absent(
        &self,
        input: &CreateRecommendation,
    ) -> PipelineResult<Option<Recommendation>> {
        let mut state = self.state.lock().await;
        let pending = RecommendationStatus::Pending.as_str();
        let duplicate = state.recommendations.values().any(|r| {
            r.site_id == input.site_id
                && r.page_id == input.page_id
                && r.title == input.title
                && r.status == pending
        });
        if duplicate {
            return Ok(None);
        }

        let now = Utc::now();
        let rec = Recommendation {
            id: state.next_id(),
            site_id: input.site_id,
            page_id: input.page_id,
            title: input.title.clone(),
            description: input.description.clone(),
            category: input.category.clone(),
            priority: input.priority.clone(),
            current_value: input.current_value.clone(),
            suggested_value: input.suggested_value.clone(),
            confidence: input.confidence,
            auto_fixable: input.auto_fixable,
            status: pending.to_string(),
            model: input.model.clone(),
            generated_at: input.generated_at,
            created_at: now,
            updated_at: now,
        };
        state.recommendations.insert(rec.id, rec.clone());
        Ok(Some(rec))
    }

    async fn find_recommendation(&self, id: DbId) -> PipelineResult<Option<Recommendation>> {
        Ok(self.state.lock().await.recommendations.get(&id).cloned())
    }

    async fn list_recommendations(
        &self,
        site_id: SiteId,
        status: Option<RecommendationStatus>,
        limit: i64,
        offset: i64,
    ) -> PipelineResult<Vec<Recommendation>> {
        let state = self.state.lock().await;
        Ok(state
            .recommendations
            .values()
            .rev()
            .filter(|r| r.site_id == site_id)
            .filter(|r| status.map_or(true, |s| r.status == s.as_str()))
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_pending_unqueued(&self, site_id: SiteId) -> PipelineResult<Vec<Recommendation>> {
        let state = self.state.lock().await;
        let pending = RecommendationStatus::Pending.as_str();
        let mut recs: Vec<Recommendation> = state
            .recommendations
            .values()
            .filter(|r| r.site_id == site_id && r.status == pending)
            .filter(|r| !state.queue.values().any(|q| q.recommendation_id == Some(r.id)))
            .cloned()
            .collect();
        recs.sort_by(|a, b| b.confidence.cmp(&a.confidence).then(a.id.cmp(&b.id)));
        Ok(recs)
    }

    async fn count_pending_urgent(&self, site_id: SiteId) -> PipelineResult<i64> {
        let state = self.state.lock().await;
        let pending = RecommendationStatus::Pending.as_str();
        Ok(state
            .recommendations
            .values()
            .filter(|r| r.site_id == site_id && r.status == pending)
            .filter(|r| Priority::parse(&r.priority).map(Priority::is_urgent).unwrap_or(false))
            .count() as i64)
    }

    async fn transition_recommendation(
        &self,
        id: DbId,
        from: &[RecommendationStatus],
        to: RecommendationStatus,
    ) -> PipelineResult<Option<Recommendation>> {
        let mut state = self.state.lock().await;
        let Some(rec) = state.recommendations.get_mut(&id) else {
            return Ok(None);
        };
        if !from.iter().any(|s| rec.status == s.as_str()) {
            return Ok(None);
        }
        rec.status = to.as_str().to_string();
        rec.updated_at = Utc::now();
        Ok(Some(rec.clone()))
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn create_item(&self, input: &CreateQueueItem) -> PipelineResult<Option<QueueItem>> {
        let mut state = self.state.lock().await;
        if input.recommendation_id.is_some()
            && state
                .queue
                .values()
                .any(|q| q.recommendation_id == input.recommendation_id)
        {
            return Ok(None);
        }
        let now = Utc::now();
        let item = QueueItem {
            id: state.next_id(),
            site_id: input.site_id,
            recommendation_id: input.recommendation_id,
            page_id: input.page_id,
            change_type: input.change_type.clone(),
            field: input.field.clone(),
            old_value: input.old_value.clone(),
            suggested_value: input.suggested_value.clone(),
            ai_confidence: input.ai_confidence,
            is_high_traffic: input.is_high_traffic,
            requires_approval: input.requires_approval,
            status: QueueStatus::Pending.as_str().to_string(),
            reviewed_by: None,
            reviewed_at: None,
            applied_at: None,
            baseline_clicks: None,
            reverted_at: None,
            revert_reason: None,
            created_at: now,
            updated_at: now,
        };
        state.queue.insert(item.id, item.clone());
        Ok(Some(item))
    }

    async fn find_item(&self, id: DbId) -> PipelineResult<Option<QueueItem>> {
        Ok(self.state.lock().await.queue.get(&id).cloned())
    }

    async fn list_items(
        &self,
        site_id: SiteId,
        status: Option<QueueStatus>,
        limit: i64,
        offset: i64,
    ) -> PipelineResult<Vec<QueueItem>> {
        let state = self.state.lock().await;
        Ok(state
            .queue
            .values()
            .rev()
            .filter(|q| q.site_id == site_id)
            .filter(|q| status.map_or(true, |s| q.status == s.as_str()))
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_applicable(&self, site_id: SiteId) -> PipelineResult<Vec<QueueItem>> {
        let state = self.state.lock().await;
        let mut items: Vec<QueueItem> = state
            .queue
            .values()
            .filter(|q| q.site_id == site_id)
            .filter(|q| q.status == "pending" || q.status == "approved")
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            b.ai_confidence
                .cmp(&a.ai_confidence)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(items)
    }

    async fn review_item(
        &self,
        id: DbId,
        from: QueueStatus,
        to: QueueStatus,
        reviewed_by: Option<&str>,
        now: Timestamp,
    ) -> PipelineResult<Option<QueueItem>> {
        let mut state = self.state.lock().await;
        let Some(item) = state.queue.get_mut(&id) else {
            return Ok(None);
        };
        if item.status != from.as_str() {
            return Ok(None);
        }
        item.status = to.as_str().to_string();
        item.reviewed_by = reviewed_by.map(str::to_string);
        item.reviewed_at = Some(now);
        item.updated_at = now;
        Ok(Some(item.clone()))
    }

    async fn mark_applied(
        &self,
        id: DbId,
        from: QueueStatus,
        baseline_clicks: i64,
        reviewed_by: Option<&str>,
        now: Timestamp,
    ) -> PipelineResult<Option<QueueItem>> {
        let mut state = self.state.lock().await;
        let Some(item) = state.queue.get_mut(&id) else {
            return Ok(None);
        };
        if item.status != from.as_str() {
            return Ok(None);
        }
        item.status = QueueStatus::Applied.as_str().to_string();
        item.applied_at = Some(now);
        item.baseline_clicks = Some(baseline_clicks);
        if let Some(by) = reviewed_by {
            item.reviewed_by = Some(by.to_string());
        }
        item.updated_at = now;
        Ok(Some(item.clone()))
    }

    async fn mark_reverted(
        &self,
        id: DbId,
        reason: &str,
        now: Timestamp,
    ) -> PipelineResult<Option<QueueItem>> {
        let mut state = self.state.lock().await;
        let Some(item) = state.queue.get_mut(&id) else {
            return Ok(None);
        };
        if item.status != QueueStatus::Applied.as_str() {
            return Ok(None);
        }
        item.status = QueueStatus::Reverted.as_str().to_string();
        item.reverted_at = Some(now);
        item.revert_reason = Some(reason.to_string());
        item.updated_at = now;
        Ok(Some(item.clone()))
    }

    async fn list_applied_since(&self, cutoff: Timestamp) -> PipelineResult<Vec<QueueItem>> {
        let state = self.state.lock().await;
        Ok(state
            .queue
            .values()
            .filter(|q| q.status == QueueStatus::Applied.as_str())
            .filter(|q| q.applied_at.is_some_and(|at| at >= cutoff))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn try_reserve(
        &self,
        site_id: SiteId,
        day: NaiveDate,
        cap: i32,
    ) -> PipelineResult<Option<i32>> {
        let mut state = self.state.lock().await;
        let count = state.counters.entry((site_id, day)).or_insert(0);
        if *count >= cap {
            return Ok(None);
        }
        *count += 1;
        Ok(Some(*count))
    }

    async fn release(&self, site_id: SiteId, day: NaiveDate) -> PipelineResult<()> {
        if let Some(count) = self.state.lock().await.counters.get_mut(&(site_id, day)) {
            *count = (*count - 1).max(0);
        }
        Ok(())
    }

    async fn applied_count(&self, site_id: SiteId, day: NaiveDate) -> PipelineResult<i32> {
        Ok(self
            .state
            .lock()
            .await
            .counters
            .get(&(site_id, day))
            .copied()
            .unwrap_or(0))
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_or_create(&self, site_id: SiteId) -> PipelineResult<AutopilotSettings> {
        let mut state = self.state.lock().await;
        Ok(state
            .settings
            .entry(site_id)
            .or_insert_with(|| AutopilotSettings::defaults(site_id, Utc::now()))
            .clone())
    }

    async fn update(&self, settings: &AutopilotSettings) -> PipelineResult<AutopilotSettings> {
        let mut updated = settings.clone();
        updated.updated_at = Utc::now();
        self.state
            .lock()
            .await
            .settings
            .insert(settings.site_id, updated.clone());
        Ok(updated)
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn create_running(
        &self,
        site_id: SiteId,
        mode: RunMode,
        started_at: Timestamp,
    ) -> PipelineResult<OptimizationRun> {
        let mut state = self.state.lock().await;
        let running = RunStatus::Running.as_str();
        if state
            .runs
            .values()
            .any(|r| r.site_id == site_id && r.status == running)
        {
            return Err(PipelineError::RunInProgress(site_id));
        }
        let run = OptimizationRun {
            id: state.next_id(),
            site_id,
            mode: mode.as_str().to_string(),
            status: running.to_string(),
            results: serde_json::json!({}),
            recommendations_generated: 0,
            auto_applied: 0,
            alerts_raised: 0,
            error_message: None,
            started_at,
            completed_at: None,
            created_at: started_at,
            updated_at: started_at,
        };
        state.runs.insert(run.id, run.clone());
        Ok(run)
    }

    async fn complete_run(
        &self,
        id: DbId,
        results: &serde_json::Value,
        counters: RunCounters,
        completed_at: Timestamp,
    ) -> PipelineResult<Option<OptimizationRun>> {
        let mut state = self.state.lock().await;
        let Some(run) = state.runs.get_mut(&id) else {
            return Ok(None);
        };
        if run.status != RunStatus::Running.as_str() {
            return Ok(None);
        }
        run.status = RunStatus::Completed.as_str().to_string();
        run.results = results.clone();
        run.recommendations_generated = counters.recommendations_generated;
        run.auto_applied = counters.auto_applied;
        run.alerts_raised = counters.alerts_raised;
        run.completed_at = Some(completed_at);
        run.updated_at = completed_at;
        Ok(Some(run.clone()))
    }

    async fn fail_run(
        &self,
        id: DbId,
        results: &serde_json::Value,
        error_message: &str,
        completed_at: Timestamp,
    ) -> PipelineResult<Option<OptimizationRun>> {
        let mut state = self.state.lock().await;
        let Some(run) = state.runs.get_mut(&id) else {
            return Ok(None);
        };
        if run.status != RunStatus::Running.as_str() {
            return Ok(None);
        }
        run.status = RunStatus::Error.as_str().to_string();
        run.results = results.clone();
        run.error_message = Some(error_message.to_string());
        run.completed_at = Some(completed_at);
        run.updated_at = completed_at;
        Ok(Some(run.clone()))
    }

    async fn find_run(&self, id: DbId) -> PipelineResult<Option<OptimizationRun>> {
        Ok(self.state.lock().await.runs.get(&id).cloned())
    }

    async fn list_runs(
        &self,
        site_id: SiteId,
        limit: i64,
        offset: i64,
    ) -> PipelineResult<Vec<OptimizationRun>> {
        let state = self.state.lock().await;
        Ok(state
            .runs
            .values()
            .rev()
            .filter(|r| r.site_id == site_id)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn fail_stale(
        &self,
        started_before: Timestamp,
        error_message: &str,
        now: Timestamp,
    ) -> PipelineResult<Vec<DbId>> {
        let mut state = self.state.lock().await;
        let mut swept = Vec::new();
        for run in state.runs.values_mut() {
            if run.status == RunStatus::Running.as_str() && run.started_at < started_before {
                run.status = RunStatus::Error.as_str().to_string();
                run.error_message = Some(error_message.to_string());
                run.completed_at = Some(now);
                run.updated_at = now;
                swept.push(run.id);
            }
        }
        Ok(swept)
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn create_alert(&self, input: &CreateAlert, triggered_at: Timestamp) -> PipelineResult<Alert> {
        let mut state = self.state.lock().await;
        let alert = Alert {
            id: state.next_id(),
            site_id: input.site_id,
            run_id: input.run_id,
            alert_type: input.alert_type.clone(),
            severity: input.severity.clone(),
            title: input.title.clone(),
            message: input.message.clone(),
            payload: input.payload.clone(),
            status: ALERT_STATUS_ACTIVE.to_string(),
            triggered_at,
            resolved_at: None,
            created_at: triggered_at,
            updated_at: triggered_at,
        };
        state.alerts.insert(alert.id, alert.clone());
        Ok(alert)
    }

    async fn find_alert(&self, id: DbId) -> PipelineResult<Option<Alert>> {
        Ok(self.state.lock().await.alerts.get(&id).cloned())
    }

    async fn list_active_alerts(&self, site_id: SiteId) -> PipelineResult<Vec<Alert>> {
        let state = self.state.lock().await;
        Ok(state
            .alerts
            .values()
            .rev()
            .filter(|a| a.site_id == site_id && a.status == ALERT_STATUS_ACTIVE)
            .cloned()
            .collect())
    }

    async fn resolve_alert(&self, id: DbId, now: Timestamp) -> PipelineResult<Option<Alert>> {
        let mut state = self.state.lock().await;
        let Some(alert) = state.alerts.get_mut(&id) else {
            return Ok(None);
        };
        if alert.status != ALERT_STATUS_ACTIVE {
            return Ok(None);
        }
        alert.status = ALERT_STATUS_RESOLVED.to_string();
        alert.resolved_at = Some(now);
        alert.updated_at = now;
        Ok(Some(alert.clone()))
    }
}

// ---------------------------------------------------------------------------
// Network collaborator fakes
// ---------------------------------------------------------------------------

/// Completion service that answers every prompt with the same document.
pub struct StaticCompletion {
    response: Result<serde_json::Value, String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticCompletion {
    pub fn new(response: serde_json::Value) -> Self {
        Self {
            response: Ok(response),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: Err(message.into()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep before answering, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for StaticCompletion {
    async fn complete(
        &self,
        _prompt: &str,
        _response_schema: &serde_json::Value,
    ) -> PipelineResult<serde_json::Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.response.clone().map_err(PipelineError::Completion)
    }

    fn model(&self) -> &str {
        "static-test-model"
    }
}

/// Rank source returning fixed positions.
pub struct FixedRankFetcher {
    positions: HashMap<String, Option<i32>>,
}

impl FixedRankFetcher {
    pub fn new(positions: impl IntoIterator<Item = (&'static str, Option<i32>)>) -> Self {
        Self {
            positions: positions
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }
}

#[async_trait]
impl RankFetcher for FixedRankFetcher {
    async fn fetch_positions(
        &self,
        _site: &Site,
        keywords: &[String],
    ) -> PipelineResult<HashMap<String, Option<i32>>> {
        Ok(keywords
            .iter()
            .map(|k| (k.clone(), self.positions.get(k).copied().flatten()))
            .collect())
    }
}

/// Publisher that records what it was asked to do.
#[derive(Default)]
pub struct MemoryPublisher {
    published: Mutex<Vec<DbId>>,
    rolled_back: Mutex<Vec<DbId>>,
    fail: AtomicBool,
}

impl MemoryPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make subsequent publishes fail.
    pub fn fail_publishes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn published(&self) -> Vec<DbId> {
        self.published.lock().await.clone()
    }

    pub async fn rolled_back(&self) -> Vec<DbId> {
        self.rolled_back.lock().await.clone()
    }
}

#[async_trait]
impl ContentPublisher for MemoryPublisher {
    async fn publish(&self, item: &QueueItem) -> PipelineResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PipelineError::Publish(format!(
                "site rejected change for queue item {}",
                item.id
            )));
        }
        self.published.lock().await.push(item.id);
        Ok(())
    }

    async fn rollback(&self, item: &QueueItem) -> PipelineResult<()> {
        self.rolled_back.lock().await.push(item.id);
        Ok(())
    }
}
