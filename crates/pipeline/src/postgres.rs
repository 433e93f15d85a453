//! Postgres-backed collaborators over the `autopilot-db` repositories.

use std::sync::Arc;

use async_trait::async_trait;
use autopilot_core::queue::QueueStatus;
use autopilot_core::recommendation::RecommendationStatus;
use autopilot_core::run::{RunCounters, RunMode};
use autopilot_core::types::{DbId, SiteId, Timestamp};
use autopilot_db::models::alert::{Alert, CreateAlert};
use autopilot_db::models::autopilot::{AutopilotSettings, CreateQueueItem, QueueItem};
use autopilot_db::models::content_change::{CHANGE_ACTION_APPLY, CHANGE_ACTION_ROLLBACK};
use autopilot_db::models::recommendation::{CreateRecommendation, Recommendation};
use autopilot_db::models::run::OptimizationRun;
use autopilot_db::models::site::{Site, SiteKnowledge, SitePage, TrackedKeyword};
use autopilot_db::repositories::{
    AlertRepo, AutopilotSettingsRepo, ContentChangeRepo, DailyCounterRepo, KeywordRepo,
    KnowledgeRepo, PageRepo, QueueRepo, RecommendationRepo, RunRepo, SiteRepo,
};
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::error::{PipelineError, PipelineResult};
use crate::store::*;

/// Name of the partial unique index that marks a run in progress.
const RUNNING_RUN_CONSTRAINT: &str = "uq_optimization_runs_running";

/// All store traits over a single connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Wire every store seam to Postgres and the default ledger publisher.
    pub fn collaborators(
        pool: PgPool,
        completion: Arc<dyn CompletionService>,
        ranks: Option<Arc<dyn RankFetcher>>,
    ) -> Collaborators {
        let store = Arc::new(Self::new(pool.clone()));
        Collaborators {
            sites: store.clone(),
            knowledge: store.clone(),
            metrics: store.clone(),
            ranks,
            completion,
            recommendations: store.clone(),
            queue: store.clone(),
            counters: store.clone(),
            settings: store.clone(),
            runs: store.clone(),
            alerts: store,
            publisher: Arc::new(LedgerPublisher::new(pool)),
        }
    }
}

#[async_trait]
impl SiteStore for PgStore {
    async fn find_site(&self, site_id: SiteId) -> PipelineResult<Option<Site>> {
        Ok(SiteRepo::find_by_id(&self.pool, site_id).await?)
    }
}

#[async_trait]
impl KnowledgeStore for PgStore {
    async fn get_knowledge(&self, site_id: SiteId) -> PipelineResult<Option<SiteKnowledge>> {
        Ok(KnowledgeRepo::find_for_site(&self.pool, site_id).await?)
    }

    async fn flag_retrain(&self, site_id: SiteId) -> PipelineResult<()> {
        Ok(KnowledgeRepo::flag_retrain(&self.pool, site_id).await?)
    }
}

#[async_trait]
impl MetricsStore for PgStore {
    async fn page_metrics(&self, site_id: SiteId) -> PipelineResult<Vec<SitePage>> {
        Ok(PageRepo::list_for_site(&self.pool, site_id).await?)
    }

    async fn find_page(&self, page_id: DbId) -> PipelineResult<Option<SitePage>> {
        Ok(PageRepo::find_by_id(&self.pool, page_id).await?)
    }

    async fn mark_decaying(
        &self,
        page_id: DbId,
        severity: &str,
        detected_at: Timestamp,
    ) -> PipelineResult<()> {
        Ok(PageRepo::mark_decaying(&self.pool, page_id, severity, detected_at).await?)
    }

    async fn tracked_keywords(&self, site_id: SiteId) -> PipelineResult<Vec<TrackedKeyword>> {
        Ok(KeywordRepo::list_for_site(&self.pool, site_id).await?)
    }

    async fn record_position(
        &self,
        keyword_id: DbId,
        position: Option<i32>,
        checked_at: Timestamp,
    ) -> PipelineResult<()> {
        Ok(KeywordRepo::record_position(&self.pool, keyword_id, position, checked_at).await?)
    }
}

#[async_trait]
impl RecommendationStore for PgStore {
    async fn insert_if_absent(
        &self,
        input: &CreateRecommendation,
    ) -> PipelineResult<Option<Recommendation>> {
        Ok(RecommendationRepo::insert_if_absent(&self.pool, input).await?)
    }

    async fn find_recommendation(&self, id: DbId) -> PipelineResult<Option<Recommendation>> {
        Ok(RecommendationRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_recommendations(
        &self,
        site_id: SiteId,
        status: Option<RecommendationStatus>,
        limit: i64,
        offset: i64,
    ) -> PipelineResult<Vec<Recommendation>> {
        Ok(RecommendationRepo::list_for_site(
            &self.pool,
            site_id,
            status.map(|s| s.as_str()),
            limit,
            offset,
        )
        .await?)
    }

    async fn list_pending_unqueued(&self, site_id: SiteId) -> PipelineResult<Vec<Recommendation>> {
        Ok(RecommendationRepo::list_pending_unqueued(&self.pool, site_id).await?)
    }

    async fn count_pending_urgent(&self, site_id: SiteId) -> PipelineResult<i64> {
        Ok(RecommendationRepo::count_pending_urgent(&self.pool, site_id).await?)
    }

    async fn transition_recommendation(
        &self,
        id: DbId,
        from: &[RecommendationStatus],
        to: RecommendationStatus,
    ) -> PipelineResult<Option<Recommendation>> {
        Ok(RecommendationRepo::transition(&self.pool, id, from, to).await?)
    }
}

#[async_trait]
impl QueueStore for PgStore {
    async fn create_item(&self, input: &CreateQueueItem) -> PipelineResult<Option<QueueItem>> {
        Ok(QueueRepo::create(&self.pool, input).await?)
    }

    async fn find_item(&self, id: DbId) -> PipelineResult<Option<QueueItem>> {
        Ok(QueueRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_items(
        &self,
        site_id: SiteId,
        status: Option<QueueStatus>,
        limit: i64,
        offset: i64,
    ) -> PipelineResult<Vec<QueueItem>> {
        Ok(QueueRepo::list_for_site(&self.pool, site_id, status.map(|s| s.as_str()), limit, offset).await?)
    }

    async fn list_applicable(&self, site_id: SiteId) -> PipelineResult<Vec<QueueItem>> {
        Ok(QueueRepo::list_applicable(&self.pool, site_id).await?)
    }

    async fn review_item(
        &self,
        id: DbId,
        from: QueueStatus,
        to: QueueStatus,
        reviewed_by: Option<&str>,
        now: Timestamp,
    ) -> PipelineResult<Option<QueueItem>> {
        Ok(QueueRepo::review(&self.pool, id, from, to, reviewed_by, now).await?)
    }

    async fn mark_applied(
        &self,
        id: DbId,
        from: QueueStatus,
        baseline_clicks: i64,
        reviewed_by: Option<&str>,
        now: Timestamp,
    ) -> PipelineResult<Option<QueueItem>> {
        Ok(QueueRepo::mark_applied(&self.pool, id, from, baseline_clicks, reviewed_by, now).await?)
    }

    async fn mark_reverted(
        &self,
        id: DbId,
        reason: &str,
        now: Timestamp,
    ) -> PipelineResult<Option<QueueItem>> {
        Ok(QueueRepo::mark_reverted(&self.pool, id, reason, now).await?)
    }

    async fn list_applied_since(&self, cutoff: Timestamp) -> PipelineResult<Vec<QueueItem>> {
        Ok(QueueRepo::list_applied_since(&self.pool, cutoff).await?)
    }
}

#[async_trait]
impl CounterStore for PgStore {
    async fn try_reserve(
        &self,
        site_id: SiteId,
        day: NaiveDate,
        cap: i32,
    ) -> PipelineResult<Option<i32>> {
        Ok(DailyCounterRepo::try_reserve(&self.pool, site_id, day, cap).await?)
    }

    async fn release(&self, site_id: SiteId, day: NaiveDate) -> PipelineResult<()> {
        Ok(DailyCounterRepo::release(&self.pool, site_id, day).await?)
    }

    async fn applied_count(&self, site_id: SiteId, day: NaiveDate) -> PipelineResult<i32> {
        Ok(DailyCounterRepo::applied_count(&self.pool, site_id, day).await?)
    }
}

#[async_trait]
impl SettingsStore for PgStore {
    async fn get_or_create(&self, site_id: SiteId) -> PipelineResult<AutopilotSettings> {
        Ok(AutopilotSettingsRepo::get_or_create(&self.pool, site_id).await?)
    }

    async fn update(&self, settings: &AutopilotSettings) -> PipelineResult<AutopilotSettings> {
        Ok(AutopilotSettingsRepo::update(&self.pool, settings).await?)
    }
}

#[async_trait]
impl RunStore for PgStore {
    async fn create_running(
        &self,
        site_id: SiteId,
        mode: RunMode,
        started_at: Timestamp,
    ) -> PipelineResult<OptimizationRun> {
        RunRepo::create_running(&self.pool, site_id, mode, started_at)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.constraint() == Some(RUNNING_RUN_CONSTRAINT) => {
                    PipelineError::RunInProgress(site_id)
                }
                _ => PipelineError::Store(e),
            })
    }

    async fn complete_run(
        &self,
        id: DbId,
        results: &serde_json::Value,
        counters: RunCounters,
        completed_at: Timestamp,
    ) -> PipelineResult<Option<OptimizationRun>> {
        Ok(RunRepo::complete(&self.pool, id, results, counters, completed_at).await?)
    }

    async fn fail_run(
        &self,
        id: DbId,
        results: &serde_json::Value,
        error_message: &str,
        completed_at: Timestamp,
    ) -> PipelineResult<Option<OptimizationRun>> {
        Ok(RunRepo::fail(&self.pool, id, results, error_message, completed_at).await?)
    }

    async fn find_run(&self, id: DbId) -> PipelineResult<Option<OptimizationRun>> {
        Ok(RunRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_runs(
        &self,
        site_id: SiteId,
        limit: i64,
        offset: i64,
    ) -> PipelineResult<Vec<OptimizationRun>> {
        Ok(RunRepo::list_for_site(&self.pool, site_id, limit, offset).await?)
    }

    async fn fail_stale(
        &self,
        started_before: Timestamp,
        error_message: &str,
        now: Timestamp,
    ) -> PipelineResult<Vec<DbId>> {
        Ok(RunRepo::fail_stale(&self.pool, started_before, error_message, now).await?)
    }
}

#[async_trait]
impl AlertStore for PgStore {
    async fn create_alert(&self, input: &CreateAlert, triggered_at: Timestamp) -> PipelineResult<Alert> {
        Ok(AlertRepo::create(&self.pool, input, triggered_at).await?)
    }

    async fn find_alert(&self, id: DbId) -> PipelineResult<Option<Alert>> {
        Ok(AlertRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_active_alerts(&self, site_id: SiteId) -> PipelineResult<Vec<Alert>> {
        Ok(AlertRepo::list_active(&self.pool, site_id).await?)
    }

    async fn resolve_alert(&self, id: DbId, now: Timestamp) -> PipelineResult<Option<Alert>> {
        Ok(AlertRepo::resolve(&self.pool, id, now).await?)
    }
}

/// Default publisher: records every change in the `content_changes` ledger,
/// from which the site integration picks up field edits.
pub struct LedgerPublisher {
    pool: PgPool,
}

impl LedgerPublisher {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn page_id(item: &QueueItem) -> PipelineResult<DbId> {
        item.page_id
            .ok_or_else(|| PipelineError::Publish(format!("queue item {} has no page", item.id)))
    }
}

#[async_trait]
impl ContentPublisher for LedgerPublisher {
    async fn publish(&self, item: &QueueItem) -> PipelineResult<()> {
        ContentChangeRepo::record(
            &self.pool,
            item.site_id,
            Self::page_id(item)?,
            item.id,
            CHANGE_ACTION_APPLY,
            &item.field,
            Some(&item.suggested_value),
        )
        .await?;
        Ok(())
    }

    async fn rollback(&self, item: &QueueItem) -> PipelineResult<()> {
        ContentChangeRepo::record(
            &self.pool,
            item.site_id,
            Self::page_id(item)?,
            item.id,
            CHANGE_ACTION_ROLLBACK,
            &item.field,
            item.old_value.as_deref(),
        )
        .await?;
        Ok(())
    }
}
