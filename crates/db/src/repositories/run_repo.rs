//! Repository for the `optimization_runs` table.

use autopilot_core::run::{RunCounters, RunMode, RunStatus};
use autopilot_core::types::{DbId, SiteId, Timestamp};
use sqlx::PgPool;

use crate::models::run::OptimizationRun;

const COLUMNS: &str = "id, site_id, mode, status, results, recommendations_generated, \
    auto_applied, alerts_raised, error_message, started_at, completed_at, created_at, updated_at";

pub struct RunRepo;

impl RunRepo {
    /// Insert a run in `running` status.
    ///
    /// Fails with a unique violation on `uq_optimization_runs_running` when
    /// the site already has a run in progress.
    pub async fn create_running(
        pool: &PgPool,
        site_id: SiteId,
        mode: RunMode,
        started_at: Timestamp,
    ) -> Result<OptimizationRun, sqlx::Error> {
        let query = format!(
            "INSERT INTO optimization_runs (site_id, mode, status, started_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, OptimizationRun>(&query)
            .bind(site_id)
            .bind(mode.as_str())
            .bind(RunStatus::Running.as_str())
            .bind(started_at)
            .fetch_one(pool)
            .await
    }

    /// Finalize a running run as completed. No-op if it already finished.
    pub async fn complete(
        pool: &PgPool,
        id: DbId,
        results: &serde_json::Value,
        counters: RunCounters,
        completed_at: Timestamp,
    ) -> Result<Option<OptimizationRun>, sqlx::Error> {
        let query = format!(
            "UPDATE optimization_runs \
             SET status = $2, results = $3, recommendations_generated = $4, auto_applied = $5, \
                 alerts_raised = $6, completed_at = $7, updated_at = NOW() \
             WHERE id = $1 AND status = 'running' \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, OptimizationRun>(&query)
            .bind(id)
            .bind(RunStatus::Completed.as_str())
            .bind(results)
            .bind(counters.recommendations_generated)
            .bind(counters.auto_applied)
            .bind(counters.alerts_raised)
            .bind(completed_at)
            .fetch_optional(pool)
            .await
    }

    /// Finalize a running run as failed, keeping whatever results were gathered.
    pub async fn fail(
        pool: &PgPool,
        id: DbId,
        results: &serde_json::Value,
        error_message: &str,
        completed_at: Timestamp,
    ) -> Result<Option<OptimizationRun>, sqlx::Error> {
        let query = format!(
            "UPDATE optimization_runs \
             SET status = $2, results = $3, error_message = $4, completed_at = $5, updated_at = NOW() \
             WHERE id = $1 AND status = 'running' \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, OptimizationRun>(&query)
            .bind(id)
            .bind(RunStatus::Error.as_str())
            .bind(results)
            .bind(error_message)
            .bind(completed_at)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<OptimizationRun>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM optimization_runs WHERE id = $1");
        sqlx::query_as::<_, OptimizationRun>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_site(
        pool: &PgPool,
        site_id: SiteId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<OptimizationRun>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM optimization_runs WHERE site_id = $1 \
             ORDER BY started_at DESC, id DESC LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, OptimizationRun>(&query)
            .bind(site_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Mark every run still `running` since before `started_before` as failed.
    ///
    /// Returns the ids of the runs that were swept.
    pub async fn fail_stale(
        pool: &PgPool,
        started_before: Timestamp,
        error_message: &str,
        now: Timestamp,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "UPDATE optimization_runs \
             SET status = 'error', error_message = $2, completed_at = $3, updated_at = NOW() \
             WHERE status = 'running' AND started_at < $1 \
             RETURNING id",
        )
        .bind(started_before)
        .bind(error_message)
        .bind(now)
        .fetch_all(pool)
        .await
    }
}
