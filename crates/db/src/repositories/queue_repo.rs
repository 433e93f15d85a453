//! Repository for the `autopilot_queue` table.
//!
//! Every status change is conditional on the current status, so a
//! concurrent approve/apply pair resolves to exactly one winner.

use autopilot_core::queue::QueueStatus;
use autopilot_core::types::{DbId, SiteId, Timestamp};
use sqlx::PgPool;

use crate::models::autopilot::{CreateQueueItem, QueueItem};

const COLUMNS: &str = "id, site_id, recommendation_id, page_id, change_type, field, old_value, \
    suggested_value, ai_confidence, is_high_traffic, requires_approval, status, reviewed_by, \
    reviewed_at, applied_at, baseline_clicks, reverted_at, revert_reason, created_at, updated_at";

pub struct QueueRepo;

impl QueueRepo {
    /// Admit a recommendation. Returns `None` if it was already queued.
    pub async fn create(
        pool: &PgPool,
        input: &CreateQueueItem,
    ) -> Result<Option<QueueItem>, sqlx::Error> {
        let query = format!(
            "INSERT INTO autopilot_queue \
                 (site_id, recommendation_id, page_id, change_type, field, old_value, \
                  suggested_value, ai_confidence, is_high_traffic, requires_approval) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT ON CONSTRAINT uq_autopilot_queue_recommendation DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QueueItem>(&query)
            .bind(input.site_id)
            .bind(input.recommendation_id)
            .bind(input.page_id)
            .bind(&input.change_type)
            .bind(&input.field)
            .bind(&input.old_value)
            .bind(&input.suggested_value)
            .bind(input.ai_confidence)
            .bind(input.is_high_traffic)
            .bind(input.requires_approval)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<QueueItem>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM autopilot_queue WHERE id = $1");
        sqlx::query_as::<_, QueueItem>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_site(
        pool: &PgPool,
        site_id: SiteId,
        status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<QueueItem>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM autopilot_queue \
             WHERE site_id = $1 AND ($2::TEXT IS NULL OR status = $2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, QueueItem>(&query)
            .bind(site_id)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Items the automatic apply path should consider, best first.
    pub async fn list_applicable(pool: &PgPool, site_id: SiteId) -> Result<Vec<QueueItem>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM autopilot_queue \
             WHERE site_id = $1 AND status IN ('pending', 'approved') \
             ORDER BY ai_confidence DESC, created_at ASC, id ASC"
        );
        sqlx::query_as::<_, QueueItem>(&query)
            .bind(site_id)
            .fetch_all(pool)
            .await
    }

    /// Record a review decision if the item is still in `from`.
    pub async fn review(
        pool: &PgPool,
        id: DbId,
        from: QueueStatus,
        to: QueueStatus,
        reviewed_by: Option<&str>,
        now: Timestamp,
    ) -> Result<Option<QueueItem>, sqlx::Error> {
        let query = format!(
            "UPDATE autopilot_queue \
             SET status = $3, reviewed_by = $4, reviewed_at = $5, updated_at = NOW() \
             WHERE id = $1 AND status = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QueueItem>(&query)
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .bind(reviewed_by)
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// Mark an item applied, capturing the click baseline for revert checks.
    pub async fn mark_applied(
        pool: &PgPool,
        id: DbId,
        from: QueueStatus,
        baseline_clicks: i64,
        reviewed_by: Option<&str>,
        now: Timestamp,
    ) -> Result<Option<QueueItem>, sqlx::Error> {
        let query = format!(
            "UPDATE autopilot_queue \
             SET status = 'applied', applied_at = $3, baseline_clicks = $4, \
                 reviewed_by = COALESCE($5, reviewed_by), updated_at = NOW() \
             WHERE id = $1 AND status = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QueueItem>(&query)
            .bind(id)
            .bind(from.as_str())
            .bind(now)
            .bind(baseline_clicks)
            .bind(reviewed_by)
            .fetch_optional(pool)
            .await
    }

    pub async fn mark_reverted(
        pool: &PgPool,
        id: DbId,
        reason: &str,
        now: Timestamp,
    ) -> Result<Option<QueueItem>, sqlx::Error> {
        let query = format!(
            "UPDATE autopilot_queue \
             SET status = 'reverted', reverted_at = $2, revert_reason = $3, updated_at = NOW() \
             WHERE id = $1 AND status = 'applied' \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QueueItem>(&query)
            .bind(id)
            .bind(now)
            .bind(reason)
            .fetch_optional(pool)
            .await
    }

    /// Applied items still inside the observation window, across all sites.
    pub async fn list_applied_since(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<Vec<QueueItem>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM autopilot_queue \
             WHERE status = 'applied' AND applied_at >= $1 \
             ORDER BY applied_at ASC"
        );
        sqlx::query_as::<_, QueueItem>(&query)
            .bind(cutoff)
            .fetch_all(pool)
            .await
    }
}
