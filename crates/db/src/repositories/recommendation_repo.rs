//! Repository for the `recommendations` table.
//!
//! Recommendations are never deleted. Status changes go through
//! [`RecommendationRepo::transition`], which only succeeds from an expected
//! prior status so concurrent reviewers cannot clobber each other.

use autopilot_core::recommendation::RecommendationStatus;
use autopilot_core::types::{DbId, SiteId};
use sqlx::PgPool;

use crate::models::recommendation::{CreateRecommendation, Recommendation};

const COLUMNS: &str = "id, site_id, page_id, title, description, category, priority, \
    current_value, suggested_value, confidence, auto_fixable, status, model, \
    generated_at, created_at, updated_at";

/// Same column list qualified with the `r.` alias for joins.
const COLUMNS_R: &str = "r.id, r.site_id, r.page_id, r.title, r.description, r.category, \
    r.priority, r.current_value, r.suggested_value, r.confidence, r.auto_fixable, r.status, \
    r.model, r.generated_at, r.created_at, r.updated_at";

pub struct RecommendationRepo;

impl RecommendationRepo {
    /// Insert a pending recommendation unless one with the same
    /// `(site, page, title)` is already pending.
    ///
    /// Returns `None` when the insert was skipped as a duplicate.
    pub async fn insert_if_absent(
        pool: &PgPool,
        input: &CreateRecommendation,
    ) -> Result<Option<Recommendation>, sqlx::Error> {
        let query = format!(
            "INSERT INTO recommendations \
                 (site_id, page_id, title, description, category, priority, current_value, \
                  suggested_value, confidence, auto_fixable, status, model, generated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             ON CONFLICT (site_id, (COALESCE(page_id, 0)), title) WHERE status = 'pending' \
             DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Recommendation>(&query)
            .bind(input.site_id)
            .bind(input.page_id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.category)
            .bind(&input.priority)
            .bind(&input.current_value)
            .bind(&input.suggested_value)
            .bind(input.confidence)
            .bind(input.auto_fixable)
            .bind(RecommendationStatus::Pending.as_str())
            .bind(&input.model)
            .bind(input.generated_at)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Recommendation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM recommendations WHERE id = $1");
        sqlx::query_as::<_, Recommendation>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a site's recommendations, newest first, optionally by status.
    pub async fn list_for_site(
        pool: &PgPool,
        site_id: SiteId,
        status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Recommendation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM recommendations \
             WHERE site_id = $1 AND ($2::TEXT IS NULL OR status = $2) \
             ORDER BY generated_at DESC, id DESC \
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, Recommendation>(&query)
            .bind(site_id)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Pending recommendations that have not been admitted to the queue yet.
    pub async fn list_pending_unqueued(
        pool: &PgPool,
        site_id: SiteId,
    ) -> Result<Vec<Recommendation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS_R} FROM recommendations r \
             LEFT JOIN autopilot_queue q ON q.recommendation_id = r.id \
             WHERE r.site_id = $1 AND r.status = $2 AND q.id IS NULL \
             ORDER BY r.confidence DESC, r.id ASC"
        );
        sqlx::query_as::<_, Recommendation>(&query)
            .bind(site_id)
            .bind(RecommendationStatus::Pending.as_str())
            .fetch_all(pool)
            .await
    }

    /// Count pending recommendations with critical or high priority.
    pub async fn count_pending_urgent(pool: &PgPool, site_id: SiteId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM recommendations \
             WHERE site_id = $1 AND status = $2 AND priority IN ('critical', 'high')",
        )
        .bind(site_id)
        .bind(RecommendationStatus::Pending.as_str())
        .fetch_one(pool)
        .await
    }

    /// Move a recommendation to `to` if it is currently in one of `from`.
    ///
    /// Returns `None` when the row was missing or not in an expected status.
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        from: &[RecommendationStatus],
        to: RecommendationStatus,
    ) -> Result<Option<Recommendation>, sqlx::Error> {
        let from: Vec<&str> = from.iter().map(|s| s.as_str()).collect();
        let query = format!(
            "UPDATE recommendations SET status = $2, updated_at = NOW() \
             WHERE id = $1 AND status = ANY($3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Recommendation>(&query)
            .bind(id)
            .bind(to.as_str())
            .bind(&from)
            .fetch_optional(pool)
            .await
    }
}
