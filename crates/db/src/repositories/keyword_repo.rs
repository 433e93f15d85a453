//! Repository for the `tracked_keywords` table.

use autopilot_core::types::{DbId, SiteId, Timestamp};
use sqlx::PgPool;

use crate::models::site::TrackedKeyword;

const COLUMNS: &str = "id, site_id, keyword, page_id, position, previous_position, \
    checked_at, created_at, updated_at";

pub struct KeywordRepo;

impl KeywordRepo {
    pub async fn list_for_site(
        pool: &PgPool,
        site_id: SiteId,
    ) -> Result<Vec<TrackedKeyword>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tracked_keywords WHERE site_id = $1 ORDER BY keyword ASC"
        );
        sqlx::query_as::<_, TrackedKeyword>(&query)
            .bind(site_id)
            .fetch_all(pool)
            .await
    }

    /// Store a freshly fetched position, shifting the old one to `previous_position`.
    pub async fn record_position(
        pool: &PgPool,
        id: DbId,
        position: Option<i32>,
        checked_at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE tracked_keywords \
             SET previous_position = position, position = $2, checked_at = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(position)
        .bind(checked_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Start tracking a keyword. Duplicate keywords are ignored.
    pub async fn track(
        pool: &PgPool,
        site_id: SiteId,
        keyword: &str,
        page_id: Option<DbId>,
    ) -> Result<Option<TrackedKeyword>, sqlx::Error> {
        let query = format!(
            "INSERT INTO tracked_keywords (site_id, keyword, page_id) VALUES ($1, $2, $3) \
             ON CONFLICT (site_id, keyword) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TrackedKeyword>(&query)
            .bind(site_id)
            .bind(keyword)
            .bind(page_id)
            .fetch_optional(pool)
            .await
    }
}
