//! Repository for the `site_pages` table.

use autopilot_core::types::{DbId, SiteId, Timestamp};
use sqlx::PgPool;

use crate::models::site::{SitePage, UpsertSitePage};

const COLUMNS: &str = "id, site_id, url, clicks_28d, clicks_prev_28d, impressions_28d, \
    impressions_7d, is_decaying, decay_severity, decay_detected_at, created_at, updated_at";

pub struct PageRepo;

impl PageRepo {
    /// All pages for a site, busiest first.
    pub async fn list_for_site(pool: &PgPool, site_id: SiteId) -> Result<Vec<SitePage>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM site_pages WHERE site_id = $1 \
             ORDER BY clicks_28d DESC, id ASC"
        );
        sqlx::query_as::<_, SitePage>(&query)
            .bind(site_id)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<SitePage>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM site_pages WHERE id = $1");
        sqlx::query_as::<_, SitePage>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Insert a page or refresh its metrics, keyed on `(site_id, url)`.
    pub async fn upsert(
        pool: &PgPool,
        site_id: SiteId,
        input: &UpsertSitePage,
    ) -> Result<SitePage, sqlx::Error> {
        let query = format!(
            "INSERT INTO site_pages \
                 (site_id, url, clicks_28d, clicks_prev_28d, impressions_28d, impressions_7d) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (site_id, url) DO UPDATE SET \
                 clicks_28d      = EXCLUDED.clicks_28d, \
                 clicks_prev_28d = EXCLUDED.clicks_prev_28d, \
                 impressions_28d = EXCLUDED.impressions_28d, \
                 impressions_7d  = EXCLUDED.impressions_7d, \
                 updated_at      = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SitePage>(&query)
            .bind(site_id)
            .bind(&input.url)
            .bind(input.clicks_28d)
            .bind(input.clicks_prev_28d)
            .bind(input.impressions_28d)
            .bind(input.impressions_7d)
            .fetch_one(pool)
            .await
    }

    /// Flag a page as decaying. Pages that recover are not cleared here.
    pub async fn mark_decaying(
        pool: &PgPool,
        page_id: DbId,
        severity: &str,
        detected_at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE site_pages \
             SET is_decaying = TRUE, decay_severity = $2, decay_detected_at = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(page_id)
        .bind(severity)
        .bind(detected_at)
        .execute(pool)
        .await?;
        Ok(())
    }
}
