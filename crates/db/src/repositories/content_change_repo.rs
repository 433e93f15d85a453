//! Append-only ledger of published field changes.

use autopilot_core::types::{DbId, SiteId};
use sqlx::PgPool;

use crate::models::content_change::ContentChange;

const COLUMNS: &str = "id, site_id, page_id, queue_item_id, action, field, value, created_at";

pub struct ContentChangeRepo;

impl ContentChangeRepo {
    pub async fn record(
        pool: &PgPool,
        site_id: SiteId,
        page_id: DbId,
        queue_item_id: DbId,
        action: &str,
        field: &str,
        value: Option<&str>,
    ) -> Result<ContentChange, sqlx::Error> {
        let query = format!(
            "INSERT INTO content_changes (site_id, page_id, queue_item_id, action, field, value) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ContentChange>(&query)
            .bind(site_id)
            .bind(page_id)
            .bind(queue_item_id)
            .bind(action)
            .bind(field)
            .bind(value)
            .fetch_one(pool)
            .await
    }

    pub async fn list_for_item(pool: &PgPool, queue_item_id: DbId) -> Result<Vec<ContentChange>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM content_changes WHERE queue_item_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, ContentChange>(&query)
            .bind(queue_item_id)
            .fetch_all(pool)
            .await
    }
}
