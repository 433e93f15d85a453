//! Repository for the `alerts` table.

use autopilot_core::alert::{ALERT_STATUS_ACTIVE, ALERT_STATUS_RESOLVED};
use autopilot_core::types::{DbId, SiteId, Timestamp};
use sqlx::PgPool;

use crate::models::alert::{Alert, CreateAlert};

const COLUMNS: &str = "id, site_id, run_id, alert_type, severity, title, message, payload, \
    status, triggered_at, resolved_at, created_at, updated_at";

pub struct AlertRepo;

impl AlertRepo {
    pub async fn create(
        pool: &PgPool,
        input: &CreateAlert,
        triggered_at: Timestamp,
    ) -> Result<Alert, sqlx::Error> {
        let query = format!(
            "INSERT INTO alerts (site_id, run_id, alert_type, severity, title, message, payload, triggered_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Alert>(&query)
            .bind(input.site_id)
            .bind(input.run_id)
            .bind(&input.alert_type)
            .bind(&input.severity)
            .bind(&input.title)
            .bind(&input.message)
            .bind(&input.payload)
            .bind(triggered_at)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Alert>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM alerts WHERE id = $1");
        sqlx::query_as::<_, Alert>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Active alerts for a site, most recent first.
    pub async fn list_active(pool: &PgPool, site_id: SiteId) -> Result<Vec<Alert>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM alerts WHERE site_id = $1 AND status = $2 \
             ORDER BY triggered_at DESC, id DESC"
        );
        sqlx::query_as::<_, Alert>(&query)
            .bind(site_id)
            .bind(ALERT_STATUS_ACTIVE)
            .fetch_all(pool)
            .await
    }

    /// Resolve an active alert. Returns `None` if it is missing or already resolved.
    pub async fn resolve(pool: &PgPool, id: DbId, now: Timestamp) -> Result<Option<Alert>, sqlx::Error> {
        let query = format!(
            "UPDATE alerts SET status = $2, resolved_at = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Alert>(&query)
            .bind(id)
            .bind(ALERT_STATUS_RESOLVED)
            .bind(now)
            .bind(ALERT_STATUS_ACTIVE)
            .fetch_optional(pool)
            .await
    }
}
