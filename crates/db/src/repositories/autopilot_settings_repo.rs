//! Repository for the `autopilot_settings` table.

use autopilot_core::types::SiteId;
use sqlx::PgPool;

use crate::models::autopilot::AutopilotSettings;

const COLUMNS: &str = "site_id, enabled, allowed_change_types, confidence_threshold, \
    max_daily_changes, high_traffic_threshold, auto_revert_threshold, notify_on_apply, \
    notify_on_revert, notify_on_approval_needed, created_at, updated_at";

pub struct AutopilotSettingsRepo;

impl AutopilotSettingsRepo {
    /// Fetch a site's settings, creating the default row on first access.
    pub async fn get_or_create(
        pool: &PgPool,
        site_id: SiteId,
    ) -> Result<AutopilotSettings, sqlx::Error> {
        sqlx::query(
            "INSERT INTO autopilot_settings (site_id) VALUES ($1) ON CONFLICT (site_id) DO NOTHING",
        )
        .bind(site_id)
        .execute(pool)
        .await?;

        let query = format!("SELECT {COLUMNS} FROM autopilot_settings WHERE site_id = $1");
        sqlx::query_as::<_, AutopilotSettings>(&query)
            .bind(site_id)
            .fetch_one(pool)
            .await
    }

    /// Persist an already-validated settings row.
    pub async fn update(
        pool: &PgPool,
        settings: &AutopilotSettings,
    ) -> Result<AutopilotSettings, sqlx::Error> {
        let query = format!(
            "UPDATE autopilot_settings SET \
                 enabled = $2, allowed_change_types = $3, confidence_threshold = $4, \
                 max_daily_changes = $5, high_traffic_threshold = $6, auto_revert_threshold = $7, \
                 notify_on_apply = $8, notify_on_revert = $9, notify_on_approval_needed = $10, \
                 updated_at = NOW() \
             WHERE site_id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AutopilotSettings>(&query)
            .bind(settings.site_id)
            .bind(settings.enabled)
            .bind(&settings.allowed_change_types)
            .bind(settings.confidence_threshold)
            .bind(settings.max_daily_changes)
            .bind(settings.high_traffic_threshold)
            .bind(settings.auto_revert_threshold)
            .bind(settings.notify_on_apply)
            .bind(settings.notify_on_revert)
            .bind(settings.notify_on_approval_needed)
            .fetch_one(pool)
            .await
    }
}
