//! Per-site, per-UTC-day applied change counters.
//!
//! The reservation is a single upsert guarded by the cap, so two concurrent
//! appliers can never both take the last slot.

use autopilot_core::types::SiteId;
use chrono::NaiveDate;
use sqlx::PgPool;

pub struct DailyCounterRepo;

impl DailyCounterRepo {
    /// Take one slot for `day` if fewer than `cap` are used.
    ///
    /// Returns the new count, or `None` when the cap is already reached.
    pub async fn try_reserve(
        pool: &PgPool,
        site_id: SiteId,
        day: NaiveDate,
        cap: i32,
    ) -> Result<Option<i32>, sqlx::Error> {
        if cap < 1 {
            return Ok(None);
        }
        sqlx::query_scalar::<_, i32>(
            "INSERT INTO autopilot_daily_counters (site_id, day, applied_count) \
             VALUES ($1, $2, 1) \
             ON CONFLICT (site_id, day) DO UPDATE \
                 SET applied_count = autopilot_daily_counters.applied_count + 1 \
                 WHERE autopilot_daily_counters.applied_count < $3 \
             RETURNING applied_count",
        )
        .bind(site_id)
        .bind(day)
        .bind(cap)
        .fetch_optional(pool)
        .await
    }

    /// Give back a slot after a failed publish.
    pub async fn release(pool: &PgPool, site_id: SiteId, day: NaiveDate) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE autopilot_daily_counters SET applied_count = applied_count - 1 \
             WHERE site_id = $1 AND day = $2 AND applied_count > 0",
        )
        .bind(site_id)
        .bind(day)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn applied_count(
        pool: &PgPool,
        site_id: SiteId,
        day: NaiveDate,
    ) -> Result<i32, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i32>(
            "SELECT applied_count FROM autopilot_daily_counters WHERE site_id = $1 AND day = $2",
        )
        .bind(site_id)
        .bind(day)
        .fetch_optional(pool)
        .await?;
        Ok(count.unwrap_or(0))
    }
}
