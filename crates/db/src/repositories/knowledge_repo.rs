//! Repository for the `site_knowledge` table.

use autopilot_core::types::SiteId;
use sqlx::PgPool;

use crate::models::site::SiteKnowledge;

const COLUMNS: &str =
    "site_id, business_profile, last_trained_at, needs_retrain, retrain_requested_at, updated_at";

pub struct KnowledgeRepo;

impl KnowledgeRepo {
    /// Fetch the cached business profile for a site, if one was ever trained.
    pub async fn find_for_site(
        pool: &PgPool,
        site_id: SiteId,
    ) -> Result<Option<SiteKnowledge>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM site_knowledge WHERE site_id = $1");
        sqlx::query_as::<_, SiteKnowledge>(&query)
            .bind(site_id)
            .fetch_optional(pool)
            .await
    }

    /// Mark the profile for retraining, creating an empty row if absent.
    pub async fn flag_retrain(pool: &PgPool, site_id: SiteId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO site_knowledge (site_id, needs_retrain, retrain_requested_at) \
             VALUES ($1, TRUE, NOW()) \
             ON CONFLICT (site_id) DO UPDATE SET \
                 needs_retrain = TRUE, \
                 retrain_requested_at = NOW(), \
                 updated_at = NOW()",
        )
        .bind(site_id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
