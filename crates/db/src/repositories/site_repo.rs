//! Repository for the `sites` table.

use autopilot_core::types::SiteId;
use sqlx::PgPool;

use crate::models::site::Site;

const COLUMNS: &str = "id, name, domain, created_at, updated_at";

/// Read access to sites. Sites are provisioned by the portal, not here.
pub struct SiteRepo;

impl SiteRepo {
    /// Find a site by its ID.
    pub async fn find_by_id(pool: &PgPool, id: SiteId) -> Result<Option<Site>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sites WHERE id = $1");
        sqlx::query_as::<_, Site>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Insert a site row. Used by provisioning fixtures.
    pub async fn create(
        pool: &PgPool,
        id: SiteId,
        name: &str,
        domain: &str,
    ) -> Result<Site, sqlx::Error> {
        let query = format!(
            "INSERT INTO sites (id, name, domain) VALUES ($1, $2, $3) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Site>(&query)
            .bind(id)
            .bind(name)
            .bind(domain)
            .fetch_one(pool)
            .await
    }
}
