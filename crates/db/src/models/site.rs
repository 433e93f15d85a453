//! Site, knowledge profile, page metrics and tracked keyword models.

use autopilot_core::types::{DbId, SiteId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `sites` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Site {
    pub id: SiteId,
    pub name: String,
    pub domain: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `site_knowledge` table: the cached business profile.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SiteKnowledge {
    pub site_id: SiteId,
    pub business_profile: serde_json::Value,
    pub last_trained_at: Option<Timestamp>,
    pub needs_retrain: bool,
    pub retrain_requested_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

/// A row from the `site_pages` table with the latest traffic metrics.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SitePage {
    pub id: DbId,
    pub site_id: SiteId,
    pub url: String,
    pub clicks_28d: i64,
    pub clicks_prev_28d: i64,
    pub impressions_28d: i64,
    pub impressions_7d: i64,
    pub is_decaying: bool,
    pub decay_severity: Option<String>,
    pub decay_detected_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting or refreshing a page's metrics.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertSitePage {
    pub url: String,
    pub clicks_28d: i64,
    pub clicks_prev_28d: i64,
    pub impressions_28d: i64,
    pub impressions_7d: i64,
}

/// A row from the `tracked_keywords` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TrackedKeyword {
    pub id: DbId,
    pub site_id: SiteId,
    pub keyword: String,
    pub page_id: Option<DbId>,
    pub position: Option<i32>,
    pub previous_position: Option<i32>,
    pub checked_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
