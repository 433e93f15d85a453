//! Recommendation models.

use autopilot_core::types::{DbId, SiteId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `recommendations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Recommendation {
    pub id: DbId,
    pub site_id: SiteId,
    pub page_id: Option<DbId>,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub priority: String,
    pub current_value: Option<String>,
    pub suggested_value: String,
    pub confidence: i16,
    pub auto_fixable: bool,
    pub status: String,
    pub model: String,
    pub generated_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a generated recommendation.
#[derive(Debug, Clone)]
pub struct CreateRecommendation {
    pub site_id: SiteId,
    pub page_id: Option<DbId>,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub priority: String,
    pub current_value: Option<String>,
    pub suggested_value: String,
    pub confidence: i16,
    pub auto_fixable: bool,
    pub model: String,
    pub generated_at: Timestamp,
}

/// Query parameters for `GET /sites/{site_id}/recommendations`.
#[derive(Debug, Deserialize)]
pub struct RecommendationListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
