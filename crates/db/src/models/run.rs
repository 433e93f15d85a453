//! Optimization run models.

use autopilot_core::types::{DbId, SiteId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `optimization_runs` table.
///
/// `results` holds the per-module result map keyed by module name.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OptimizationRun {
    pub id: DbId,
    pub site_id: SiteId,
    pub mode: String,
    pub status: String,
    pub results: serde_json::Value,
    pub recommendations_generated: i32,
    pub auto_applied: i32,
    pub alerts_raised: i32,
    pub error_message: Option<String>,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Query parameters for `GET /sites/{site_id}/runs`.
#[derive(Debug, Deserialize)]
pub struct RunListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
