//! Site alert models.

use autopilot_core::types::{DbId, SiteId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `alerts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Alert {
    pub id: DbId,
    pub site_id: SiteId,
    pub run_id: Option<DbId>,
    pub alert_type: String,
    pub severity: String,
    pub title: String,
    pub message: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub triggered_at: Timestamp,
    pub resolved_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for raising a new alert.
#[derive(Debug, Clone)]
pub struct CreateAlert {
    pub site_id: SiteId,
    pub run_id: Option<DbId>,
    pub alert_type: String,
    pub severity: String,
    pub title: String,
    pub message: String,
    pub payload: serde_json::Value,
}
