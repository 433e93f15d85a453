//! Ledger of field changes pushed to (or rolled back from) live content.

use autopilot_core::types::{DbId, SiteId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

pub const CHANGE_ACTION_APPLY: &str = "apply";
pub const CHANGE_ACTION_ROLLBACK: &str = "rollback";

/// A row from the `content_changes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ContentChange {
    pub id: DbId,
    pub site_id: SiteId,
    pub page_id: DbId,
    pub queue_item_id: DbId,
    pub action: String,
    pub field: String,
    pub value: Option<String>,
    pub created_at: Timestamp,
}
