//! Autopilot settings and queue item models.

use autopilot_core::autopilot::{AutopilotPolicy, ChangeType};
use autopilot_core::error::CoreError;
use autopilot_core::queue::QueueStatus;
use autopilot_core::types::{DbId, SiteId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `autopilot_settings` table. One row per site.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AutopilotSettings {
    pub site_id: SiteId,
    pub enabled: bool,
    pub allowed_change_types: Vec<String>,
    pub confidence_threshold: i16,
    pub max_daily_changes: i32,
    pub high_traffic_threshold: i64,
    pub auto_revert_threshold: f64,
    pub notify_on_apply: bool,
    pub notify_on_revert: bool,
    pub notify_on_approval_needed: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl AutopilotSettings {
    /// Build a settings row carrying the default policy for `site_id`.
    pub fn defaults(site_id: SiteId, now: Timestamp) -> Self {
        let policy = AutopilotPolicy::default();
        Self {
            site_id,
            enabled: policy.enabled,
            allowed_change_types: policy
                .allowed_change_types
                .iter()
                .map(|t| t.as_str().to_string())
                .collect(),
            confidence_threshold: policy.confidence_threshold,
            max_daily_changes: policy.max_daily_changes,
            high_traffic_threshold: policy.high_traffic_threshold,
            auto_revert_threshold: policy.auto_revert_threshold,
            notify_on_apply: true,
            notify_on_revert: true,
            notify_on_approval_needed: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// The typed policy view of this row.
    ///
    /// Unknown change-type tags are dropped rather than failing the whole
    /// policy, so a stale tag in the table cannot disable the autopilot.
    pub fn policy(&self) -> AutopilotPolicy {
        AutopilotPolicy {
            enabled: self.enabled,
            allowed_change_types: self
                .allowed_change_types
                .iter()
                .filter_map(|t| ChangeType::parse(t).ok())
                .collect(),
            confidence_threshold: self.confidence_threshold,
            max_daily_changes: self.max_daily_changes,
            high_traffic_threshold: self.high_traffic_threshold,
            auto_revert_threshold: self.auto_revert_threshold,
        }
    }

    /// Apply a partial update in memory, validating the resulting policy.
    pub fn merged(&self, update: &UpdateAutopilotSettings) -> Result<Self, CoreError> {
        let mut next = self.clone();
        if let Some(enabled) = update.enabled {
            next.enabled = enabled;
        }
        if let Some(types) = &update.allowed_change_types {
            for t in types {
                ChangeType::parse(t)?;
            }
            let mut types = types.clone();
            types.sort();
            types.dedup();
            next.allowed_change_types = types;
        }
        if let Some(v) = update.confidence_threshold {
            next.confidence_threshold = v;
        }
        if let Some(v) = update.max_daily_changes {
            next.max_daily_changes = v;
        }
        if let Some(v) = update.high_traffic_threshold {
            next.high_traffic_threshold = v;
        }
        if let Some(v) = update.auto_revert_threshold {
            next.auto_revert_threshold = v;
        }
        if let Some(v) = update.notify_on_apply {
            next.notify_on_apply = v;
        }
        if let Some(v) = update.notify_on_revert {
            next.notify_on_revert = v;
        }
        if let Some(v) = update.notify_on_approval_needed {
            next.notify_on_approval_needed = v;
        }
        next.policy().validate()?;
        Ok(next)
    }
}

/// DTO for `PUT /sites/{site_id}/autopilot/settings`. All fields optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAutopilotSettings {
    pub enabled: Option<bool>,
    pub allowed_change_types: Option<Vec<String>>,
    pub confidence_threshold: Option<i16>,
    pub max_daily_changes: Option<i32>,
    pub high_traffic_threshold: Option<i64>,
    pub auto_revert_threshold: Option<f64>,
    pub notify_on_apply: Option<bool>,
    pub notify_on_revert: Option<bool>,
    pub notify_on_approval_needed: Option<bool>,
}

/// A row from the `autopilot_queue` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QueueItem {
    pub id: DbId,
    pub site_id: SiteId,
    pub recommendation_id: Option<DbId>,
    pub page_id: Option<DbId>,
    pub change_type: String,
    pub field: String,
    pub old_value: Option<String>,
    pub suggested_value: String,
    pub ai_confidence: i16,
    pub is_high_traffic: bool,
    pub requires_approval: bool,
    pub status: String,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<Timestamp>,
    pub applied_at: Option<Timestamp>,
    pub baseline_clicks: Option<i64>,
    pub reverted_at: Option<Timestamp>,
    pub revert_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl QueueItem {
    pub fn queue_status(&self) -> Result<QueueStatus, CoreError> {
        QueueStatus::parse(&self.status)
    }
}

/// DTO for admitting a recommendation into the queue.
#[derive(Debug, Clone)]
pub struct CreateQueueItem {
    pub site_id: SiteId,
    pub recommendation_id: Option<DbId>,
    pub page_id: Option<DbId>,
    pub change_type: String,
    pub field: String,
    pub old_value: Option<String>,
    pub suggested_value: String,
    pub ai_confidence: i16,
    pub is_high_traffic: bool,
    pub requires_approval: bool,
}

/// Query parameters for `GET /sites/{site_id}/autopilot/queue`.
#[derive(Debug, Deserialize)]
pub struct QueueListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Request body for approve / reject / apply-now.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewRequest {
    /// Administrator identifier recorded on the item.
    pub reviewed_by: Option<String>,
}
