//! Site alert rules evaluated at the end of each optimization run.
//!
//! Rules are independent threshold checks over the run summary. Raising the
//! same alert on consecutive runs is allowed; open-alert deduplication is
//! handled by the resolution workflow.

use serde::Serialize;

use crate::error::CoreError;

/// More decaying pages than this raises a `content_decay` alert.
pub const DECAYING_PAGES_ALERT_THRESHOLD: i64 = 5;

/// More pending critical/high recommendations than this raises `pending_actions`.
pub const PENDING_ACTIONS_ALERT_THRESHOLD: i64 = 10;

pub const ALERT_CONTENT_DECAY: &str = "content_decay";
pub const ALERT_PENDING_ACTIONS: &str = "pending_actions";

/// Severity level of a site alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }
}

pub const ALERT_STATUS_ACTIVE: &str = "active";
pub const ALERT_STATUS_RESOLVED: &str = "resolved";

/// Only active alerts may be resolved.
pub fn validate_resolvable(status: &str) -> Result<(), CoreError> {
    if status == ALERT_STATUS_ACTIVE {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            entity: "Alert",
            from: status.to_string(),
            to: ALERT_STATUS_RESOLVED.to_string(),
        })
    }
}

/// Aggregate facts from a run that the alert rules read.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RunSummary {
    pub decaying_pages: i64,
    pub urgent_pending_recommendations: i64,
}

/// An alert to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertDraft {
    pub alert_type: &'static str,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub payload: serde_json::Value,
}

/// Evaluate every rule against the summary.
pub fn evaluate(summary: &RunSummary) -> Vec<AlertDraft> {
    let mut alerts = Vec::new();

    if summary.decaying_pages > DECAYING_PAGES_ALERT_THRESHOLD {
        alerts.push(AlertDraft {
            alert_type: ALERT_CONTENT_DECAY,
            severity: AlertSeverity::High,
            title: format!("{} pages are losing traffic", summary.decaying_pages),
            message: format!(
                "{} pages lost more than 30% of their clicks compared to the previous 28 days.",
                summary.decaying_pages
            ),
            payload: serde_json::json!({
                "decaying_pages": summary.decaying_pages,
                "threshold": DECAYING_PAGES_ALERT_THRESHOLD,
            }),
        });
    }

    if summary.urgent_pending_recommendations > PENDING_ACTIONS_ALERT_THRESHOLD {
        alerts.push(AlertDraft {
            alert_type: ALERT_PENDING_ACTIONS,
            severity: AlertSeverity::Medium,
            title: format!(
                "{} high-priority recommendations are waiting",
                summary.urgent_pending_recommendations
            ),
            message: "Critical and high priority recommendations are piling up. Review the queue."
                .to_string(),
            payload: serde_json::json!({
                "pending_urgent": summary.urgent_pending_recommendations,
                "threshold": PENDING_ACTIONS_ALERT_THRESHOLD,
            }),
        });
    }

    alerts
}
