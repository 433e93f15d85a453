//! Autopilot queue item state machine.
//!
//! ```text
//! pending  --approve--> approved --apply--> applied
//! pending  --reject---> rejected
//! pending  --apply----> applied
//! applied  --revert---> reverted
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Approved,
    Rejected,
    Applied,
    Reverted,
}

impl QueueStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Approved => "approved",
            QueueStatus::Rejected => "rejected",
            QueueStatus::Applied => "applied",
            QueueStatus::Reverted => "reverted",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "pending" => Ok(QueueStatus::Pending),
            "approved" => Ok(QueueStatus::Approved),
            "rejected" => Ok(QueueStatus::Rejected),
            "applied" => Ok(QueueStatus::Applied),
            "reverted" => Ok(QueueStatus::Reverted),
            other => Err(CoreError::Validation(format!(
                "Invalid queue status '{other}'. Must be one of: pending, approved, rejected, applied, reverted"
            ))),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, QueueStatus::Rejected | QueueStatus::Reverted)
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueAction {
    Approve,
    Reject,
    Apply,
    Revert,
}

impl QueueAction {
    fn target(self) -> QueueStatus {
        match self {
            QueueAction::Approve => QueueStatus::Approved,
            QueueAction::Reject => QueueStatus::Rejected,
            QueueAction::Apply => QueueStatus::Applied,
            QueueAction::Revert => QueueStatus::Reverted,
        }
    }
}

/// Resolve the status reached by applying `action` in state `from`.
pub fn transition(from: QueueStatus, action: QueueAction) -> Result<QueueStatus, CoreError> {
    use QueueAction::*;
    use QueueStatus::*;

    let allowed = matches!(
        (from, action),
        (Pending, Approve) | (Pending, Reject) | (Pending, Apply) | (Approved, Apply) | (Applied, Revert)
    );

    if allowed {
        Ok(action.target())
    } else {
        Err(CoreError::InvalidTransition {
            entity: "QueueItem",
            from: from.to_string(),
            to: action.target().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn happy_paths() {
        assert_eq!(transition(QueueStatus::Pending, QueueAction::Approve).unwrap(), QueueStatus::Approved);
        assert_eq!(transition(QueueStatus::Approved, QueueAction::Apply).unwrap(), QueueStatus::Applied);
        assert_eq!(transition(QueueStatus::Pending, QueueAction::Apply).unwrap(), QueueStatus::Applied);
        assert_eq!(transition(QueueStatus::Pending, QueueAction::Reject).unwrap(), QueueStatus::Rejected);
        assert_eq!(transition(QueueStatus::Applied, QueueAction::Revert).unwrap(), QueueStatus::Reverted);
    }

    #[test]
    fn rejected_is_terminal() {
        for action in [QueueAction::Approve, QueueAction::Reject, QueueAction::Apply, QueueAction::Revert] {
            assert!(transition(QueueStatus::Rejected, action).is_err());
        }
        assert!(QueueStatus::Rejected.is_terminal());
    }

    #[test]
    fn cannot_revert_unapplied_item() {
        assert_matches!(
            transition(QueueStatus::Pending, QueueAction::Revert),
            Err(CoreError::InvalidTransition { entity: "QueueItem", .. })
        );
    }

    #[test]
    fn cannot_reapply() {
        assert!(transition(QueueStatus::Applied, QueueAction::Apply).is_err());
        assert!(transition(QueueStatus::Reverted, QueueAction::Apply).is_err());
    }

    #[test]
    fn status_parse_round_trip() {
        for s in ["pending", "approved", "rejected", "applied", "reverted"] {
            assert_eq!(QueueStatus::parse(s).unwrap().as_str(), s);
        }
        assert!(QueueStatus::parse("queued").is_err());
    }
}
