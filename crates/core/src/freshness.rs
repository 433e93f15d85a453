//! Business-knowledge freshness evaluation.

use serde::Serialize;

use crate::types::Timestamp;

/// Knowledge older than this many days is considered stale.
pub const DEFAULT_MAX_AGE_DAYS: i64 = 7;

/// Freshness classification of a site's cached business profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FreshnessStatus {
    Fresh,
    Stale,
    Missing,
}

impl FreshnessStatus {
    /// Whether this status should trigger a retraining request.
    pub fn needs_retrain(self) -> bool {
        !matches!(self, FreshnessStatus::Fresh)
    }
}

/// Evaluation of a site's knowledge profile at a point in time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreshnessReport {
    pub status: FreshnessStatus,
    /// Whole days since the profile was last trained, when known.
    pub age_days: Option<i64>,
    pub retrain_flagged: bool,
}

/// Classify the profile by the time it was last trained.
///
/// A profile is stale only when strictly older than `max_age_days`.
pub fn evaluate(
    last_trained_at: Option<Timestamp>,
    now: Timestamp,
    max_age_days: i64,
) -> FreshnessReport {
    let Some(trained) = last_trained_at else {
        return FreshnessReport {
            status: FreshnessStatus::Missing,
            age_days: None,
            retrain_flagged: false,
        };
    };

    let age = now - trained;
    let status = if age > chrono::Duration::days(max_age_days) {
        FreshnessStatus::Stale
    } else {
        FreshnessStatus::Fresh
    };

    FreshnessReport {
        status,
        age_days: Some(age.num_days()),
        retrain_flagged: false,
    }
}
