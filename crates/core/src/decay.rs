//! Content decay classification.
//!
//! A page is decaying when its clicks over the current 28-day window fell
//! more than 30% below the prior 28-day window. Pages with too little prior
//! traffic are never classified.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Prior-window clicks must exceed this floor for a page to be considered.
pub const MIN_PRIOR_CLICKS: i64 = 10;

/// Drop (percent, exclusive) above which a page is `critical`.
pub const CRITICAL_DROP_PERCENT: i64 = 50;
/// Drop (percent, exclusive) above which a page is `high`.
pub const HIGH_DROP_PERCENT: i64 = 40;
/// Drop (percent, exclusive) above which a page is `medium`.
pub const MEDIUM_DROP_PERCENT: i64 = 30;

/// Severity of a detected traffic decline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecaySeverity {
    Medium,
    High,
    Critical,
}

impl DecaySeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            DecaySeverity::Medium => "medium",
            DecaySeverity::High => "high",
            DecaySeverity::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "medium" => Ok(DecaySeverity::Medium),
            "high" => Ok(DecaySeverity::High),
            "critical" => Ok(DecaySeverity::Critical),
            other => Err(CoreError::Validation(format!("Invalid decay severity '{other}'"))),
        }
    }
}

/// Percentage drop from `prior` to `current`. Negative when traffic grew.
///
/// Returns `None` when `prior` is zero.
pub fn drop_percent(prior: i64, current: i64) -> Option<f64> {
    if prior == 0 {
        return None;
    }
    Some((prior - current) as f64 / prior as f64 * 100.0)
}

/// Classify a page by its prior and current 28-day clicks.
///
/// Thresholds are compared with integer cross-multiplication so a drop of
/// exactly 30, 40 or 50 percent lands deterministically in the lower band.
pub fn classify(prior_clicks: i64, current_clicks: i64) -> Option<DecaySeverity> {
    if prior_clicks <= MIN_PRIOR_CLICKS {
        return None;
    }
    let scaled_drop = (prior_clicks - current_clicks) * 100;
    let exceeds = |threshold: i64| scaled_drop > threshold * prior_clicks;

    if exceeds(CRITICAL_DROP_PERCENT) {
        Some(DecaySeverity::Critical)
    } else if exceeds(HIGH_DROP_PERCENT) {
        Some(DecaySeverity::High)
    } else if exceeds(MEDIUM_DROP_PERCENT) {
        Some(DecaySeverity::Medium)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_excludes_low_traffic_pages() {
        for prior in 0..=MIN_PRIOR_CLICKS {
            assert_eq!(classify(prior, 0), None, "prior={prior}");
        }
        assert_eq!(classify(11, 0), Some(DecaySeverity::Critical));
    }

    #[test]
    fn exactly_thirty_percent_is_not_decaying() {
        assert_eq!(classify(100, 70), None);
    }

    #[test]
    fn just_over_thirty_percent_is_medium() {
        // 30.1% drop
        assert_eq!(classify(1000, 699), Some(DecaySeverity::Medium));
    }

    #[test]
    fn forty_percent_boundary() {
        assert_eq!(classify(100, 60), Some(DecaySeverity::Medium));
        assert_eq!(classify(1000, 599), Some(DecaySeverity::High));
    }

    #[test]
    fn exactly_fifty_percent_is_high() {
        assert_eq!(classify(100, 50), Some(DecaySeverity::High));
    }

    #[test]
    fn just_over_fifty_percent_is_critical() {
        // 50.1% drop
        assert_eq!(classify(1000, 499), Some(DecaySeverity::Critical));
    }

    #[test]
    fn sixty_percent_drop_is_critical() {
        assert_eq!(classify(100, 40), Some(DecaySeverity::Critical));
    }

    #[test]
    fn growth_is_not_decay() {
        assert_eq!(classify(100, 250), None);
    }

    #[test]
    fn drop_percent_handles_zero_prior() {
        assert_eq!(drop_percent(0, 5), None);
        assert_eq!(drop_percent(200, 50), Some(75.0));
    }

    #[test]
    fn severity_orders_by_intensity() {
        assert!(DecaySeverity::Critical > DecaySeverity::High);
        assert!(DecaySeverity::High > DecaySeverity::Medium);
    }
}
