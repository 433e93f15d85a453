//! Autopilot safety policy.
//!
//! Admission decides whether a recommendation may enter the apply queue and
//! whether it needs a human step. The automatic apply gate rechecks the
//! allowed change types and confidence threshold at application time, so
//! settings changed after admission still take effect.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::queue::QueueStatus;
use crate::recommendation::Category;

// ---------------------------------------------------------------------------
// Change types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Title,
    MetaDescription,
    H1,
    Content,
    Schema,
}

/// Every change type the autopilot understands.
pub const ALL_CHANGE_TYPES: &[ChangeType] = &[
    ChangeType::Title,
    ChangeType::MetaDescription,
    ChangeType::H1,
    ChangeType::Content,
    ChangeType::Schema,
];

/// Change types enabled for a freshly created site.
pub const DEFAULT_ALLOWED_CHANGE_TYPES: &[ChangeType] =
    &[ChangeType::Title, ChangeType::MetaDescription, ChangeType::Schema];

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::Title => "title",
            ChangeType::MetaDescription => "meta_description",
            ChangeType::H1 => "h1",
            ChangeType::Content => "content",
            ChangeType::Schema => "schema",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        ALL_CHANGE_TYPES
            .iter()
            .copied()
            .find(|t| t.as_str() == value)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown change type '{value}'. Valid types: {}",
                    ALL_CHANGE_TYPES
                        .iter()
                        .map(|t| t.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }

    /// The change type a recommendation category maps onto.
    ///
    /// Keyword suggestions have no direct field edit and are never queued.
    pub fn from_category(category: Category) -> Option<Self> {
        match category {
            Category::Title => Some(ChangeType::Title),
            Category::Meta => Some(ChangeType::MetaDescription),
            Category::Technical => Some(ChangeType::Schema),
            Category::Content => Some(ChangeType::Content),
            Category::Keyword => None,
        }
    }

    /// Page field touched by this change type.
    pub fn field(self) -> &'static str {
        match self {
            ChangeType::Title => "title",
            ChangeType::MetaDescription => "meta_description",
            ChangeType::H1 => "h1",
            ChangeType::Content => "body",
            ChangeType::Schema => "structured_data",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

pub const DEFAULT_CONFIDENCE_THRESHOLD: i16 = 80;
pub const DEFAULT_MAX_DAILY_CHANGES: i32 = 5;
pub const DEFAULT_HIGH_TRAFFIC_THRESHOLD: i64 = 1000;
pub const DEFAULT_AUTO_REVERT_THRESHOLD: f64 = 20.0;

/// The numeric knobs of a site's autopilot settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutopilotPolicy {
    pub enabled: bool,
    pub allowed_change_types: Vec<ChangeType>,
    /// Minimum model confidence (0-100) for unattended application.
    pub confidence_threshold: i16,
    pub max_daily_changes: i32,
    /// Impressions over the last 7 days above which a page needs review.
    pub high_traffic_threshold: i64,
    /// Percent click drop after application that triggers a rollback.
    pub auto_revert_threshold: f64,
}

impl Default for AutopilotPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_change_types: DEFAULT_ALLOWED_CHANGE_TYPES.to_vec(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            max_daily_changes: DEFAULT_MAX_DAILY_CHANGES,
            high_traffic_threshold: DEFAULT_HIGH_TRAFFIC_THRESHOLD,
            auto_revert_threshold: DEFAULT_AUTO_REVERT_THRESHOLD,
        }
    }
}

impl AutopilotPolicy {
    pub fn allows(&self, change_type: ChangeType) -> bool {
        self.allowed_change_types.contains(&change_type)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        validate_confidence_threshold(self.confidence_threshold)?;
        if self.max_daily_changes < 1 {
            return Err(CoreError::Validation(format!(
                "max_daily_changes must be at least 1, got {}",
                self.max_daily_changes
            )));
        }
        if self.high_traffic_threshold < 0 {
            return Err(CoreError::Validation(format!(
                "high_traffic_threshold must be non-negative, got {}",
                self.high_traffic_threshold
            )));
        }
        if !(self.auto_revert_threshold > 0.0 && self.auto_revert_threshold <= 100.0) {
            return Err(CoreError::Validation(format!(
                "auto_revert_threshold must be in (0, 100], got {}",
                self.auto_revert_threshold
            )));
        }
        Ok(())
    }
}

pub fn validate_confidence_threshold(threshold: i16) -> Result<(), CoreError> {
    if (0..=100).contains(&threshold) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "confidence_threshold must be between 0 and 100, got {threshold}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

/// Facts about a recommendation needed to decide queue admission.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionInput {
    pub category: Category,
    pub auto_fixable: bool,
    pub has_page: bool,
    pub confidence: i16,
    /// Page impressions over the last 7 days.
    pub impressions_7d: i64,
}

/// Queue flags computed for an admitted recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub change_type: ChangeType,
    pub is_high_traffic: bool,
    pub requires_approval: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibleReason {
    NotAutoFixable,
    NoPage,
    NoChangeType,
    ChangeTypeNotAllowed,
}

/// Decide whether a recommendation may enter the queue.
pub fn admit(policy: &AutopilotPolicy, input: AdmissionInput) -> Result<Admission, IneligibleReason> {
    if !input.auto_fixable {
        return Err(IneligibleReason::NotAutoFixable);
    }
    if !input.has_page {
        return Err(IneligibleReason::NoPage);
    }
    let change_type = ChangeType::from_category(input.category).ok_or(IneligibleReason::NoChangeType)?;
    if !policy.allows(change_type) {
        return Err(IneligibleReason::ChangeTypeNotAllowed);
    }

    let is_high_traffic = input.impressions_7d > policy.high_traffic_threshold;
    let requires_approval = is_high_traffic || input.confidence < policy.confidence_threshold;

    Ok(Admission {
        change_type,
        is_high_traffic,
        requires_approval,
    })
}

// ---------------------------------------------------------------------------
// Apply gate
// ---------------------------------------------------------------------------

/// Why an apply attempt stays where it is. Not a failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DeferReason {
    ChangeTypeNotAllowed { change_type: ChangeType },
    BelowConfidence { confidence: i16, threshold: i16 },
    AwaitingApproval,
    DailyCapReached { cap: i32 },
    NotApplicable { status: QueueStatus },
}

impl fmt::Display for DeferReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeferReason::ChangeTypeNotAllowed { change_type } => {
                write!(f, "change type '{change_type}' is no longer allowed")
            }
            DeferReason::BelowConfidence {
                confidence,
                threshold,
            } => write!(f, "confidence {confidence} is below threshold {threshold}"),
            DeferReason::AwaitingApproval => f.write_str("awaiting manual approval"),
            DeferReason::DailyCapReached { cap } => {
                write!(f, "daily change cap of {cap} reached")
            }
            DeferReason::NotApplicable { status } => {
                write!(f, "item in status '{status}' cannot be applied")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApplyDecision {
    Apply,
    Deferred(DeferReason),
}

/// The queue fields the apply gate reads.
#[derive(Debug, Clone, Copy)]
pub struct GateInput {
    pub status: QueueStatus,
    pub change_type: ChangeType,
    pub confidence: i16,
    pub requires_approval: bool,
}

/// Automatic apply path: every gate applies.
pub fn evaluate_auto_apply(policy: &AutopilotPolicy, item: GateInput, applied_today: i32) -> ApplyDecision {
    if !matches!(item.status, QueueStatus::Pending | QueueStatus::Approved) {
        return ApplyDecision::Deferred(DeferReason::NotApplicable { status: item.status });
    }
    if !policy.allows(item.change_type) {
        return ApplyDecision::Deferred(DeferReason::ChangeTypeNotAllowed {
            change_type: item.change_type,
        });
    }
    if item.confidence < policy.confidence_threshold {
        return ApplyDecision::Deferred(DeferReason::BelowConfidence {
            confidence: item.confidence,
            threshold: policy.confidence_threshold,
        });
    }
    if item.requires_approval && item.status != QueueStatus::Approved {
        return ApplyDecision::Deferred(DeferReason::AwaitingApproval);
    }
    cap_gate(policy, applied_today)
}

/// Administrator "apply now": bypasses confidence and traffic gating, never the cap.
pub fn evaluate_manual_apply(policy: &AutopilotPolicy, status: QueueStatus, applied_today: i32) -> ApplyDecision {
    if !matches!(status, QueueStatus::Pending | QueueStatus::Approved) {
        return ApplyDecision::Deferred(DeferReason::NotApplicable { status });
    }
    cap_gate(policy, applied_today)
}

fn cap_gate(policy: &AutopilotPolicy, applied_today: i32) -> ApplyDecision {
    if applied_today >= policy.max_daily_changes {
        ApplyDecision::Deferred(DeferReason::DailyCapReached {
            cap: policy.max_daily_changes,
        })
    } else {
        ApplyDecision::Apply
    }
}

// ---------------------------------------------------------------------------
// Auto-revert
// ---------------------------------------------------------------------------

/// Whether an applied change should be rolled back.
///
/// True when clicks fell strictly more than `threshold_percent` below the
/// baseline captured at apply time. A zero baseline never reverts.
pub fn should_revert(baseline_clicks: i64, current_clicks: i64, threshold_percent: f64) -> bool {
    if baseline_clicks <= 0 {
        return false;
    }
    let drop = (baseline_clicks - current_clicks) as f64 / baseline_clicks as f64 * 100.0;
    drop > threshold_percent
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn policy() -> AutopilotPolicy {
        AutopilotPolicy {
            enabled: true,
            ..Default::default()
        }
    }

    fn input(category: Category, confidence: i16, impressions_7d: i64) -> AdmissionInput {
        AdmissionInput {
            category,
            auto_fixable: true,
            has_page: true,
            confidence,
            impressions_7d,
        }
    }

    fn gate(status: QueueStatus, confidence: i16, requires_approval: bool) -> GateInput {
        GateInput {
            status,
            change_type: ChangeType::Title,
            confidence,
            requires_approval,
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(AutopilotPolicy::default().validate().is_ok());
        assert!(!AutopilotPolicy::default().enabled);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut p = policy();
        p.confidence_threshold = 101;
        assert!(p.validate().is_err());

        let mut p = policy();
        p.max_daily_changes = 0;
        assert!(p.validate().is_err());

        let mut p = policy();
        p.auto_revert_threshold = 0.0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn admission_requires_allowed_type() {
        let p = policy();
        assert_matches!(admit(&p, input(Category::Title, 90, 10)), Ok(a) if a.change_type == ChangeType::Title);
        assert_eq!(
            admit(&p, input(Category::Content, 90, 10)),
            Err(IneligibleReason::ChangeTypeNotAllowed)
        );
        assert_eq!(
            admit(&p, input(Category::Keyword, 90, 10)),
            Err(IneligibleReason::NoChangeType)
        );
    }

    #[test]
    fn admission_requires_auto_fixable_with_page() {
        let p = policy();
        let mut i = input(Category::Meta, 90, 10);
        i.auto_fixable = false;
        assert_eq!(admit(&p, i), Err(IneligibleReason::NotAutoFixable));

        let mut i = input(Category::Meta, 90, 10);
        i.has_page = false;
        assert_eq!(admit(&p, i), Err(IneligibleReason::NoPage));
    }

    #[test]
    fn high_traffic_forces_approval() {
        let a = admit(&policy(), input(Category::Title, 95, 1001)).unwrap();
        assert!(a.is_high_traffic);
        assert!(a.requires_approval);

        let a = admit(&policy(), input(Category::Title, 95, 1000)).unwrap();
        assert!(!a.is_high_traffic);
        assert!(!a.requires_approval);
    }

    #[test]
    fn low_confidence_forces_approval() {
        let a = admit(&policy(), input(Category::Title, 79, 0)).unwrap();
        assert!(a.requires_approval);
        let a = admit(&policy(), input(Category::Title, 80, 0)).unwrap();
        assert!(!a.requires_approval);
    }

    #[test]
    fn auto_apply_at_threshold_passes() {
        let p = policy();
        assert_eq!(
            evaluate_auto_apply(&p, gate(QueueStatus::Pending, 80, false), 0),
            ApplyDecision::Apply
        );
    }

    #[test]
    fn auto_apply_below_threshold_defers_even_if_approved() {
        let p = policy();
        assert_matches!(
            evaluate_auto_apply(&p, gate(QueueStatus::Approved, 79, true), 0),
            ApplyDecision::Deferred(DeferReason::BelowConfidence { confidence: 79, threshold: 80 })
        );
    }

    #[test]
    fn approval_requirement_is_satisfied_by_approved_status() {
        let p = policy();
        assert_eq!(
            evaluate_auto_apply(&p, gate(QueueStatus::Pending, 90, true), 0),
            ApplyDecision::Deferred(DeferReason::AwaitingApproval)
        );
        assert_eq!(
            evaluate_auto_apply(&p, gate(QueueStatus::Approved, 90, true), 0),
            ApplyDecision::Apply
        );
    }

    #[test]
    fn auto_apply_rechecks_allowed_change_types() {
        let mut p = policy();
        p.allowed_change_types.retain(|t| *t != ChangeType::Title);
        let decision = evaluate_auto_apply(&p, gate(QueueStatus::Approved, 95, false), 0);
        assert_eq!(
            decision,
            ApplyDecision::Deferred(DeferReason::ChangeTypeNotAllowed {
                change_type: ChangeType::Title
            })
        );
        assert_eq!(
            decision_reason(&decision).as_deref(),
            Some("change type 'title' is no longer allowed")
        );

        // Manual apply is an administrator override and skips the type check.
        assert_eq!(evaluate_manual_apply(&p, QueueStatus::Pending, 0), ApplyDecision::Apply);
    }

    fn decision_reason(decision: &ApplyDecision) -> Option<String> {
        match decision {
            ApplyDecision::Deferred(reason) => Some(reason.to_string()),
            ApplyDecision::Apply => None,
        }
    }

    #[test]
    fn cap_blocks_both_paths() {
        let p = AutopilotPolicy {
            max_daily_changes: 2,
            ..policy()
        };
        assert_matches!(
            evaluate_auto_apply(&p, gate(QueueStatus::Pending, 99, false), 2),
            ApplyDecision::Deferred(DeferReason::DailyCapReached { cap: 2 })
        );
        assert_matches!(
            evaluate_manual_apply(&p, QueueStatus::Pending, 2),
            ApplyDecision::Deferred(DeferReason::DailyCapReached { cap: 2 })
        );
    }

    #[test]
    fn manual_apply_ignores_confidence() {
        let p = policy();
        assert_eq!(evaluate_manual_apply(&p, QueueStatus::Pending, 0), ApplyDecision::Apply);
        assert_matches!(
            evaluate_manual_apply(&p, QueueStatus::Rejected, 0),
            ApplyDecision::Deferred(DeferReason::NotApplicable { .. })
        );
    }

    #[test]
    fn revert_requires_strictly_greater_drop() {
        assert!(!should_revert(100, 80, 20.0));
        assert!(should_revert(100, 79, 20.0));
        assert!(!should_revert(0, 0, 20.0));
        assert!(!should_revert(100, 140, 20.0));
    }

    #[test]
    fn change_type_round_trips_through_str() {
        for t in ALL_CHANGE_TYPES {
            assert_eq!(ChangeType::parse(t.as_str()).unwrap(), *t);
        }
        assert!(ChangeType::parse("footer").is_err());
    }
}
