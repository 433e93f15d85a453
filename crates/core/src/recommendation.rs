//! Recommendation vocabulary and completion-response parsing.
//!
//! The completion service is asked for a JSON document matching
//! [`response_schema`]. [`parse_completion`] turns the raw reply into
//! validated [`ParsedRecommendation`]s or rejects the whole reply.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Upper bound on recommendations accepted from a single completion.
pub const MAX_RECOMMENDATIONS_PER_COMPLETION: usize = 25;

/// Maximum length of a recommendation title.
pub const MAX_TITLE_LEN: usize = 200;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Title,
    Meta,
    Content,
    Technical,
    Keyword,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Title => "title",
            Category::Meta => "meta",
            Category::Content => "content",
            Category::Technical => "technical",
            Category::Keyword => "keyword",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "title" => Ok(Category::Title),
            "meta" => Ok(Category::Meta),
            "content" => Ok(Category::Content),
            "technical" => Ok(Category::Technical),
            "keyword" => Ok(Category::Keyword),
            other => Err(CoreError::Validation(format!(
                "Invalid category '{other}'. Must be one of: title, meta, content, technical, keyword"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(CoreError::Validation(format!(
                "Invalid priority '{other}'. Must be one of: critical, high, medium, low"
            ))),
        }
    }

    /// Critical and high priorities count toward the pending-actions alert.
    pub fn is_urgent(self) -> bool {
        matches!(self, Priority::Critical | Priority::High)
    }
}

/// Recommendation lifecycle. Records are never deleted, only transitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    Pending,
    AutoApproved,
    Applied,
    Rejected,
    Dismissed,
}

impl RecommendationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RecommendationStatus::Pending => "pending",
            RecommendationStatus::AutoApproved => "auto_approved",
            RecommendationStatus::Applied => "applied",
            RecommendationStatus::Rejected => "rejected",
            RecommendationStatus::Dismissed => "dismissed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "pending" => Ok(RecommendationStatus::Pending),
            "auto_approved" => Ok(RecommendationStatus::AutoApproved),
            "applied" => Ok(RecommendationStatus::Applied),
            "rejected" => Ok(RecommendationStatus::Rejected),
            "dismissed" => Ok(RecommendationStatus::Dismissed),
            other => Err(CoreError::Validation(format!(
                "Invalid recommendation status '{other}'"
            ))),
        }
    }

    /// Check a status change against the allowed transition table.
    ///
    /// ```text
    /// pending       -> auto_approved | applied | rejected | dismissed
    /// auto_approved -> applied | rejected
    /// ```
    pub fn check_transition(self, to: RecommendationStatus) -> Result<(), CoreError> {
        use RecommendationStatus::*;
        let allowed = matches!(
            (self, to),
            (Pending, AutoApproved)
                | (Pending, Applied)
                | (Pending, Rejected)
                | (Pending, Dismissed)
                | (AutoApproved, Applied)
                | (AutoApproved, Rejected)
        );
        if allowed {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                entity: "Recommendation",
                from: self.to_string(),
                to: to.to_string(),
            })
        }
    }
}

impl fmt::Display for RecommendationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Completion response
// ---------------------------------------------------------------------------

/// The document shape requested from the completion service.
#[derive(Debug, Deserialize)]
struct CompletionDocument {
    recommendations: Vec<RawRecommendation>,
}

#[derive(Debug, Deserialize)]
struct RawRecommendation {
    page_url: Option<String>,
    title: String,
    #[serde(default)]
    description: Option<String>,
    category: String,
    priority: String,
    #[serde(default)]
    current_value: Option<String>,
    suggested_value: String,
    confidence: f64,
    #[serde(default)]
    auto_fixable: bool,
}

/// A recommendation that passed validation and is ready to persist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedRecommendation {
    pub page_url: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub category: Category,
    pub priority: Priority,
    pub current_value: Option<String>,
    pub suggested_value: String,
    /// Model-reported certainty, 0-100.
    pub confidence: i16,
    pub auto_fixable: bool,
}

/// JSON Schema sent alongside the prompt.
pub fn response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "required": ["recommendations"],
        "properties": {
            "recommendations": {
                "type": "array",
                "maxItems": MAX_RECOMMENDATIONS_PER_COMPLETION,
                "items": {
                    "type": "object",
                    "required": ["title", "category", "priority", "suggested_value", "confidence"],
                    "properties": {
                        "page_url": { "type": ["string", "null"] },
                        "title": { "type": "string", "maxLength": MAX_TITLE_LEN },
                        "description": { "type": ["string", "null"] },
                        "category": { "enum": ["title", "meta", "content", "technical", "keyword"] },
                        "priority": { "enum": ["critical", "high", "medium", "low"] },
                        "current_value": { "type": ["string", "null"] },
                        "suggested_value": { "type": "string" },
                        "confidence": { "type": "number", "minimum": 0, "maximum": 100 },
                        "auto_fixable": { "type": "boolean" }
                    }
                }
            }
        }
    })
}

/// Strip a surrounding Markdown code fence from a completion reply, if any.
pub fn extract_json_block(text: &str) -> &str {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("static regex is valid")
    });
    match fence.captures(text).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => text.trim(),
    }
}

/// Validate a completion reply. Any malformed item rejects the whole reply.
///
/// Replies with more than [`MAX_RECOMMENDATIONS_PER_COMPLETION`] items are
/// truncated rather than rejected.
pub fn parse_completion(value: serde_json::Value) -> Result<Vec<ParsedRecommendation>, CoreError> {
    let document: CompletionDocument = serde_json::from_value(value)
        .map_err(|e| CoreError::Validation(format!("Completion response has wrong shape: {e}")))?;

    document
        .recommendations
        .into_iter()
        .take(MAX_RECOMMENDATIONS_PER_COMPLETION)
        .enumerate()
        .map(|(index, raw)| validate_item(raw).map_err(|e| prefix_index(index, e)))
        .collect()
}

fn prefix_index(index: usize, err: CoreError) -> CoreError {
    match err {
        CoreError::Validation(msg) => CoreError::Validation(format!("recommendations[{index}]: {msg}")),
        other => other,
    }
}

fn validate_item(raw: RawRecommendation) -> Result<ParsedRecommendation, CoreError> {
    let title = raw.title.trim().to_string();
    if title.is_empty() {
        return Err(CoreError::Validation("title is required".into()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(CoreError::Validation(format!(
            "title exceeds {MAX_TITLE_LEN} characters"
        )));
    }

    let suggested_value = raw.suggested_value.trim().to_string();
    if suggested_value.is_empty() {
        return Err(CoreError::Validation("suggested_value is required".into()));
    }

    if !raw.confidence.is_finite() || !(0.0..=100.0).contains(&raw.confidence) {
        return Err(CoreError::Validation(format!(
            "confidence must be between 0 and 100, got {}",
            raw.confidence
        )));
    }

    let page_url = raw
        .page_url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());

    Ok(ParsedRecommendation {
        page_url,
        title,
        description: raw.description.filter(|d| !d.trim().is_empty()),
        category: Category::parse(raw.category.trim())?,
        priority: Priority::parse(raw.priority.trim())?,
        current_value: raw.current_value,
        suggested_value,
        confidence: raw.confidence.round() as i16,
        auto_fixable: raw.auto_fixable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn item(title: &str, confidence: f64) -> serde_json::Value {
        json!({
            "page_url": "https://example.com/pricing",
            "title": title,
            "category": "title",
            "priority": "high",
            "current_value": "Pricing",
            "suggested_value": "Pricing Plans for Teams | Example",
            "confidence": confidence,
            "auto_fixable": true
        })
    }

    #[test]
    fn parses_valid_reply() {
        let parsed = parse_completion(json!({ "recommendations": [item("Rewrite title", 87.6)] }))
            .unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].category, Category::Title);
        assert_eq!(parsed[0].priority, Priority::High);
        assert_eq!(parsed[0].confidence, 88);
        assert!(parsed[0].auto_fixable);
    }

    #[test]
    fn missing_array_is_rejected() {
        let err = parse_completion(json!({ "suggestions": [] })).unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("wrong shape"));
    }

    #[test]
    fn one_bad_item_rejects_the_whole_reply() {
        let mut bad = item("Bad category", 50.0);
        bad["category"] = json!("branding");
        let err = parse_completion(json!({ "recommendations": [item("ok", 90.0), bad] }))
            .unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.starts_with("recommendations[1]"));
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        let err = parse_completion(json!({ "recommendations": [item("x", 140.0)] })).unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[test]
    fn blank_title_is_rejected() {
        assert!(parse_completion(json!({ "recommendations": [item("   ", 50.0)] })).is_err());
    }

    #[test]
    fn oversized_reply_is_truncated() {
        let items: Vec<_> = (0..40).map(|i| item(&format!("t{i}"), 60.0)).collect();
        let parsed = parse_completion(json!({ "recommendations": items })).unwrap();
        assert_eq!(parsed.len(), MAX_RECOMMENDATIONS_PER_COMPLETION);
    }

    #[test]
    fn code_fence_is_stripped() {
        let text = "Here you go:\n```json\n{\"recommendations\": []}\n```\n";
        assert_eq!(extract_json_block(text), "{\"recommendations\": []}");
        assert_eq!(extract_json_block("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn recommendation_transitions() {
        use RecommendationStatus::*;
        assert!(Pending.check_transition(AutoApproved).is_ok());
        assert!(AutoApproved.check_transition(Applied).is_ok());
        assert!(Pending.check_transition(Dismissed).is_ok());
        assert!(Applied.check_transition(Pending).is_err());
        assert!(Dismissed.check_transition(Applied).is_err());
    }

    #[test]
    fn urgency_covers_critical_and_high() {
        assert!(Priority::Critical.is_urgent());
        assert!(Priority::High.is_urgent());
        assert!(!Priority::Medium.is_urgent());
    }
}
