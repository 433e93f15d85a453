//! Optimization run vocabulary: modes, statuses, module names and the
//! tagged per-module result embedded in every run record.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Run mode
// ---------------------------------------------------------------------------

/// How much of the pipeline a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Every module, including the autopilot apply step.
    Full,
    /// Analysis only; the autopilot module is skipped.
    Quick,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::Full => "full",
            RunMode::Quick => "quick",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "full" => Ok(RunMode::Full),
            "quick" => Ok(RunMode::Quick),
            other => Err(CoreError::Validation(format!(
                "Invalid run mode '{other}'. Must be one of: full, quick"
            ))),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Run status
// ---------------------------------------------------------------------------

/// Lifecycle of an optimization run. `Completed` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Error,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "error" => Ok(RunStatus::Error),
            other => Err(CoreError::Validation(format!("Invalid run status '{other}'"))),
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

// ---------------------------------------------------------------------------
// Module names
// ---------------------------------------------------------------------------

pub const MODULE_FRESHNESS: &str = "freshness";
pub const MODULE_RANKING: &str = "ranking";
pub const MODULE_RECOMMENDATIONS: &str = "recommendations";
pub const MODULE_DECAY: &str = "decay";
pub const MODULE_ALERTS: &str = "alerts";
pub const MODULE_AUTOPILOT: &str = "autopilot";

/// Fixed execution order. Alerts and autopilot consume earlier outputs.
pub const MODULE_ORDER: &[&str] = &[
    MODULE_FRESHNESS,
    MODULE_RANKING,
    MODULE_RECOMMENDATIONS,
    MODULE_DECAY,
    MODULE_ALERTS,
    MODULE_AUTOPILOT,
];

// ---------------------------------------------------------------------------
// Module result
// ---------------------------------------------------------------------------

/// Outcome of a single module, embedded in the run's `results` map.
///
/// Serializes as `{"status": "ok", "payload": {...}}`,
/// `{"status": "skipped", "reason": "..."}` or
/// `{"status": "error", "error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ModuleResult {
    Ok { payload: serde_json::Value },
    Skipped { reason: String },
    Error { error: String },
}

impl ModuleResult {
    pub fn ok(payload: impl Serialize) -> Self {
        match serde_json::to_value(payload) {
            Ok(payload) => ModuleResult::Ok { payload },
            Err(e) => ModuleResult::Error {
                error: format!("failed to serialize module payload: {e}"),
            },
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        ModuleResult::Skipped {
            reason: reason.into(),
        }
    }

    pub fn error(error: impl fmt::Display) -> Self {
        ModuleResult::Error {
            error: error.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ModuleResult::Ok { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ModuleResult::Error { .. })
    }

    /// Read an integer counter out of an `Ok` payload. Anything else yields 0.
    pub fn payload_count(&self, field: &str) -> i64 {
        match self {
            ModuleResult::Ok { payload } => payload.get(field).and_then(|v| v.as_i64()).unwrap_or(0),
            _ => 0,
        }
    }
}

/// Per-module results keyed by module name.
pub type ModuleResults = BTreeMap<String, ModuleResult>;

// ---------------------------------------------------------------------------
// Aggregate counters
// ---------------------------------------------------------------------------

/// Aggregate counters stored on the run row once all modules have run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub recommendations_generated: i32,
    pub auto_applied: i32,
    pub alerts_raised: i32,
}

impl RunCounters {
    /// Derive the counters from the module results of a finished run.
    pub fn from_results(results: &ModuleResults) -> Self {
        let count = |module: &str, field: &str| {
            results
                .get(module)
                .map(|r| r.payload_count(field))
                .unwrap_or(0)
                .clamp(0, i32::MAX as i64) as i32
        };
        Self {
            recommendations_generated: count(MODULE_RECOMMENDATIONS, "generated"),
            auto_applied: count(MODULE_AUTOPILOT, "applied"),
            alerts_raised: count(MODULE_ALERTS, "raised"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_order_is_fixed() {
        assert_eq!(
            MODULE_ORDER,
            &["freshness", "ranking", "recommendations", "decay", "alerts", "autopilot"]
        );
    }

    #[test]
    fn module_result_serializes_tagged() {
        let ok = ModuleResult::ok(serde_json::json!({"generated": 3}));
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["payload"]["generated"], 3);

        let skipped = serde_json::to_value(ModuleResult::skipped("quick mode")).unwrap();
        assert_eq!(skipped["status"], "skipped");
        assert_eq!(skipped["reason"], "quick mode");

        let err = serde_json::to_value(ModuleResult::error("boom")).unwrap();
        assert_eq!(err["status"], "error");
        assert_eq!(err["error"], "boom");
    }

    #[test]
    fn counters_ignore_failed_modules() {
        let mut results = ModuleResults::new();
        results.insert(
            MODULE_RECOMMENDATIONS.into(),
            ModuleResult::ok(serde_json::json!({"generated": 4})),
        );
        results.insert(MODULE_AUTOPILOT.into(), ModuleResult::error("publisher down"));
        results.insert(
            MODULE_ALERTS.into(),
            ModuleResult::ok(serde_json::json!({"raised": 1})),
        );

        let counters = RunCounters::from_results(&results);
        assert_eq!(counters.recommendations_generated, 4);
        assert_eq!(counters.auto_applied, 0);
        assert_eq!(counters.alerts_raised, 1);
    }

    #[test]
    fn run_mode_parse_rejects_unknown() {
        assert_eq!(RunMode::parse("quick").unwrap(), RunMode::Quick);
        assert!(RunMode::parse("partial").is_err());
    }

    #[test]
    fn only_running_is_non_terminal() {
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Error.is_terminal());
    }
}
