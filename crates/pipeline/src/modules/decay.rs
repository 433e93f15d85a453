//! Content decay detection.
//!
//! Flags pages whose clicks dropped against the prior 28-day window. Pages
//! that recovered keep their flag; clearing it is a separate sweep.

use autopilot_core::decay::{classify, DecaySeverity};
use autopilot_core::run::ModuleResult;
use serde::Serialize;

use super::RunContext;
use crate::error::PipelineResult;

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct DecayReport {
    pages_checked: usize,
    decaying_count: usize,
    critical: usize,
    high: usize,
    medium: usize,
}

pub async fn run(ctx: &RunContext<'_>) -> PipelineResult<ModuleResult> {
    let mut report = DecayReport {
        pages_checked: ctx.pages.len(),
        ..Default::default()
    };

    for page in ctx.pages {
        let Some(severity) = classify(page.clicks_prev_28d, page.clicks_28d) else {
            continue;
        };
        ctx.stores
            .metrics
            .mark_decaying(page.id, severity.as_str(), ctx.now)
            .await?;

        report.decaying_count += 1;
        match severity {
            DecaySeverity::Critical => report.critical += 1,
            DecaySeverity::High => report.high += 1,
            DecaySeverity::Medium => report.medium += 1,
        }
    }

    if report.decaying_count > 0 {
        tracing::info!(
            site_id = %ctx.site.id,
            decaying = report.decaying_count,
            critical = report.critical,
            "Decaying pages detected",
        );
    }

    Ok(ModuleResult::ok(report))
}
