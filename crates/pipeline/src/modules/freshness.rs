//! Knowledge freshness check.

use autopilot_core::freshness;
use autopilot_core::run::ModuleResult;

use super::RunContext;
use crate::error::PipelineResult;

/// Classify the cached business profile and request retraining when it is
/// stale or missing.
pub async fn run(ctx: &RunContext<'_>) -> PipelineResult<ModuleResult> {
    let last_trained_at = ctx.knowledge.and_then(|k| k.last_trained_at);
    let mut report = freshness::evaluate(last_trained_at, ctx.now, ctx.config.knowledge_max_age_days);

    if report.status.needs_retrain() {
        ctx.stores.knowledge.flag_retrain(ctx.site.id).await?;
        report.retrain_flagged = true;
        tracing::info!(
            site_id = %ctx.site.id,
            status = ?report.status,
            age_days = ?report.age_days,
            "Knowledge profile flagged for retraining",
        );
    }

    Ok(ModuleResult::ok(report))
}
