//! Autopilot module: admit eligible recommendations, then try to apply
//! everything waiting in the queue.

use autopilot_core::autopilot::{admit, AdmissionInput, AutopilotPolicy, DeferReason};
use autopilot_core::recommendation::Category;
use autopilot_core::run::{ModuleResult, RunMode};
use autopilot_db::models::autopilot::CreateQueueItem;
use autopilot_events::bus::{AutopilotEvent, EVENT_APPROVAL_NEEDED};

use super::RunContext;
use crate::error::PipelineResult;
use crate::queue::ApplyOutcome;

pub async fn run(ctx: &RunContext<'_>) -> PipelineResult<ModuleResult> {
    if !ctx.settings.enabled {
        return Ok(ModuleResult::skipped("autopilot disabled"));
    }
    if ctx.mode == RunMode::Quick {
        return Ok(ModuleResult::skipped("quick mode"));
    }

    let policy = ctx.settings.policy();
    let admitted = admit_pending(ctx, &policy).await?;

    let mut applied = 0usize;
    let mut deferred = 0usize;
    let mut held_for_review = 0usize;
    let mut failed = 0usize;

    for item in ctx.stores.queue.list_applicable(ctx.site.id).await? {
        match ctx.queue.auto_apply(&item, ctx.settings).await {
            Ok(ApplyOutcome::Applied(_)) => applied += 1,
            Ok(ApplyOutcome::Deferred(reason)) => {
                deferred += 1;
                if matches!(
                    reason,
                    DeferReason::AwaitingApproval | DeferReason::BelowConfidence { .. }
                ) {
                    held_for_review += 1;
                }
                tracing::debug!(item_id = item.id, %reason, "Queue item deferred");
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(item_id = item.id, error = %e, "Auto-apply failed");
            }
        }
    }

    if held_for_review > 0 && ctx.settings.notify_on_approval_needed {
        ctx.events.publish(
            AutopilotEvent::new(EVENT_APPROVAL_NEEDED, ctx.site.id)
                .with_source("run", ctx.run_id)
                .with_payload(serde_json::json!({ "heldForReview": held_for_review })),
        );
    }

    Ok(ModuleResult::ok(serde_json::json!({
        "admitted": admitted,
        "applied": applied,
        "deferred": deferred,
        "heldForReview": held_for_review,
        "failed": failed,
    })))
}

/// Queue every pending recommendation that passes admission.
async fn admit_pending(ctx: &RunContext<'_>, policy: &AutopilotPolicy) -> PipelineResult<usize> {
    let mut admitted = 0;
    for rec in ctx.stores.recommendations.list_pending_unqueued(ctx.site.id).await? {
        let Ok(category) = Category::parse(&rec.category) else {
            continue;
        };
        let page = rec
            .page_id
            .and_then(|id| ctx.pages.iter().find(|p| p.id == id));

        let input = AdmissionInput {
            category,
            auto_fixable: rec.auto_fixable,
            has_page: page.is_some(),
            confidence: rec.confidence,
            impressions_7d: page.map_or(0, |p| p.impressions_7d),
        };
        let admission = match admit(policy, input) {
            Ok(a) => a,
            Err(reason) => {
                tracing::trace!(recommendation_id = rec.id, ?reason, "Not queue-eligible");
                continue;
            }
        };

        let created = ctx
            .stores
            .queue
            .create_item(&CreateQueueItem {
                site_id: ctx.site.id,
                recommendation_id: Some(rec.id),
                page_id: rec.page_id,
                change_type: admission.change_type.as_str().to_string(),
                field: admission.change_type.field().to_string(),
                old_value: rec.current_value.clone(),
                suggested_value: rec.suggested_value.clone(),
                ai_confidence: rec.confidence,
                is_high_traffic: admission.is_high_traffic,
                requires_approval: admission.requires_approval,
            })
            .await?;
        if created.is_some() {
            admitted += 1;
        }
    }
    Ok(admitted)
}
