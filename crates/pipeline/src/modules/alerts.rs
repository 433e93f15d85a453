//! Threshold alerts over the run so far.

use autopilot_core::alert::{self, RunSummary};
use autopilot_core::run::{ModuleResult, MODULE_DECAY};
use autopilot_db::models::alert::CreateAlert;
use autopilot_events::bus::{AutopilotEvent, EVENT_ALERT_RAISED};

use super::RunContext;
use crate::error::PipelineResult;

pub async fn run(ctx: &RunContext<'_>) -> PipelineResult<ModuleResult> {
    let decaying_pages = ctx
        .results
        .get(MODULE_DECAY)
        .map(|r| r.payload_count("decayingCount"))
        .unwrap_or(0);
    let urgent_pending_recommendations = ctx
        .stores
        .recommendations
        .count_pending_urgent(ctx.site.id)
        .await?;

    let drafts = alert::evaluate(&RunSummary {
        decaying_pages,
        urgent_pending_recommendations,
    });

    let mut raised = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let created = ctx
            .stores
            .alerts
            .create_alert(
                &CreateAlert {
                    site_id: ctx.site.id,
                    run_id: Some(ctx.run_id),
                    alert_type: draft.alert_type.to_string(),
                    severity: draft.severity.as_str().to_string(),
                    title: draft.title,
                    message: draft.message,
                    payload: draft.payload,
                },
                ctx.now,
            )
            .await?;

        tracing::warn!(
            site_id = %ctx.site.id,
            alert_id = created.id,
            alert_type = %created.alert_type,
            "Alert raised",
        );
        ctx.events.publish(
            AutopilotEvent::new(EVENT_ALERT_RAISED, ctx.site.id)
                .with_source("alert", created.id)
                .with_payload(serde_json::json!({
                    "alertType": created.alert_type,
                    "severity": created.severity,
                    "title": created.title,
                })),
        );
        raised.push(created.alert_type);
    }

    Ok(ModuleResult::ok(serde_json::json!({
        "raised": raised.len(),
        "types": raised,
        "decayingPages": decaying_pages,
        "urgentPending": urgent_pending_recommendations,
    })))
}
