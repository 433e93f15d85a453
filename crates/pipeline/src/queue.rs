//! Autopilot queue actions and the apply protocol.
//!
//! Applying a change:
//!
//! 1. evaluate the gates (automatic or manual),
//! 2. reserve one slot of the site's counter for the current UTC day,
//! 3. publish the change,
//! 4. record `applied` with the click baseline.
//!
//! A failure after step 2 releases the slot and leaves the item where it was.
//! Steps 2 to 4 run on a spawned task, so a cancelled caller cannot leave a
//! published change unrecorded.

use std::sync::Arc;

use autopilot_core::autopilot::{
    evaluate_auto_apply, evaluate_manual_apply, ApplyDecision, ChangeType, DeferReason,
    GateInput,
};
use autopilot_core::error::CoreError;
use autopilot_core::queue::{transition, QueueAction, QueueStatus};
use autopilot_core::recommendation::RecommendationStatus;
use autopilot_core::types::{DbId, Timestamp};
use autopilot_db::models::autopilot::{AutopilotSettings, QueueItem};
use autopilot_events::bus::{AutopilotEvent, EVENT_CHANGE_APPLIED, EVENT_CHANGE_REVERTED};
use autopilot_events::EventBus;
use chrono::Utc;

use crate::error::PipelineResult;
use crate::store::Collaborators;

/// Result of an apply attempt that did not fail.
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    Applied(QueueItem),
    /// A gate held the item back; it keeps its current status.
    Deferred(DeferReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApplyPath {
    Automatic,
    Manual,
}

#[derive(Clone)]
pub struct QueueService {
    stores: Collaborators,
    events: Arc<EventBus>,
}

impl QueueService {
    pub fn new(stores: Collaborators, events: Arc<EventBus>) -> Self {
        Self { stores, events }
    }

    pub async fn find(&self, item_id: DbId) -> PipelineResult<QueueItem> {
        self.stores
            .queue
            .find_item(item_id)
            .await?
            .ok_or_else(|| CoreError::not_found("QueueItem", item_id).into())
    }

    /// Administrator approval of a pending item.
    pub async fn approve(&self, item_id: DbId, reviewed_by: Option<&str>) -> PipelineResult<QueueItem> {
        self.review(item_id, QueueAction::Approve, reviewed_by).await
    }

    /// Administrator rejection of a pending item. The linked recommendation
    /// is rejected too.
    pub async fn reject(&self, item_id: DbId, reviewed_by: Option<&str>) -> PipelineResult<QueueItem> {
        let item = self.review(item_id, QueueAction::Reject, reviewed_by).await?;
        if let Some(rec_id) = item.recommendation_id {
            self.move_recommendation(
                rec_id,
                &[RecommendationStatus::Pending, RecommendationStatus::AutoApproved],
                RecommendationStatus::Rejected,
            )
            .await;
        }
        Ok(item)
    }

    async fn review(
        &self,
        item_id: DbId,
        action: QueueAction,
        reviewed_by: Option<&str>,
    ) -> PipelineResult<QueueItem> {
        let item = self.find(item_id).await?;
        let from = item.queue_status()?;
        let to = transition(from, action)?;

        let updated = self
            .stores
            .queue
            .review_item(item_id, from, to, reviewed_by, Utc::now())
            .await?
            .ok_or_else(|| {
                CoreError::Conflict(format!("Queue item {item_id} changed while being reviewed"))
            })?;

        tracing::info!(
            item_id,
            site_id = %item.site_id,
            from = %from,
            to = %to,
            reviewed_by = reviewed_by.unwrap_or("-"),
            "Queue item reviewed",
        );
        Ok(updated)
    }

    /// Administrator "apply now". Skips the confidence and traffic gates,
    /// never the daily cap.
    pub async fn apply_now(&self, item_id: DbId, reviewed_by: Option<&str>) -> PipelineResult<ApplyOutcome> {
        let item = self.find(item_id).await?;
        let status = item.queue_status()?;
        transition(status, QueueAction::Apply)?;

        let settings = self.stores.settings.get_or_create(item.site_id).await?;
        let applied_today = self.applied_today(&item, Utc::now()).await?;

        match evaluate_manual_apply(&settings.policy(), status, applied_today) {
            ApplyDecision::Deferred(reason) => Ok(ApplyOutcome::Deferred(reason)),
            ApplyDecision::Apply => {
                self.execute(&item, status, &settings, reviewed_by, ApplyPath::Manual)
                    .await
            }
        }
    }

    /// Automatic apply path used by the autopilot module.
    pub async fn auto_apply(
        &self,
        item: &QueueItem,
        settings: &AutopilotSettings,
    ) -> PipelineResult<ApplyOutcome> {
        let status = item.queue_status()?;
        let applied_today = self.applied_today(item, Utc::now()).await?;
        let gate = GateInput {
            status,
            change_type: ChangeType::parse(&item.change_type)?,
            confidence: item.ai_confidence,
            requires_approval: item.requires_approval,
        };

        match evaluate_auto_apply(&settings.policy(), gate, applied_today) {
            ApplyDecision::Deferred(reason) => Ok(ApplyOutcome::Deferred(reason)),
            ApplyDecision::Apply => {
                self.execute(item, status, settings, None, ApplyPath::Automatic)
                    .await
            }
        }
    }

    /// Roll an applied change back and mark the item reverted.
    pub async fn revert(
        &self,
        item: &QueueItem,
        reason: &str,
        settings: &AutopilotSettings,
    ) -> PipelineResult<Option<QueueItem>> {
        transition(item.queue_status()?, QueueAction::Revert)?;

        self.stores.publisher.rollback(item).await?;
        let reverted = self
            .stores
            .queue
            .mark_reverted(item.id, reason, Utc::now())
            .await?;

        if let Some(reverted) = &reverted {
            tracing::warn!(
                item_id = item.id,
                site_id = %item.site_id,
                reason,
                "Applied change reverted",
            );
            if settings.notify_on_revert {
                self.events.publish(
                    AutopilotEvent::new(EVENT_CHANGE_REVERTED, item.site_id)
                        .with_source("queue_item", item.id)
                        .with_payload(serde_json::json!({
                            "changeType": reverted.change_type,
                            "field": reverted.field,
                            "reason": reason,
                        })),
                );
            }
        }
        Ok(reverted)
    }

    async fn applied_today(&self, item: &QueueItem, now: Timestamp) -> PipelineResult<i32> {
        self.stores
            .counters
            .applied_count(item.site_id, now.date_naive())
            .await
    }

    /// Run the reserve, publish and record steps on their own task.
    ///
    /// Dropping the caller (run budget, request timeout) must not stop the
    /// protocol between a publish and its record or rollback, so the task is
    /// awaited but never aborted.
    async fn execute(
        &self,
        item: &QueueItem,
        from: QueueStatus,
        settings: &AutopilotSettings,
        reviewed_by: Option<&str>,
        path: ApplyPath,
    ) -> PipelineResult<ApplyOutcome> {
        let service = self.clone();
        let item = item.clone();
        let settings = settings.clone();
        let reviewed_by = reviewed_by.map(str::to_string);

        tokio::spawn(async move {
            service
                .apply_protocol(&item, from, &settings, reviewed_by.as_deref(), path)
                .await
        })
        .await
        .map_err(|e| CoreError::Internal(format!("apply task for queue item failed: {e}")))?
    }

    async fn apply_protocol(
        &self,
        item: &QueueItem,
        from: QueueStatus,
        settings: &AutopilotSettings,
        reviewed_by: Option<&str>,
        path: ApplyPath,
    ) -> PipelineResult<ApplyOutcome> {
        let now = Utc::now();
        let day = now.date_naive();

        let reserved = self
            .stores
            .counters
            .try_reserve(item.site_id, day, settings.max_daily_changes)
            .await?;
        if reserved.is_none() {
            return Ok(ApplyOutcome::Deferred(DeferReason::DailyCapReached {
                cap: settings.max_daily_changes,
            }));
        }

        let applied = match self.publish_and_record(item, from, reviewed_by, now).await {
            Ok(applied) => applied,
            Err(e) => {
                if let Err(release_err) = self.stores.counters.release(item.site_id, day).await {
                    tracing::error!(
                        site_id = %item.site_id,
                        error = %release_err,
                        "Failed to release daily counter slot",
                    );
                }
                return Err(e);
            }
        };

        if let Some(rec_id) = item.recommendation_id {
            match path {
                ApplyPath::Automatic => {
                    self.move_recommendation(
                        rec_id,
                        &[RecommendationStatus::Pending],
                        RecommendationStatus::AutoApproved,
                    )
                    .await;
                    self.move_recommendation(
                        rec_id,
                        &[RecommendationStatus::AutoApproved],
                        RecommendationStatus::Applied,
                    )
                    .await;
                }
                ApplyPath::Manual => {
                    self.move_recommendation(
                        rec_id,
                        &[RecommendationStatus::Pending, RecommendationStatus::AutoApproved],
                        RecommendationStatus::Applied,
                    )
                    .await;
                }
            }
        }

        tracing::info!(
            item_id = item.id,
            site_id = %item.site_id,
            change_type = %item.change_type,
            automatic = path == ApplyPath::Automatic,
            "Change applied",
        );
        if settings.notify_on_apply {
            self.events.publish(
                AutopilotEvent::new(EVENT_CHANGE_APPLIED, item.site_id)
                    .with_source("queue_item", item.id)
                    .with_payload(serde_json::json!({
                        "changeType": applied.change_type,
                        "field": applied.field,
                        "confidence": applied.ai_confidence,
                        "automatic": path == ApplyPath::Automatic,
                    })),
            );
        }

        Ok(ApplyOutcome::Applied(applied))
    }

    async fn publish_and_record(
        &self,
        item: &QueueItem,
        from: QueueStatus,
        reviewed_by: Option<&str>,
        now: Timestamp,
    ) -> PipelineResult<QueueItem> {
        let baseline_clicks = match item.page_id {
            Some(page_id) => self
                .stores
                .metrics
                .find_page(page_id)
                .await?
                .map_or(0, |p| p.clicks_28d),
            None => 0,
        };

        self.stores.publisher.publish(item).await?;

        let recorded = self
            .stores
            .queue
            .mark_applied(item.id, from, baseline_clicks, reviewed_by, now)
            .await;
        match recorded {
            Ok(Some(applied)) => Ok(applied),
            Ok(None) => {
                self.undo_publish(item).await;
                Err(CoreError::Conflict(format!(
                    "Queue item {} changed while being applied",
                    item.id
                ))
                .into())
            }
            Err(e) => {
                self.undo_publish(item).await;
                Err(e)
            }
        }
    }

    async fn undo_publish(&self, item: &QueueItem) {
        if let Err(e) = self.stores.publisher.rollback(item).await {
            tracing::error!(item_id = item.id, error = %e, "Failed to roll back unrecorded change");
        }
    }

    /// Best-effort recommendation status update; the queue item is the
    /// source of truth for what was applied.
    async fn move_recommendation(
        &self,
        rec_id: DbId,
        from: &[RecommendationStatus],
        to: RecommendationStatus,
    ) {
        match self
            .stores
            .recommendations
            .transition_recommendation(rec_id, from, to)
            .await
        {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::debug!(recommendation_id = rec_id, to = %to, "Recommendation not in expected status");
            }
            Err(e) => {
                tracing::warn!(recommendation_id = rec_id, error = %e, "Failed to update recommendation status");
            }
        }
    }
}
