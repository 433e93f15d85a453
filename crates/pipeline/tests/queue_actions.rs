//! Administrator queue actions and the apply protocol.

mod common;

use assert_matches::assert_matches;
use autopilot_core::autopilot::{ChangeType, DeferReason};
use autopilot_core::error::CoreError;
use autopilot_core::types::{DbId, SiteId};
use autopilot_db::models::recommendation::CreateRecommendation;
use autopilot_pipeline::store::{CounterStore, QueueStore, RecommendationStore};
use autopilot_pipeline::{ApplyOutcome, PipelineError};
use chrono::Utc;

use common::{no_recommendations, seed_item, today, Harness};

async fn seed_recommendation(h: &Harness, site_id: SiteId, page_id: DbId, title: &str) -> DbId {
    h.store
        .insert_if_absent(&CreateRecommendation {
            site_id,
            page_id: Some(page_id),
            title: title.to_string(),
            description: None,
            category: "title".to_string(),
            priority: "high".to_string(),
            current_value: Some("Pricing".to_string()),
            suggested_value: "Pricing Plans for Teams".to_string(),
            confidence: 60,
            auto_fixable: true,
            model: "static-test-model".to_string(),
            generated_at: Utc::now(),
        })
        .await
        .unwrap()
        .unwrap()
        .id
}

#[tokio::test]
async fn approval_unblocks_automatic_apply() {
    let h = Harness::new(no_recommendations());
    let site = h.site().await;
    let page = h.page(site.id, "/pricing", 400, 380).await;
    let settings = h.enable_autopilot(site.id, 80, 5).await;
    let item = seed_item(&h, site.id, page.id, None, 95, true).await;
    let queue = h.orchestrator.queue();

    assert_matches!(
        queue.auto_apply(&item, &settings).await,
        Ok(ApplyOutcome::Deferred(DeferReason::AwaitingApproval))
    );

    let approved = queue.approve(item.id, Some("ops@acme.test")).await.unwrap();
    assert_eq!(approved.status, "approved");
    assert_eq!(approved.reviewed_by.as_deref(), Some("ops@acme.test"));
    assert!(approved.reviewed_at.is_some());

    let outcome = queue.auto_apply(&approved, &settings).await.unwrap();
    let applied = assert_matches!(outcome, ApplyOutcome::Applied(item) => item);
    assert_eq!(applied.status, "applied");
    assert_eq!(applied.baseline_clicks, Some(400));
    assert_eq!(h.publisher.published().await, vec![item.id]);
}

#[tokio::test]
async fn approved_item_still_needs_confidence_on_automatic_path() {
    let h = Harness::new(no_recommendations());
    let site = h.site().await;
    let page = h.page(site.id, "/pricing", 400, 380).await;
    let settings = h.enable_autopilot(site.id, 80, 5).await;
    let item = seed_item(&h, site.id, page.id, None, 50, true).await;
    let queue = h.orchestrator.queue();

    let approved = queue.approve(item.id, None).await.unwrap();
    assert_matches!(
        queue.auto_apply(&approved, &settings).await,
        Ok(ApplyOutcome::Deferred(DeferReason::BelowConfidence { confidence: 50, threshold: 80 }))
    );
}

#[tokio::test]
async fn change_type_disallowed_after_admission_is_deferred() {
    let h = Harness::new(no_recommendations());
    let site = h.site().await;
    let page = h.page(site.id, "/pricing", 400, 380).await;
    let mut settings = h.enable_autopilot(site.id, 80, 5).await;
    let item = seed_item(&h, site.id, page.id, None, 95, false).await;
    let queue = h.orchestrator.queue();

    settings.allowed_change_types.retain(|t| t != "title");
    h.store.put_settings(settings.clone()).await;

    assert_matches!(
        queue.auto_apply(&item, &settings).await,
        Ok(ApplyOutcome::Deferred(DeferReason::ChangeTypeNotAllowed { change_type: ChangeType::Title }))
    );
    let item = h.store.find_item(item.id).await.unwrap().unwrap();
    assert_eq!(item.status, "pending");
    assert!(h.publisher.published().await.is_empty());
    assert_eq!(h.store.applied_count(site.id, today()).await.unwrap(), 0);
}

#[tokio::test]
async fn reject_is_terminal_and_rejects_the_recommendation() {
    let h = Harness::new(no_recommendations());
    let site = h.site().await;
    let page = h.page(site.id, "/pricing", 400, 380).await;
    let rec_id = seed_recommendation(&h, site.id, page.id, "Rewrite pricing title").await;
    let item = seed_item(&h, site.id, page.id, Some(rec_id), 60, true).await;
    let queue = h.orchestrator.queue();

    let rejected = queue.reject(item.id, Some("ops@acme.test")).await.unwrap();
    assert_eq!(rejected.status, "rejected");

    let rec = h.store.find_recommendation(rec_id).await.unwrap().unwrap();
    assert_eq!(rec.status, "rejected");

    assert_matches!(
        queue.approve(item.id, None).await,
        Err(PipelineError::Core(CoreError::InvalidTransition { entity: "QueueItem", .. }))
    );
    assert_matches!(
        queue.apply_now(item.id, None).await,
        Err(PipelineError::Core(CoreError::InvalidTransition { .. }))
    );
}

#[tokio::test]
async fn approved_item_cannot_be_rejected() {
    let h = Harness::new(no_recommendations());
    let site = h.site().await;
    let page = h.page(site.id, "/pricing", 400, 380).await;
    let item = seed_item(&h, site.id, page.id, None, 60, true).await;
    let queue = h.orchestrator.queue();

    queue.approve(item.id, None).await.unwrap();
    assert_matches!(
        queue.reject(item.id, None).await,
        Err(PipelineError::Core(CoreError::InvalidTransition { .. }))
    );
}

#[tokio::test]
async fn apply_now_bypasses_confidence_but_not_the_daily_cap() {
    let h = Harness::new(no_recommendations());
    let site = h.site().await;
    let page = h.page(site.id, "/pricing", 400, 380).await;
    let other = h.page(site.id, "/about", 90, 95).await;
    h.enable_autopilot(site.id, 80, 1).await;
    let rec_id = seed_recommendation(&h, site.id, page.id, "Rewrite pricing title").await;
    let first = seed_item(&h, site.id, page.id, Some(rec_id), 10, true).await;
    let second = seed_item(&h, site.id, other.id, None, 10, true).await;
    let queue = h.orchestrator.queue();

    let applied = assert_matches!(
        queue.apply_now(first.id, Some("ops@acme.test")).await,
        Ok(ApplyOutcome::Applied(item)) => item
    );
    assert_eq!(applied.reviewed_by.as_deref(), Some("ops@acme.test"));
    assert_eq!(applied.baseline_clicks, Some(400));
    let rec = h.store.find_recommendation(rec_id).await.unwrap().unwrap();
    assert_eq!(rec.status, "applied");

    assert_matches!(
        queue.apply_now(second.id, None).await,
        Ok(ApplyOutcome::Deferred(DeferReason::DailyCapReached { cap: 1 }))
    );
    let second = h.store.find_item(second.id).await.unwrap().unwrap();
    assert_eq!(second.status, "pending");
    assert_eq!(h.store.applied_count(site.id, today()).await.unwrap(), 1);
}

#[tokio::test]
async fn publish_failure_releases_the_reserved_slot() {
    let h = Harness::new(no_recommendations());
    let site = h.site().await;
    let page = h.page(site.id, "/pricing", 400, 380).await;
    h.enable_autopilot(site.id, 80, 1).await;
    let item = seed_item(&h, site.id, page.id, None, 95, false).await;
    let queue = h.orchestrator.queue();

    h.publisher.fail_publishes(true);
    assert_matches!(queue.apply_now(item.id, None).await, Err(PipelineError::Publish(_)));
    assert_eq!(h.store.applied_count(site.id, today()).await.unwrap(), 0);
    assert_eq!(h.store.find_item(item.id).await.unwrap().unwrap().status, "pending");

    h.publisher.fail_publishes(false);
    assert_matches!(queue.apply_now(item.id, None).await, Ok(ApplyOutcome::Applied(_)));
    assert_eq!(h.store.applied_count(site.id, today()).await.unwrap(), 1);
}

#[tokio::test]
async fn concurrent_applies_never_exceed_the_cap() {
    let h = Harness::new(no_recommendations());
    let site = h.site().await;
    let settings = h.enable_autopilot(site.id, 80, 3).await;
    let mut items = Vec::new();
    for i in 0..8 {
        let page = h.page(site.id, &format!("/p-{i}"), 100, 100).await;
        items.push(seed_item(&h, site.id, page.id, None, 95, false).await);
    }

    let mut handles = Vec::new();
    for item in items {
        let queue = h.orchestrator.queue().clone();
        let settings = settings.clone();
        handles.push(tokio::spawn(async move { queue.auto_apply(&item, &settings).await }));
    }
    let mut applied = 0;
    for handle in handles {
        if let Ok(ApplyOutcome::Applied(_)) = handle.await.unwrap() {
            applied += 1;
        }
    }

    assert_eq!(applied, 3);
    assert_eq!(h.store.applied_count(site.id, today()).await.unwrap(), 3);
}

#[tokio::test]
async fn revert_requires_an_applied_item() {
    let h = Harness::new(no_recommendations());
    let site = h.site().await;
    let page = h.page(site.id, "/pricing", 400, 380).await;
    let settings = h.enable_autopilot(site.id, 80, 5).await;
    let item = seed_item(&h, site.id, page.id, None, 95, false).await;

    assert_matches!(
        h.orchestrator.queue().revert(&item, "manual", &settings).await,
        Err(PipelineError::Core(CoreError::InvalidTransition { .. }))
    );
    assert!(h.publisher.rolled_back().await.is_empty());
}

#[tokio::test]
async fn actions_on_missing_items_are_not_found() {
    let h = Harness::new(no_recommendations());
    let queue = h.orchestrator.queue();

    assert_matches!(
        queue.approve(404, None).await,
        Err(PipelineError::Core(CoreError::NotFound { entity: "QueueItem", .. }))
    );
    assert_matches!(
        queue.apply_now(404, None).await,
        Err(PipelineError::Core(CoreError::NotFound { .. }))
    );
}
