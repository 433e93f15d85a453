//! Revert monitor and stale-run sweeper.

mod common;

use assert_matches::assert_matches;
use autopilot_core::run::RunMode;
use autopilot_core::types::SiteId;
use autopilot_db::models::autopilot::QueueItem;
use autopilot_events::bus::EVENT_CHANGE_REVERTED;
use autopilot_pipeline::monitor::RevertMonitor;
use autopilot_pipeline::orchestrator::RUN_TIMEOUT_MESSAGE;
use autopilot_pipeline::store::{QueueStore, RunStore};
use autopilot_pipeline::sweeper::StaleRunSweeper;
use autopilot_pipeline::{ApplyOutcome, EngineConfig};
use chrono::{Duration, Utc};

use common::{no_recommendations, seed_item, Harness};

fn monitor(h: &Harness) -> RevertMonitor {
    RevertMonitor::new(
        h.orchestrator.stores().clone(),
        h.orchestrator.queue().clone(),
        EngineConfig::default(),
    )
}

/// Apply a change on a page currently at `clicks` and return the applied item.
async fn applied_item(h: &Harness, site_id: SiteId, path: &str, clicks: i64) -> QueueItem {
    let page = h.page(site_id, path, clicks, clicks).await;
    let item = seed_item(h, site_id, page.id, None, 95, false).await;
    assert_matches!(
        h.orchestrator.queue().apply_now(item.id, None).await,
        Ok(ApplyOutcome::Applied(applied)) => applied
    )
}

#[tokio::test]
async fn drop_above_threshold_is_reverted() {
    let h = Harness::new(no_recommendations());
    let site = h.site().await;
    h.enable_autopilot(site.id, 80, 5).await;
    let item = applied_item(&h, site.id, "/pricing", 100).await;
    let mut rx = h.events.subscribe();

    h.store.set_page_clicks(item.page_id.unwrap(), 70).await;
    let reverted = monitor(&h).check_once(Utc::now()).await.unwrap();

    assert_eq!(reverted, 1);
    let item = h.store.find_item(item.id).await.unwrap().unwrap();
    assert_eq!(item.status, "reverted");
    assert!(item.reverted_at.is_some());
    assert!(item.revert_reason.as_deref().unwrap().contains("30.0%"));
    assert_eq!(h.publisher.rolled_back().await, vec![item.id]);
    assert_eq!(rx.try_recv().unwrap().event_type, EVENT_CHANGE_REVERTED);
}

#[tokio::test]
async fn drop_at_threshold_is_kept() {
    let h = Harness::new(no_recommendations());
    let site = h.site().await;
    h.enable_autopilot(site.id, 80, 5).await;
    let item = applied_item(&h, site.id, "/pricing", 100).await;

    h.store.set_page_clicks(item.page_id.unwrap(), 80).await;

    assert_eq!(monitor(&h).check_once(Utc::now()).await.unwrap(), 0);
    assert_eq!(h.store.find_item(item.id).await.unwrap().unwrap().status, "applied");
}

#[tokio::test]
async fn zero_baseline_is_never_reverted() {
    let h = Harness::new(no_recommendations());
    let site = h.site().await;
    h.enable_autopilot(site.id, 80, 5).await;
    let item = applied_item(&h, site.id, "/new-page", 0).await;
    assert_eq!(item.baseline_clicks, Some(0));

    assert_eq!(monitor(&h).check_once(Utc::now()).await.unwrap(), 0);
    assert!(h.publisher.rolled_back().await.is_empty());
}

#[tokio::test]
async fn items_outside_the_observation_window_are_left_applied() {
    let h = Harness::new(no_recommendations());
    let site = h.site().await;
    h.enable_autopilot(site.id, 80, 5).await;
    let item = applied_item(&h, site.id, "/pricing", 100).await;

    h.store.set_page_clicks(item.page_id.unwrap(), 10).await;
    h.store
        .backdate_applied(item.id, Utc::now() - Duration::days(15))
        .await;

    assert_eq!(monitor(&h).check_once(Utc::now()).await.unwrap(), 0);
    assert_eq!(h.store.find_item(item.id).await.unwrap().unwrap().status, "applied");
}

#[tokio::test]
async fn revert_uses_each_sites_threshold() {
    let h = Harness::new(no_recommendations());
    let strict = h.site().await;
    let lenient = h.store.add_site("Lenient", "lenient.test").await;
    h.enable_autopilot(strict.id, 80, 5).await;
    let mut settings = h.enable_autopilot(lenient.id, 80, 5).await;
    settings.auto_revert_threshold = 50.0;
    h.store.put_settings(settings).await;

    let a = applied_item(&h, strict.id, "/a", 100).await;
    let b = applied_item(&h, lenient.id, "/b", 100).await;
    h.store.set_page_clicks(a.page_id.unwrap(), 60).await;
    h.store.set_page_clicks(b.page_id.unwrap(), 60).await;

    assert_eq!(monitor(&h).check_once(Utc::now()).await.unwrap(), 1);
    assert_eq!(h.store.find_item(a.id).await.unwrap().unwrap().status, "reverted");
    assert_eq!(h.store.find_item(b.id).await.unwrap().unwrap().status, "applied");
}

#[tokio::test]
async fn sweeper_fails_runs_past_the_budget() {
    let h = Harness::new(no_recommendations());
    let stale_site = h.site().await;
    let busy_site = h.store.add_site("Busy", "busy.test").await;
    let sweeper = StaleRunSweeper::new(h.orchestrator.stores().runs.clone(), EngineConfig::default());

    let stale = h.orchestrator.start_run(stale_site.id, RunMode::Full).await.unwrap();
    let fresh = h.orchestrator.start_run(busy_site.id, RunMode::Full).await.unwrap();
    h.store
        .backdate_run(stale.id, Utc::now() - Duration::seconds(900))
        .await;

    let swept = sweeper.sweep_once(Utc::now()).await.unwrap();

    assert_eq!(swept, vec![stale.id]);
    let stale = h.store.find_run(stale.id).await.unwrap().unwrap();
    assert_eq!(stale.status, "error");
    assert_eq!(stale.error_message.as_deref(), Some(RUN_TIMEOUT_MESSAGE));
    assert_eq!(h.store.find_run(fresh.id).await.unwrap().unwrap().status, "running");

    // The site is no longer wedged.
    assert!(h.orchestrator.start_run(stale_site.id, RunMode::Quick).await.is_ok());
}

#[tokio::test]
async fn background_loops_stop_on_cancel() {
    let h = Harness::new(no_recommendations());
    let cancel = tokio_util::sync::CancellationToken::new();

    let monitor_task = tokio::spawn(monitor(&h).run(cancel.clone()));
    let sweeper = StaleRunSweeper::new(h.orchestrator.stores().runs.clone(), EngineConfig::default());
    let sweeper_task = tokio::spawn(sweeper.run(cancel.clone()));

    cancel.cancel();
    monitor_task.await.unwrap();
    sweeper_task.await.unwrap();
}
