//! Auto-revert monitor.
//!
//! Periodically compares the current 28-day clicks of pages with recently
//! applied changes against the baseline recorded at apply time and reverts
//! changes whose drop exceeds the site's `auto_revert_threshold`.

use std::collections::HashMap;

use autopilot_core::autopilot::should_revert;
use autopilot_core::types::{SiteId, Timestamp};
use autopilot_db::models::autopilot::{AutopilotSettings, QueueItem};
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::PipelineResult;
use crate::queue::QueueService;
use crate::store::Collaborators;

pub struct RevertMonitor {
    stores: Collaborators,
    queue: QueueService,
    config: EngineConfig,
}

impl RevertMonitor {
    pub fn new(stores: Collaborators, queue: QueueService, config: EngineConfig) -> Self {
        Self {
            stores,
            queue,
            config,
        }
    }

    /// Inspect applied items inside the observation window once. Returns the
    /// number of items reverted.
    pub async fn check_once(&self, now: Timestamp) -> PipelineResult<usize> {
        let cutoff = now - chrono::Duration::days(self.config.revert_observation_days);
        let items = self.stores.queue.list_applied_since(cutoff).await?;

        let mut settings_by_site: HashMap<SiteId, AutopilotSettings> = HashMap::new();
        let mut reverted = 0;

        for item in items {
            let settings = match settings_by_site.get(&item.site_id) {
                Some(s) => s.clone(),
                None => {
                    let s = self.stores.settings.get_or_create(item.site_id).await?;
                    settings_by_site.insert(item.site_id, s.clone());
                    s
                }
            };

            match self.check_item(&item, &settings).await {
                Ok(true) => reverted += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(item_id = item.id, error = %e, "Revert check failed");
                }
            }
        }

        Ok(reverted)
    }

    async fn check_item(&self, item: &QueueItem, settings: &AutopilotSettings) -> PipelineResult<bool> {
        let baseline = item.baseline_clicks.unwrap_or(0);
        let Some(page_id) = item.page_id else {
            return Ok(false);
        };
        let Some(page) = self.stores.metrics.find_page(page_id).await? else {
            return Ok(false);
        };

        let threshold = settings.auto_revert_threshold;
        if !should_revert(baseline, page.clicks_28d, threshold) {
            return Ok(false);
        }

        let drop_percent = (baseline - page.clicks_28d) as f64 / baseline as f64 * 100.0;
        let reason = format!(
            "Clicks dropped {drop_percent:.1}% (from {baseline} to {}), above the {threshold}% revert threshold",
            page.clicks_28d
        );
        Ok(self.queue.revert(item, &reason, settings).await?.is_some())
    }

    /// Run the check loop until `cancel` is triggered.
    pub async fn run(self, cancel: CancellationToken) {
        let period = std::time::Duration::from_secs(self.config.revert_check_interval_secs);
        tracing::info!(
            interval_secs = period.as_secs(),
            observation_days = self.config.revert_observation_days,
            "Revert monitor started"
        );

        let mut interval = tokio::time::interval(period);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Revert monitor stopping");
                    break;
                }
                _ = interval.tick() => {
                    match self.check_once(Utc::now()).await {
                        Ok(0) => tracing::debug!("Revert monitor: nothing to revert"),
                        Ok(reverted) => tracing::info!(reverted, "Revert monitor: changes reverted"),
                        Err(e) => tracing::error!(error = %e, "Revert monitor: check failed"),
                    }
                }
            }
        }
    }
}
