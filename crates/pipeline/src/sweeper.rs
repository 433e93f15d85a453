//! Fails runs left `running` past the run budget, e.g. after a crash.

use std::sync::Arc;
use std::time::Duration;

use autopilot_core::types::{DbId, Timestamp};
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::PipelineResult;
use crate::orchestrator::RUN_TIMEOUT_MESSAGE;
use crate::store::RunStore;

pub struct StaleRunSweeper {
    runs: Arc<dyn RunStore>,
    config: EngineConfig,
}

impl StaleRunSweeper {
    pub fn new(runs: Arc<dyn RunStore>, config: EngineConfig) -> Self {
        Self { runs, config }
    }

    pub async fn sweep_once(&self, now: Timestamp) -> PipelineResult<Vec<DbId>> {
        let max_age = chrono::Duration::seconds(self.config.run_max_duration_secs as i64);
        self.runs
            .fail_stale(now - max_age, RUN_TIMEOUT_MESSAGE, now)
            .await
    }

    pub async fn run(self, cancel: CancellationToken) {
        let period = Duration::from_secs(self.config.stale_run_sweep_interval_secs);
        tracing::info!(interval_secs = period.as_secs(), "Stale run sweeper started");

        let mut interval = tokio::time::interval(period);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Stale run sweeper stopping");
                    break;
                }
                _ = interval.tick() => {
                    match self.sweep_once(Utc::now()).await {
                        Ok(ids) if ids.is_empty() => tracing::debug!("Stale run sweeper: no stale runs"),
                        Ok(ids) => tracing::warn!(count = ids.len(), ?ids, "Stale runs marked as error"),
                        Err(e) => tracing::error!(error = %e, "Stale run sweep failed"),
                    }
                }
            }
        }
    }
}
