//! Run Orchestrator.
//!
//! A run is created in `running`, executes every module in
//! [`MODULE_ORDER`] sequentially and finishes as `completed` (even when
//! individual modules failed) or `error` (setup failed or the run exceeded
//! its time budget).

use std::sync::Arc;

use autopilot_core::error::CoreError;
use autopilot_core::run::{ModuleResult, ModuleResults, RunCounters, RunMode, MODULE_ORDER};
use autopilot_core::types::SiteId;
use autopilot_db::models::run::OptimizationRun;
use autopilot_events::bus::{AutopilotEvent, EVENT_RUN_COMPLETED, EVENT_RUN_FAILED};
use autopilot_events::EventBus;
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::EngineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::modules::{run_module, RunContext};
use crate::queue::QueueService;
use crate::store::Collaborators;

/// Error message recorded on runs that outlive `RUN_MAX_DURATION_SECS`.
pub const RUN_TIMEOUT_MESSAGE: &str = "run exceeded maximum duration";

pub struct Orchestrator {
    stores: Collaborators,
    queue: QueueService,
    events: Arc<EventBus>,
    config: EngineConfig,
}

impl Orchestrator {
    pub fn new(stores: Collaborators, events: Arc<EventBus>, config: EngineConfig) -> Self {
        let queue = QueueService::new(stores.clone(), Arc::clone(&events));
        Self {
            stores,
            queue,
            events,
            config,
        }
    }

    pub fn queue(&self) -> &QueueService {
        &self.queue
    }

    pub fn stores(&self) -> &Collaborators {
        &self.stores
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create a `running` run for `site_id`.
    ///
    /// Fails with [`PipelineError::RunInProgress`] when the site already has
    /// one. The site itself is resolved when the run executes.
    pub async fn start_run(&self, site_id: SiteId, mode: RunMode) -> PipelineResult<OptimizationRun> {
        let run = self
            .stores
            .runs
            .create_running(site_id, mode, Utc::now())
            .await?;
        tracing::info!(run_id = run.id, site_id = %site_id, mode = %mode, "Optimization run started");
        Ok(run)
    }

    /// Start a run and drive it to its terminal state.
    pub async fn run_to_completion(&self, site_id: SiteId, mode: RunMode) -> PipelineResult<OptimizationRun> {
        let run = self.start_run(site_id, mode).await?;
        self.execute(run).await
    }

    /// Execute `run` on a background task. Outcome is read back from the run
    /// record.
    pub fn spawn(self: &Arc<Self>, run: OptimizationRun) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let run_id = run.id;
            if let Err(e) = orchestrator.execute(run).await {
                tracing::error!(run_id, error = %e, "Failed to finalize optimization run");
            }
        })
    }

    /// Execute every module for a `running` run and persist the outcome.
    pub async fn execute(&self, run: OptimizationRun) -> PipelineResult<OptimizationRun> {
        let span = tracing::info_span!(
            "optimization_run",
            run_id = run.id,
            site_id = %run.site_id,
            mode = %run.mode,
        );
        self.execute_inner(run).instrument(span).await
    }

    async fn execute_inner(&self, run: OptimizationRun) -> PipelineResult<OptimizationRun> {
        let mut results = ModuleResults::new();
        let outcome = tokio::time::timeout(
            self.config.run_max_duration(),
            self.run_modules(&run, &mut results),
        )
        .await;

        let snapshot = serde_json::to_value(&results).unwrap_or_default();
        let now = Utc::now();

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(RUN_TIMEOUT_MESSAGE.to_string()),
        };

        match failure {
            None => {
                let counters = RunCounters::from_results(&results);
                let finished = self
                    .stores
                    .runs
                    .complete_run(run.id, &snapshot, counters, now)
                    .await?;
                if finished.is_none() {
                    tracing::warn!("Run was no longer running when it completed");
                }
                tracing::info!(
                    recommendations_generated = counters.recommendations_generated,
                    auto_applied = counters.auto_applied,
                    alerts_raised = counters.alerts_raised,
                    "Optimization run completed",
                );
                self.events.publish(
                    AutopilotEvent::new(EVENT_RUN_COMPLETED, run.site_id)
                        .with_source("run", run.id)
                        .with_payload(serde_json::json!({
                            "mode": run.mode,
                            "recommendationsGenerated": counters.recommendations_generated,
                            "autoApplied": counters.auto_applied,
                            "alertsRaised": counters.alerts_raised,
                        })),
                );
            }
            Some(message) => {
                let finished = self
                    .stores
                    .runs
                    .fail_run(run.id, &snapshot, &message, now)
                    .await?;
                if finished.is_none() {
                    tracing::warn!("Run was no longer running when it failed");
                }
                tracing::error!(error = %message, "Optimization run failed");
                self.events.publish(
                    AutopilotEvent::new(EVENT_RUN_FAILED, run.site_id)
                        .with_source("run", run.id)
                        .with_payload(serde_json::json!({
                            "mode": run.mode,
                            "error": message,
                        })),
                );
            }
        }

        self.stores
            .runs
            .find_run(run.id)
            .await?
            .ok_or_else(|| CoreError::not_found("OptimizationRun", run.id).into())
    }

    /// Load the site context once, then run each module in order.
    ///
    /// Only setup failures return `Err`; module failures are recorded in
    /// `results`.
    async fn run_modules(&self, run: &OptimizationRun, results: &mut ModuleResults) -> PipelineResult<()> {
        let mode = RunMode::parse(&run.mode)?;
        let site = self
            .stores
            .sites
            .find_site(run.site_id)
            .await?
            .ok_or(PipelineError::SiteNotFound(run.site_id))?;
        let knowledge = self.stores.knowledge.get_knowledge(site.id).await?;
        let pages = self.stores.metrics.page_metrics(site.id).await?;
        let settings = self.stores.settings.get_or_create(site.id).await?;

        tracing::debug!(pages = pages.len(), autopilot_enabled = settings.enabled, "Run context loaded");

        for &module in MODULE_ORDER {
            let result = {
                let ctx = RunContext {
                    run_id: run.id,
                    mode,
                    site: &site,
                    knowledge: knowledge.as_ref(),
                    pages: &pages,
                    settings: &settings,
                    results,
                    stores: &self.stores,
                    queue: &self.queue,
                    events: &self.events,
                    config: &self.config,
                    now: Utc::now(),
                };
                match run_module(module, &ctx).await {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::warn!(module, error = %e, "Module failed");
                        ModuleResult::error(e)
                    }
                }
            };
            tracing::debug!(module, ok = result.is_ok(), "Module finished");
            results.insert(module.to_string(), result);
        }
        Ok(())
    }
}
