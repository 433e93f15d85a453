//! The analysis and action modules of an optimization run.
//!
//! Each module reads the shared [`RunContext`] and returns a
//! [`ModuleResult`]. An `Err` is caught by the orchestrator and recorded as
//! that module's error; it never aborts the run.

pub mod alerts;
pub mod autopilot;
pub mod decay;
pub mod freshness;
pub mod ranking;
pub mod recommendations;

use autopilot_core::run::{
    ModuleResult, ModuleResults, RunMode, MODULE_ALERTS, MODULE_AUTOPILOT, MODULE_DECAY,
    MODULE_FRESHNESS, MODULE_RANKING, MODULE_RECOMMENDATIONS,
};
use autopilot_core::types::{DbId, Timestamp};
use autopilot_db::models::autopilot::AutopilotSettings;
use autopilot_db::models::site::{Site, SiteKnowledge, SitePage};
use autopilot_events::EventBus;

use crate::config::EngineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::queue::QueueService;
use crate::store::Collaborators;

/// Read-only view of a run handed to every module.
///
/// Site, knowledge, pages and settings are loaded once before the first
/// module runs. `results` holds the outcomes of the modules that ran earlier.
pub struct RunContext<'a> {
    pub run_id: DbId,
    pub mode: RunMode,
    pub site: &'a Site,
    pub knowledge: Option<&'a SiteKnowledge>,
    /// Busiest pages first.
    pub pages: &'a [SitePage],
    pub settings: &'a AutopilotSettings,
    pub results: &'a ModuleResults,
    pub stores: &'a Collaborators,
    pub queue: &'a QueueService,
    pub events: &'a EventBus,
    pub config: &'a EngineConfig,
    pub now: Timestamp,
}

/// Run one module by name.
pub async fn run_module(module: &'static str, ctx: &RunContext<'_>) -> PipelineResult<ModuleResult> {
    match module {
        MODULE_FRESHNESS => freshness::run(ctx).await,
        MODULE_RANKING => ranking::run(ctx).await,
        MODULE_RECOMMENDATIONS => recommendations::run(ctx).await,
        MODULE_DECAY => decay::run(ctx).await,
        MODULE_ALERTS => alerts::run(ctx).await,
        MODULE_AUTOPILOT => autopilot::run(ctx).await,
        other => Err(PipelineError::module(module, format!("unknown module '{other}'"))),
    }
}
