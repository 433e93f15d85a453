use std::sync::Arc;

use autopilot_pipeline::{Collaborators, Orchestrator};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Database pool, used by the health check. `None` when the engine runs
    /// over in-memory stores.
    pub pool: Option<autopilot_db::DbPool>,
    pub config: Arc<ServerConfig>,
    /// Run orchestrator; also owns the queue service and the store seams.
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn stores(&self) -> &Collaborators {
        self.orchestrator.stores()
    }
}
