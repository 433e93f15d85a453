pub mod alerts;
pub mod autopilot;
pub mod health;
pub mod optimize;
pub mod recommendations;
pub mod runs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /runs/{run_id}                                   run record
/// /sites/{site_id}/runs                            recent runs
///
/// /sites/{site_id}/autopilot/settings              get, update
/// /sites/{site_id}/autopilot/queue                 list queue items
/// /autopilot/queue/{item_id}/approve               approve (POST)
/// /autopilot/queue/{item_id}/reject                reject (POST)
/// /autopilot/queue/{item_id}/apply                 apply now (POST)
///
/// /sites/{site_id}/recommendations                 list
/// /recommendations/{id}/dismiss                    dismiss (POST)
///
/// /sites/{site_id}/alerts                          active alerts
/// /alerts/{alert_id}/resolve                       resolve (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(runs::router())
        .merge(autopilot::router())
        .merge(recommendations::router())
        .merge(alerts::router())
}
