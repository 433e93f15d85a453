use axum::routing::get;
use axum::Router;

use crate::handlers::runs;
use crate::state::AppState;

/// ```text
/// GET    /runs/{run_id}             -> get_run
/// GET    /sites/{site_id}/runs      -> list_site_runs
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/runs/{run_id}", get(runs::get_run))
        .route("/sites/{site_id}/runs", get(runs::list_site_runs))
}
