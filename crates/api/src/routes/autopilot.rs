//! Route definitions for autopilot settings and the review queue.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::autopilot;
use crate::state::AppState;

/// ```text
/// GET    /sites/{site_id}/autopilot/settings     -> get_settings
/// PUT    /sites/{site_id}/autopilot/settings     -> update_settings
/// GET    /sites/{site_id}/autopilot/queue        -> list_queue
/// POST   /autopilot/queue/{item_id}/approve      -> approve_item
/// POST   /autopilot/queue/{item_id}/reject       -> reject_item
/// POST   /autopilot/queue/{item_id}/apply        -> apply_item
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/sites/{site_id}/autopilot/settings",
            get(autopilot::get_settings).put(autopilot::update_settings),
        )
        .route("/sites/{site_id}/autopilot/queue", get(autopilot::list_queue))
        .route("/autopilot/queue/{item_id}/approve", post(autopilot::approve_item))
        .route("/autopilot/queue/{item_id}/reject", post(autopilot::reject_item))
        .route("/autopilot/queue/{item_id}/apply", post(autopilot::apply_item))
}
