use axum::routing::{get, post};
use axum::Router;

use crate::handlers::alerts;
use crate::state::AppState;

/// ```text
/// GET    /sites/{site_id}/alerts        -> list_active_alerts
/// POST   /alerts/{alert_id}/resolve     -> resolve_alert
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sites/{site_id}/alerts", get(alerts::list_active_alerts))
        .route("/alerts/{alert_id}/resolve", post(alerts::resolve_alert))
}
