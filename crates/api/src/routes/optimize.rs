use axum::routing::post;
use axum::Router;

use crate::handlers::optimize;
use crate::state::AppState;

/// Run trigger, mounted at root level.
///
/// ```text
/// POST   /optimize          -> trigger_optimization
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/optimize", post(optimize::trigger_optimization))
}
