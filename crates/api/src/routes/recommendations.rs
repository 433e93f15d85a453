use axum::routing::{get, post};
use axum::Router;

use crate::handlers::recommendations;
use crate::state::AppState;

/// ```text
/// GET    /sites/{site_id}/recommendations    -> list_recommendations
/// POST   /recommendations/{id}/dismiss       -> dismiss_recommendation
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/sites/{site_id}/recommendations",
            get(recommendations::list_recommendations),
        )
        .route(
            "/recommendations/{id}/dismiss",
            post(recommendations::dismiss_recommendation),
        )
}
