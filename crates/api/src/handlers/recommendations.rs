use autopilot_core::error::CoreError;
use autopilot_core::recommendation::RecommendationStatus;
use autopilot_core::types::{DbId, SiteId};
use autopilot_db::models::recommendation::RecommendationListQuery;
use autopilot_db::repositories::{clamp_limit, clamp_offset};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/sites/{site_id}/recommendations
pub async fn list_recommendations(
    State(state): State<AppState>,
    Path(site_id): Path<SiteId>,
    Query(params): Query<RecommendationListQuery>,
) -> AppResult<impl IntoResponse> {
    let status = params
        .status
        .as_deref()
        .map(RecommendationStatus::parse)
        .transpose()?;
    let recs = state
        .stores()
        .recommendations
        .list_recommendations(
            site_id,
            status,
            clamp_limit(params.limit),
            clamp_offset(params.offset),
        )
        .await?;
    Ok(Json(DataResponse { data: recs }))
}

/// POST /api/v1/recommendations/{id}/dismiss
pub async fn dismiss_recommendation(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let stores = state.stores();
    let rec = stores
        .recommendations
        .find_recommendation(id)
        .await?
        .ok_or_else(|| CoreError::not_found("Recommendation", id))?;
    RecommendationStatus::parse(&rec.status)?.check_transition(RecommendationStatus::Dismissed)?;

    let dismissed = stores
        .recommendations
        .transition_recommendation(
            id,
            &[RecommendationStatus::Pending],
            RecommendationStatus::Dismissed,
        )
        .await?
        .ok_or_else(|| CoreError::Conflict(format!("Recommendation {id} changed while being dismissed")))?;

    tracing::info!(recommendation_id = id, site_id = %dismissed.site_id, "Recommendation dismissed");
    Ok(Json(DataResponse { data: dismissed }))
}
