//! Read-back of optimization run records.

use autopilot_core::error::CoreError;
use autopilot_core::types::{DbId, SiteId};
use autopilot_db::models::run::RunListQuery;
use autopilot_db::repositories::{clamp_limit, clamp_offset};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/runs/{run_id}
pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let run = state
        .stores()
        .runs
        .find_run(run_id)
        .await?
        .ok_or_else(|| CoreError::not_found("OptimizationRun", run_id))?;
    Ok(Json(DataResponse { data: run }))
}

/// GET /api/v1/sites/{site_id}/runs
///
/// Most recent first.
pub async fn list_site_runs(
    State(state): State<AppState>,
    Path(site_id): Path<SiteId>,
    Query(params): Query<RunListQuery>,
) -> AppResult<impl IntoResponse> {
    let runs = state
        .stores()
        .runs
        .list_runs(site_id, clamp_limit(params.limit), clamp_offset(params.offset))
        .await?;
    Ok(Json(DataResponse { data: runs }))
}
