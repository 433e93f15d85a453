//! Autopilot settings and queue administration.

use autopilot_core::error::CoreError;
use autopilot_core::queue::QueueStatus;
use autopilot_core::types::{DbId, SiteId};
use autopilot_db::models::autopilot::{QueueListQuery, ReviewRequest, UpdateAutopilotSettings};
use autopilot_db::repositories::{clamp_limit, clamp_offset};
use autopilot_pipeline::ApplyOutcome;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::extract::AppJson;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// GET /api/v1/sites/{site_id}/autopilot/settings
///
/// Creates the default settings row on first read.
pub async fn get_settings(
    State(state): State<AppState>,
    Path(site_id): Path<SiteId>,
) -> AppResult<impl IntoResponse> {
    let settings = state.stores().settings.get_or_create(site_id).await?;
    Ok(Json(DataResponse { data: settings }))
}

/// PUT /api/v1/sites/{site_id}/autopilot/settings
pub async fn update_settings(
    State(state): State<AppState>,
    Path(site_id): Path<SiteId>,
    AppJson(input): AppJson<UpdateAutopilotSettings>,
) -> AppResult<impl IntoResponse> {
    let current = state.stores().settings.get_or_create(site_id).await?;
    let next = current.merged(&input)?;
    let saved = state.stores().settings.update(&next).await?;

    tracing::info!(
        site_id = %site_id,
        enabled = saved.enabled,
        confidence_threshold = saved.confidence_threshold,
        max_daily_changes = saved.max_daily_changes,
        "Autopilot settings updated"
    );

    Ok(Json(DataResponse { data: saved }))
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// GET /api/v1/sites/{site_id}/autopilot/queue
pub async fn list_queue(
    State(state): State<AppState>,
    Path(site_id): Path<SiteId>,
    Query(params): Query<QueueListQuery>,
) -> AppResult<impl IntoResponse> {
    let status = params.status.as_deref().map(QueueStatus::parse).transpose()?;
    let items = state
        .stores()
        .queue
        .list_items(
            site_id,
            status,
            clamp_limit(params.limit),
            clamp_offset(params.offset),
        )
        .await?;
    Ok(Json(DataResponse { data: items }))
}

/// POST /api/v1/autopilot/queue/{item_id}/approve
pub async fn approve_item(
    State(state): State<AppState>,
    Path(item_id): Path<DbId>,
    AppJson(input): AppJson<ReviewRequest>,
) -> AppResult<impl IntoResponse> {
    let item = state
        .orchestrator
        .queue()
        .approve(item_id, input.reviewed_by.as_deref())
        .await?;
    Ok(Json(DataResponse { data: item }))
}

/// POST /api/v1/autopilot/queue/{item_id}/reject
pub async fn reject_item(
    State(state): State<AppState>,
    Path(item_id): Path<DbId>,
    AppJson(input): AppJson<ReviewRequest>,
) -> AppResult<impl IntoResponse> {
    let item = state
        .orchestrator
        .queue()
        .reject(item_id, input.reviewed_by.as_deref())
        .await?;
    Ok(Json(DataResponse { data: item }))
}

/// POST /api/v1/autopilot/queue/{item_id}/apply
///
/// Apply now, skipping the confidence and traffic gates. The daily cap still
/// holds; hitting it answers `409`.
pub async fn apply_item(
    State(state): State<AppState>,
    Path(item_id): Path<DbId>,
    AppJson(input): AppJson<ReviewRequest>,
) -> AppResult<impl IntoResponse> {
    let outcome = state
        .orchestrator
        .queue()
        .apply_now(item_id, input.reviewed_by.as_deref())
        .await?;

    match outcome {
        ApplyOutcome::Applied(item) => Ok(Json(DataResponse { data: item })),
        ApplyOutcome::Deferred(reason) => {
            tracing::info!(item_id, %reason, "Manual apply deferred");
            Err(CoreError::Conflict(format!("Queue item {item_id} not applied: {reason}")).into())
        }
    }
}
