use autopilot_core::alert::validate_resolvable;
use autopilot_core::error::CoreError;
use autopilot_core::types::{DbId, SiteId};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/sites/{site_id}/alerts
///
/// Active alerts only, newest first.
pub async fn list_active_alerts(
    State(state): State<AppState>,
    Path(site_id): Path<SiteId>,
) -> AppResult<impl IntoResponse> {
    let alerts = state.stores().alerts.list_active_alerts(site_id).await?;
    Ok(Json(DataResponse { data: alerts }))
}

/// POST /api/v1/alerts/{alert_id}/resolve
pub async fn resolve_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let stores = state.stores();
    let alert = stores
        .alerts
        .find_alert(alert_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Alert", alert_id))?;
    validate_resolvable(&alert.status)?;

    let resolved = stores
        .alerts
        .resolve_alert(alert_id, Utc::now())
        .await?
        .ok_or_else(|| CoreError::Conflict(format!("Alert {alert_id} is no longer active")))?;

    tracing::info!(alert_id, site_id = %resolved.site_id, "Alert resolved");
    Ok(Json(DataResponse { data: resolved }))
}
