//! Trigger endpoint for optimization runs.

use autopilot_core::run::RunMode;
use autopilot_core::types::{DbId, SiteId};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRequest {
    pub site_id: Option<String>,
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeResponse {
    pub success: bool,
    pub message: String,
    pub mode: RunMode,
    pub run_id: DbId,
}

/// POST /optimize
///
/// Start a run and return `202` immediately. The outcome is read back from
/// the run record.
pub async fn trigger_optimization(
    State(state): State<AppState>,
    AppJson(input): AppJson<OptimizeRequest>,
) -> AppResult<impl IntoResponse> {
    let site_id = match input.site_id.as_deref().map(str::trim) {
        None | Some("") => return Err(AppError::BadRequest("siteId is required".into())),
        Some(raw) => raw
            .parse::<SiteId>()
            .map_err(|_| AppError::BadRequest(format!("siteId '{raw}' is not a valid UUID")))?,
    };
    let mode = match input.mode.as_deref() {
        None => RunMode::Full,
        Some(raw) => RunMode::parse(raw)?,
    };

    let run = state.orchestrator.start_run(site_id, mode).await?;
    let run_id = run.id;
    state.orchestrator.spawn(run);

    Ok((
        StatusCode::ACCEPTED,
        Json(OptimizeResponse {
            success: true,
            message: format!("Optimization run {run_id} started"),
            mode,
            run_id,
        }),
    ))
}
