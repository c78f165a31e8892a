//! Handlers for the `/ads/{ad_id}/mixer` resource.

use admix_core::mixer::MixerState;
use admix_db::models::mixer::ReportDurations;
use axum::extract::{Path, State};
use axum::Json;

use crate::error::AppResult;
use crate::extract::AppJson;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/ads/{ad_id}/mixer
///
/// Returns 404 until the mix has been built at least once.
pub async fn get_state(
    State(state): State<AppState>,
    Path(ad_id): Path<String>,
) -> AppResult<Json<DataResponse<MixerState>>> {
    let mixer = state.pipeline.get_mixer_state(&ad_id).await?;
    Ok(Json(DataResponse { data: mixer }))
}

/// POST /api/v1/ads/{ad_id}/mixer/rebuild
pub async fn rebuild(
    State(state): State<AppState>,
    Path(ad_id): Path<String>,
) -> AppResult<Json<DataResponse<MixerState>>> {
    let mixer = state.pipeline.rebuild(&ad_id).await?;
    Ok(Json(DataResponse { data: mixer }))
}

/// POST /api/v1/ads/{ad_id}/mixer/durations
///
/// Merge measured durations (`{ "durations": { track_id: seconds } }`) and
/// rebuild the mix with them.
pub async fn report_durations(
    State(state): State<AppState>,
    Path(ad_id): Path<String>,
    AppJson(input): AppJson<ReportDurations>,
) -> AppResult<Json<DataResponse<MixerState>>> {
    let mixer = state.pipeline.report_durations(&ad_id, &input.durations).await?;
    Ok(Json(DataResponse { data: mixer }))
}
