//! Handlers for the per-stream `/versions` resource.
//!
//! Versions are nested under ads and streams:
//! `/ads/{ad_id}/{stream}/versions[/{id}]`

use admix_core::error::CoreError;
use admix_core::mixer::MixerState;
use admix_core::stream::StreamType;
use admix_core::types::VersionId;
use admix_core::version::Version;
use admix_db::models::version::{CloneVersion, CreateVersion, UpdateVersion};
use admix_db::repositories::VersionRepo;
use admix_events::{event_types, MixerEvent};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::response::DataResponse;
use crate::state::AppState;

/// Response body for a successful activation.
#[derive(Debug, Serialize)]
pub struct ActivationResponse {
    pub version: Version,
    pub mixer: MixerState,
}

/// Response body for a delete. `mixer` is present when the active version
/// was removed and the mix was rebuilt.
#[derive(Debug, Serialize)]
pub struct DeletionResponse {
    pub id: VersionId,
    pub was_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mixer: Option<MixerState>,
}

fn parse_stream(raw: &str) -> AppResult<StreamType> {
    Ok(StreamType::parse(raw)?)
}

/// GET /api/v1/ads/{ad_id}/{stream}/versions
///
/// List all versions of a stream, newest version number first.
pub async fn list(
    State(state): State<AppState>,
    Path((ad_id, stream)): Path<(String, String)>,
) -> AppResult<Json<DataResponse<Vec<Version>>>> {
    let stream = parse_stream(&stream)?;
    let versions = VersionRepo::list(state.store.as_ref(), &ad_id, stream).await?;
    Ok(Json(DataResponse { data: versions }))
}

/// POST /api/v1/ads/{ad_id}/{stream}/versions
pub async fn create(
    State(state): State<AppState>,
    Path((ad_id, stream)): Path<(String, String)>,
    AppJson(input): AppJson<CreateVersion>,
) -> AppResult<(StatusCode, Json<DataResponse<Version>>)> {
    let stream = parse_stream(&stream)?;
    let version = VersionRepo::create(state.store.as_ref(), &ad_id, stream, &input).await?;

    state.event_bus.publish(
        MixerEvent::new(event_types::VERSION_CREATED, &ad_id)
            .with_stream(stream)
            .with_version(version.id.clone())
            .with_payload(json!({
                "version_number": version.version_number,
                "created_by": version.created_by,
            })),
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: version })))
}

/// GET /api/v1/ads/{ad_id}/{stream}/versions/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path((ad_id, stream, id)): Path<(String, String, String)>,
) -> AppResult<Json<DataResponse<Version>>> {
    let stream = parse_stream(&stream)?;
    let version = VersionRepo::find_by_id(state.store.as_ref(), &ad_id, stream, &id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Version",
            id,
        }))?;
    Ok(Json(DataResponse { data: version }))
}

/// PATCH /api/v1/ads/{ad_id}/{stream}/versions/{id}
///
/// Partially update a draft. Returns 409 if the version is frozen.
pub async fn update(
    State(state): State<AppState>,
    Path((ad_id, stream, id)): Path<(String, String, String)>,
    AppJson(input): AppJson<UpdateVersion>,
) -> AppResult<Json<DataResponse<Version>>> {
    let stream = parse_stream(&stream)?;
    let version =
        VersionRepo::update(state.store.as_ref(), &ad_id, stream, &id, input.payload).await?;

    state.event_bus.publish(
        MixerEvent::new(event_types::VERSION_UPDATED, &ad_id)
            .with_stream(stream)
            .with_version(id),
    );
    Ok(Json(DataResponse { data: version }))
}

/// DELETE /api/v1/ads/{ad_id}/{stream}/versions/{id}
///
/// Deleting the active version clears the pointer and rebuilds the mix.
pub async fn delete(
    State(state): State<AppState>,
    Path((ad_id, stream, id)): Path<(String, String, String)>,
) -> AppResult<Json<DataResponse<DeletionResponse>>> {
    let stream = parse_stream(&stream)?;
    let deletion = state.pipeline.delete_and_rebuild(&ad_id, stream, &id).await?;
    Ok(Json(DataResponse {
        data: DeletionResponse {
            id,
            was_active: deletion.was_active,
            mixer: deletion.mixer,
        },
    }))
}

/// POST /api/v1/ads/{ad_id}/{stream}/versions/{id}/activate
///
/// Freeze the version, make it active and rebuild the mix. Returns 422 with
/// the number of missing items when a voice version is incomplete.
pub async fn activate(
    State(state): State<AppState>,
    Path((ad_id, stream, id)): Path<(String, String, String)>,
) -> AppResult<Json<DataResponse<ActivationResponse>>> {
    let stream = parse_stream(&stream)?;
    let activation = state.pipeline.activate_and_rebuild(&ad_id, stream, &id).await?;
    Ok(Json(DataResponse {
        data: ActivationResponse {
            version: activation.version,
            mixer: activation.mixer,
        },
    }))
}

/// POST /api/v1/ads/{ad_id}/{stream}/versions/{id}/clone
pub async fn clone(
    State(state): State<AppState>,
    Path((ad_id, stream, id)): Path<(String, String, String)>,
    AppJson(input): AppJson<CloneVersion>,
) -> AppResult<(StatusCode, Json<DataResponse<Version>>)> {
    let stream = parse_stream(&stream)?;
    let version =
        VersionRepo::clone_version(state.store.as_ref(), &ad_id, stream, &id, input.created_by)
            .await?;

    state.event_bus.publish(
        MixerEvent::new(event_types::VERSION_CLONED, &ad_id)
            .with_stream(stream)
            .with_version(version.id.clone())
            .with_payload(json!({ "source_version_id": id })),
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: version })))
}

/// GET /api/v1/ads/{ad_id}/{stream}/active
///
/// The active version, or `null` when the stream has none.
pub async fn get_active(
    State(state): State<AppState>,
    Path((ad_id, stream)): Path<(String, String)>,
) -> AppResult<Json<DataResponse<Option<Version>>>> {
    let stream = parse_stream(&stream)?;
    let version = VersionRepo::find_active(state.store.as_ref(), &ad_id, stream).await?;
    Ok(Json(DataResponse { data: version }))
}
