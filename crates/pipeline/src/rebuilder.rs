//! Aggregation of an ad's active versions into a positioned mix.
//!
//! Each stream is fetched and converted independently. A stream whose read
//! fails contributes no tracks; the rebuild only fails when every stream
//! fails or the measured durations cannot be read.

use std::collections::BTreeMap;

use admix_core::error::CoreError;
use admix_core::mixer::{ActiveVersions, MixerState, MixerTrack};
use admix_core::store::{validate_ad_id, KvStore};
use admix_core::stream::StreamType;
use admix_core::timeline::calculate_timeline;
use admix_core::tracks::{expand_references, tracks_for_version};
use admix_core::types::{now_millis, VersionId};
use admix_db::repositories::{MixerRepo, VersionRepo};

/// What one stream adds to the mix.
#[derive(Debug, Default)]
struct StreamContribution {
    active_id: Option<VersionId>,
    tracks: Vec<MixerTrack>,
}

/// Rebuild and persist the mixer state for `ad_id`.
///
/// The previous state is replaced wholesale; `volumes` always starts empty.
pub async fn rebuild_mixer(store: &dyn KvStore, ad_id: &str) -> Result<MixerState, CoreError> {
    validate_ad_id(ad_id)?;
    let durations = MixerRepo::load_durations(store, ad_id).await?;

    let mut active = ActiveVersions::default();
    let mut tracks = Vec::new();
    let mut failed = Vec::new();

    for stream in StreamType::ALL {
        match fetch_stream(store, ad_id, stream).await {
            Ok(contribution) => {
                let slot = match stream {
                    StreamType::Voices => &mut active.voices,
                    StreamType::Music => &mut active.music,
                    StreamType::Sfx => &mut active.sfx,
                };
                *slot = contribution.active_id;
                tracks.extend(contribution.tracks);
            }
            Err(e) => {
                tracing::warn!(ad_id, %stream, error = %e, "Skipping stream in mixer rebuild");
                failed.push(stream);
            }
        }
    }

    if failed.len() == StreamType::ALL.len() {
        return Err(CoreError::StoreUnavailable(format!(
            "Could not read any stream of ad {ad_id}"
        )));
    }

    expand_references(&mut tracks, &active);
    let timeline = calculate_timeline(&tracks, &durations);

    let state = MixerState {
        tracks,
        calculated_tracks: timeline.tracks,
        total_duration: timeline.total_duration,
        volumes: BTreeMap::new(),
        active_versions: active,
        last_calculated: now_millis(),
    };
    MixerRepo::save(store, ad_id, &state).await?;

    tracing::info!(
        ad_id,
        tracks = state.tracks.len(),
        total_duration = state.total_duration,
        skipped_streams = failed.len(),
        "Mixer rebuilt"
    );
    Ok(state)
}

async fn fetch_stream(
    store: &dyn KvStore,
    ad_id: &str,
    stream: StreamType,
) -> Result<StreamContribution, CoreError> {
    let Some(version) = VersionRepo::find_active(store, ad_id, stream).await? else {
        return Ok(StreamContribution::default());
    };
    Ok(StreamContribution {
        tracks: tracks_for_version(&version),
        active_id: Some(version.id),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
