//! Version lifecycle operations that require a mixer rebuild.
//!
//! Every operation here takes the ad's lock, awaits its pointer or duration
//! write, and only then rebuilds, so a rebuild always observes the write it
//! is meant to reflect.

use std::sync::Arc;

use admix_core::error::CoreError;
use admix_core::mixer::{MeasuredDurations, MixerState};
use admix_core::store::{validate_ad_id, KvStore};
use admix_core::stream::StreamType;
use admix_core::version::Version;
use admix_db::repositories::{MixerRepo, VersionRepo};
use admix_events::{event_types, EventBus, MixerEvent};
use serde_json::json;

use crate::locks::AdLocks;
use crate::rebuilder::rebuild_mixer;

/// Result of activating a version.
#[derive(Debug, Clone)]
pub struct Activation {
    pub version: Version,
    pub mixer: MixerState,
}

/// Result of deleting a version. `mixer` is set only when the deleted
/// version was active and the mix had to be rebuilt.
#[derive(Debug, Clone)]
pub struct Deletion {
    pub was_active: bool,
    pub mixer: Option<MixerState>,
}

/// Sequences activation, deletion and rebuilds per ad.
#[derive(Clone)]
pub struct MixerPipeline {
    store: Arc<dyn KvStore>,
    events: Arc<EventBus>,
    locks: Arc<AdLocks>,
}

impl MixerPipeline {
    pub fn new(store: Arc<dyn KvStore>, events: Arc<EventBus>) -> Self {
        Self {
            store,
            events,
            locks: Arc::new(AdLocks::new()),
        }
    }

    /// Freeze a version, point its stream at it, then rebuild the mix.
    ///
    /// If the rebuild fails the activation stays in place; activating the
    /// same version again only re-runs the rebuild.
    pub async fn activate_and_rebuild(
        &self,
        ad_id: &str,
        stream: StreamType,
        version_id: &str,
    ) -> Result<Activation, CoreError> {
        validate_ad_id(ad_id)?;
        let _guard = self.locks.lock(ad_id).await;

        let version =
            VersionRepo::freeze_or_activate(self.store.as_ref(), ad_id, stream, version_id).await?;
        self.events.publish(
            MixerEvent::new(event_types::VERSION_ACTIVATED, ad_id)
                .with_stream(stream)
                .with_version(version.id.clone())
                .with_payload(json!({ "version_number": version.version_number })),
        );

        let mixer = self.rebuild_locked(ad_id).await?;
        Ok(Activation { version, mixer })
    }

    /// Delete a version and rebuild the mix if it was the active one.
    pub async fn delete_and_rebuild(
        &self,
        ad_id: &str,
        stream: StreamType,
        version_id: &str,
    ) -> Result<Deletion, CoreError> {
        validate_ad_id(ad_id)?;
        let _guard = self.locks.lock(ad_id).await;

        let was_active = VersionRepo::delete(self.store.as_ref(), ad_id, stream, version_id).await?;
        self.events.publish(
            MixerEvent::new(event_types::VERSION_DELETED, ad_id)
                .with_stream(stream)
                .with_version(version_id)
                .with_payload(json!({ "was_active": was_active })),
        );

        let mixer = if was_active {
            Some(self.rebuild_locked(ad_id).await?)
        } else {
            None
        };
        Ok(Deletion { was_active, mixer })
    }

    /// Rebuild the mix on demand.
    pub async fn rebuild(&self, ad_id: &str) -> Result<MixerState, CoreError> {
        validate_ad_id(ad_id)?;
        let _guard = self.locks.lock(ad_id).await;
        self.rebuild_locked(ad_id).await
    }

    /// Merge measured durations reported by a playback client, then rebuild.
    pub async fn report_durations(
        &self,
        ad_id: &str,
        reported: &MeasuredDurations,
    ) -> Result<MixerState, CoreError> {
        validate_ad_id(ad_id)?;
        let _guard = self.locks.lock(ad_id).await;

        MixerRepo::record_durations(self.store.as_ref(), ad_id, reported).await?;
        self.events.publish(
            MixerEvent::new(event_types::MIXER_DURATION_REPORTED, ad_id)
                .with_payload(json!({ "track_ids": reported.keys().collect::<Vec<_>>() })),
        );

        self.rebuild_locked(ad_id).await
    }

    /// The last persisted mixer state.
    pub async fn get_mixer_state(&self, ad_id: &str) -> Result<MixerState, CoreError> {
        MixerRepo::find(self.store.as_ref(), ad_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "MixerState",
                id: ad_id.to_string(),
            })
    }

    /// Caller must hold the ad's lock.
    async fn rebuild_locked(&self, ad_id: &str) -> Result<MixerState, CoreError> {
        let state = rebuild_mixer(self.store.as_ref(), ad_id).await.map_err(|e| {
            tracing::error!(ad_id, error = %e, "Mixer rebuild failed");
            e
        })?;
        self.events.publish(
            MixerEvent::new(event_types::MIXER_REBUILT, ad_id).with_payload(json!({
                "tracks": state.tracks.len(),
                "total_duration": state.total_duration,
            })),
        );
        Ok(state)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
