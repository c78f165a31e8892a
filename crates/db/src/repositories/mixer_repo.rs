//! Repository for the materialized mixer state and measured durations.

use admix_core::error::CoreError;
use admix_core::mixer::{MeasuredDurations, MixerState};
use admix_core::store::{get_record, keys, put_record, validate_ad_id, KvStore};

pub struct MixerRepo;

impl MixerRepo {
    /// The last persisted mixer state, if the ad was ever rebuilt.
    pub async fn find(store: &dyn KvStore, ad_id: &str) -> Result<Option<MixerState>, CoreError> {
        validate_ad_id(ad_id)?;
        Ok(get_record::<MixerState>(store, &keys::mixer(ad_id)).await?)
    }

    /// Replace the mixer state wholesale.
    pub async fn save(store: &dyn KvStore, ad_id: &str, state: &MixerState) -> Result<(), CoreError> {
        validate_ad_id(ad_id)?;
        put_record(store, &keys::mixer(ad_id), state).await?;
        Ok(())
    }

    /// Stored measured durations. Absent means none were reported yet.
    pub async fn load_durations(
        store: &dyn KvStore,
        ad_id: &str,
    ) -> Result<MeasuredDurations, CoreError> {
        validate_ad_id(ad_id)?;
        let durations = get_record::<MeasuredDurations>(store, &keys::durations(ad_id)).await?;
        Ok(durations.unwrap_or_default())
    }

    /// Merge newly reported durations into the stored map.
    ///
    /// Every value must be finite and positive; a single bad entry rejects
    /// the whole report before anything is written. Returns the merged map.
    pub async fn record_durations(
        store: &dyn KvStore,
        ad_id: &str,
        reported: &MeasuredDurations,
    ) -> Result<MeasuredDurations, CoreError> {
        validate_ad_id(ad_id)?;
        if let Some((track_id, secs)) = reported
            .iter()
            .find(|(id, secs)| id.is_empty() || !secs.is_finite() || **secs <= 0.0)
        {
            return Err(CoreError::MalformedInput(format!(
                "Invalid measured duration {secs} for track '{track_id}'"
            )));
        }

        let mut merged = Self::load_durations(store, ad_id).await?;
        merged.extend(reported.iter().map(|(id, secs)| (id.clone(), *secs)));
        put_record(store, &keys::durations(ad_id), &merged).await?;

        tracing::debug!(ad_id, reported = reported.len(), total = merged.len(), "Durations recorded");
        Ok(merged)
    }
}
