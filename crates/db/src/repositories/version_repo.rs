//! Repository for per-stream content versions and active pointers.
//!
//! The store offers per-key atomicity only. Operations that touch more than
//! one key (activate, delete) order their writes so that a crash between
//! them never leaves a pointer referencing a missing version.

use admix_core::error::CoreError;
use admix_core::store::{get_record, keys, put_record, validate_ad_id, KvStore};
use admix_core::stream::StreamType;
use admix_core::types::VersionId;
use admix_core::version::{CreatedBy, PayloadPatch, Version, VersionStatus};

use crate::models::version::CreateVersion;

/// Provides CRUD and activation operations for content versions.
pub struct VersionRepo;

impl VersionRepo {
    // ── Standard CRUD ────────────────────────────────────────────────

    /// Insert a new draft, auto-assigning the next version number.
    ///
    /// The payload must belong to `stream` and pass shape validation. If a
    /// parent is named it must exist in the same stream.
    pub async fn create(
        store: &dyn KvStore,
        ad_id: &str,
        stream: StreamType,
        input: &CreateVersion,
    ) -> Result<Version, CoreError> {
        validate_ad_id(ad_id)?;
        input.payload.ensure_stream(stream)?;
        input.payload.validate_shape()?;
        if let Some(parent_id) = &input.parent_version_id {
            Self::require(store, ad_id, stream, parent_id).await?;
        }

        let number = Self::next_version_number(store, ad_id, stream).await?;
        let version = Version::new_draft(
            number,
            input.payload.clone(),
            input.created_by,
            input.parent_version_id.clone(),
        );
        put_record(store, &keys::version(ad_id, stream, &version.id), &version).await?;

        tracing::debug!(
            ad_id,
            %stream,
            version_id = %version.id,
            version_number = version.version_number,
            "Version draft created"
        );
        Ok(version)
    }

    /// Find a version by id.
    pub async fn find_by_id(
        store: &dyn KvStore,
        ad_id: &str,
        stream: StreamType,
        version_id: &str,
    ) -> Result<Option<Version>, CoreError> {
        validate_ad_id(ad_id)?;
        let version = get_record::<Version>(store, &keys::version(ad_id, stream, version_id)).await?;
        Ok(version)
    }

    /// List every version of a stream, newest version number first.
    pub async fn list(
        store: &dyn KvStore,
        ad_id: &str,
        stream: StreamType,
    ) -> Result<Vec<Version>, CoreError> {
        validate_ad_id(ad_id)?;
        let mut versions = Vec::new();
        for key in store.list_keys(&keys::version_prefix(ad_id, stream)).await? {
            // A key may vanish between listing and reading.
            if let Some(version) = get_record::<Version>(store, &key).await? {
                versions.push(version);
            }
        }
        versions.sort_by(|a, b| {
            b.version_number
                .cmp(&a.version_number)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(versions)
    }

    /// Apply a partial payload update to a draft.
    ///
    /// Frozen versions are immutable. Provenance fields are never touched.
    pub async fn update(
        store: &dyn KvStore,
        ad_id: &str,
        stream: StreamType,
        version_id: &str,
        patch: PayloadPatch,
    ) -> Result<Version, CoreError> {
        validate_ad_id(ad_id)?;
        let mut version = Self::require(store, ad_id, stream, version_id).await?;
        if !version.is_draft() {
            return Err(CoreError::InvalidState(format!(
                "Version {version_id} is frozen and cannot be edited"
            )));
        }

        version.payload = patch.apply(&version.payload)?;
        put_record(store, &keys::version(ad_id, stream, version_id), &version).await?;

        tracing::debug!(ad_id, %stream, version_id, "Version draft updated");
        Ok(version)
    }

    /// Delete a version. Returns `true` if it was the active one.
    ///
    /// The pointer is cleared before the record is removed.
    pub async fn delete(
        store: &dyn KvStore,
        ad_id: &str,
        stream: StreamType,
        version_id: &str,
    ) -> Result<bool, CoreError> {
        validate_ad_id(ad_id)?;
        Self::require(store, ad_id, stream, version_id).await?;

        let was_active =
            Self::get_active_id(store, ad_id, stream).await?.as_deref() == Some(version_id);
        if was_active {
            Self::clear_active(store, ad_id, stream).await?;
        }
        store.delete(&keys::version(ad_id, stream, version_id)).await?;

        tracing::info!(ad_id, %stream, version_id, was_active, "Version deleted");
        Ok(was_active)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Freeze a version and make it the active one for its stream.
    ///
    /// Voice versions must have generated audio for every line. Activating
    /// an already frozen version only moves the pointer.
    pub async fn freeze_or_activate(
        store: &dyn KvStore,
        ad_id: &str,
        stream: StreamType,
        version_id: &str,
    ) -> Result<Version, CoreError> {
        validate_ad_id(ad_id)?;
        let mut version = Self::require(store, ad_id, stream, version_id).await?;
        version.ensure_activatable()?;

        let was_draft = version.is_draft();
        if was_draft {
            version.status = VersionStatus::Frozen;
            put_record(store, &keys::version(ad_id, stream, version_id), &version).await?;
        }
        if let Err(e) = put_record(store, &keys::active(ad_id, stream), &version.id).await {
            if was_draft {
                version.status = VersionStatus::Draft;
                if let Err(rollback) =
                    put_record(store, &keys::version(ad_id, stream, version_id), &version).await
                {
                    tracing::error!(
                        ad_id,
                        %stream,
                        version_id,
                        error = %rollback,
                        "Failed to restore draft after pointer write failed"
                    );
                }
            }
            return Err(e.into());
        }

        tracing::info!(
            ad_id,
            %stream,
            version_id,
            version_number = version.version_number,
            "Version activated"
        );
        Ok(version)
    }

    /// Create a new draft from an existing version.
    ///
    /// Legacy URLs are folded into the copied payload so the clone carries
    /// no parallel URL array.
    pub async fn clone_version(
        store: &dyn KvStore,
        ad_id: &str,
        stream: StreamType,
        version_id: &str,
        created_by: CreatedBy,
    ) -> Result<Version, CoreError> {
        validate_ad_id(ad_id)?;
        let source = Self::require(store, ad_id, stream, version_id).await?;

        let number = Self::next_version_number(store, ad_id, stream).await?;
        let version = Version::new_draft(
            number,
            source.canonical_payload(),
            created_by,
            Some(source.id.clone()),
        );
        put_record(store, &keys::version(ad_id, stream, &version.id), &version).await?;

        tracing::debug!(
            ad_id,
            %stream,
            source_id = %source.id,
            version_id = %version.id,
            "Version cloned"
        );
        Ok(version)
    }

    // ── Active pointer ───────────────────────────────────────────────

    pub async fn get_active_id(
        store: &dyn KvStore,
        ad_id: &str,
        stream: StreamType,
    ) -> Result<Option<VersionId>, CoreError> {
        validate_ad_id(ad_id)?;
        let id = get_record::<VersionId>(store, &keys::active(ad_id, stream)).await?;
        Ok(id.filter(|id| !id.is_empty()))
    }

    /// The active version, if the pointer is set and its target exists.
    ///
    /// A pointer to a missing version is treated as absent.
    pub async fn find_active(
        store: &dyn KvStore,
        ad_id: &str,
        stream: StreamType,
    ) -> Result<Option<Version>, CoreError> {
        let Some(active_id) = Self::get_active_id(store, ad_id, stream).await? else {
            return Ok(None);
        };
        let version = Self::find_by_id(store, ad_id, stream, &active_id).await?;
        if version.is_none() {
            tracing::warn!(ad_id, %stream, version_id = %active_id, "Active pointer is dangling");
        }
        Ok(version)
    }

    /// Point the stream at an existing version without changing its status.
    pub async fn set_active(
        store: &dyn KvStore,
        ad_id: &str,
        stream: StreamType,
        version_id: &str,
    ) -> Result<(), CoreError> {
        validate_ad_id(ad_id)?;
        Self::require(store, ad_id, stream, version_id).await?;
        put_record(store, &keys::active(ad_id, stream), &version_id).await?;
        Ok(())
    }

    /// Clear the active pointer. Returns `true` if one was set.
    pub async fn clear_active(
        store: &dyn KvStore,
        ad_id: &str,
        stream: StreamType,
    ) -> Result<bool, CoreError> {
        validate_ad_id(ad_id)?;
        Ok(store.delete(&keys::active(ad_id, stream)).await?)
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// Next display number for the stream: highest existing + 1.
    pub async fn next_version_number(
        store: &dyn KvStore,
        ad_id: &str,
        stream: StreamType,
    ) -> Result<i32, CoreError> {
        let max = Self::list(store, ad_id, stream)
            .await?
            .iter()
            .map(|v| v.version_number)
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }

    async fn require(
        store: &dyn KvStore,
        ad_id: &str,
        stream: StreamType,
        version_id: &str,
    ) -> Result<Version, CoreError> {
        Self::find_by_id(store, ad_id, stream, version_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "Version",
                id: version_id.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use admix_core::store::StoreError;
    use admix_core::version::{
        MusicPayload, SfxPatch, VersionPayload, VoiceLine, VoicePatch, VoicePayload,
    };
    use assert_matches::assert_matches;

    use super::*;
    use crate::MemoryStore;

    const AD: &str = "summer-sale";

    fn line(url: Option<&str>) -> VoiceLine {
        VoiceLine {
            voice_id: "el-1".into(),
            voice_name: Some("Ava".into()),
            provider: Some("elevenlabs".into()),
            text: "Fresh deals every day".into(),
            generated_url: url.map(str::to_string),
            duration: None,
            play_after: None,
            overlap: None,
            is_concurrent: false,
            concurrent_group: None,
        }
    }

    fn voices(urls: &[Option<&str>]) -> CreateVersion {
        CreateVersion {
            payload: VersionPayload::Voices(VoicePayload {
                lines: urls.iter().map(|u| line(*u)).collect(),
            }),
            created_by: CreatedBy::Llm,
            parent_version_id: None,
        }
    }

    fn music() -> CreateVersion {
        CreateVersion {
            payload: VersionPayload::Music(MusicPayload {
                provider: "loudly".into(),
                prompt: "upbeat pop".into(),
                generated_url: None,
                duration: Some(30.0),
            }),
            created_by: CreatedBy::User,
            parent_version_id: None,
        }
    }

    #[tokio::test]
    async fn create_assigns_increasing_numbers() {
        let store = MemoryStore::new();
        let v1 = VersionRepo::create(&store, AD, StreamType::Voices, &voices(&[None]))
            .await
            .unwrap();
        let v2 = VersionRepo::create(&store, AD, StreamType::Voices, &voices(&[None]))
            .await
            .unwrap();
        let m1 = VersionRepo::create(&store, AD, StreamType::Music, &music())
            .await
            .unwrap();

        assert_eq!(v1.version_number, 1);
        assert_eq!(v2.version_number, 2);
        assert_eq!(m1.version_number, 1);
        assert_eq!(v1.status, VersionStatus::Draft);

        let listed = VersionRepo::list(&store, AD, StreamType::Voices).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec![v2.id.as_str(), v1.id.as_str()]);
    }

    #[tokio::test]
    async fn create_rejects_payload_for_other_stream() {
        let store = MemoryStore::new();
        let result = VersionRepo::create(&store, AD, StreamType::Sfx, &music()).await;
        assert_matches!(result, Err(CoreError::MalformedInput(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn create_rejects_bad_ad_id() {
        let store = MemoryStore::new();
        let result = VersionRepo::create(&store, "a:b", StreamType::Music, &music()).await;
        assert_matches!(result, Err(CoreError::MalformedInput(_)));
    }

    #[tokio::test]
    async fn create_with_unknown_parent_is_not_found() {
        let store = MemoryStore::new();
        let mut input = music();
        input.parent_version_id = Some("nope".into());
        let result = VersionRepo::create(&store, AD, StreamType::Music, &input).await;
        assert_matches!(result, Err(CoreError::NotFound { entity: "Version", .. }));
    }

    #[tokio::test]
    async fn freeze_guard_reports_exact_missing_count() {
        let store = MemoryStore::new();
        let v = VersionRepo::create(
            &store,
            AD,
            StreamType::Voices,
            &voices(&[Some("https://cdn/0.mp3"), None, None]),
        )
        .await
        .unwrap();

        let result = VersionRepo::freeze_or_activate(&store, AD, StreamType::Voices, &v.id).await;
        assert_matches!(result, Err(CoreError::IncompleteContent { missing: 2 }));

        // Nothing changed.
        let stored = VersionRepo::find_by_id(&store, AD, StreamType::Voices, &v.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_draft());
        assert_eq!(
            VersionRepo::get_active_id(&store, AD, StreamType::Voices).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn activation_freezes_and_sets_pointer() {
        let store = MemoryStore::new();
        let v = VersionRepo::create(&store, AD, StreamType::Voices, &voices(&[Some("https://cdn/0.mp3")]))
            .await
            .unwrap();

        let frozen = VersionRepo::freeze_or_activate(&store, AD, StreamType::Voices, &v.id)
            .await
            .unwrap();
        assert_eq!(frozen.status, VersionStatus::Frozen);

        let active = VersionRepo::find_active(&store, AD, StreamType::Voices)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.id, v.id);
        assert_eq!(active.status, VersionStatus::Frozen);
    }

    #[tokio::test]
    async fn frozen_versions_cannot_be_updated() {
        let store = MemoryStore::new();
        let m = VersionRepo::create(&store, AD, StreamType::Music, &music()).await.unwrap();
        VersionRepo::freeze_or_activate(&store, AD, StreamType::Music, &m.id)
            .await
            .unwrap();

        let patch = PayloadPatch::Music(Default::default());
        let result = VersionRepo::update(&store, AD, StreamType::Music, &m.id, patch).await;
        assert_matches!(result, Err(CoreError::InvalidState(_)));
    }

    #[tokio::test]
    async fn update_preserves_provenance() {
        let store = MemoryStore::new();
        let v = VersionRepo::create(&store, AD, StreamType::Voices, &voices(&[None]))
            .await
            .unwrap();

        let patch = PayloadPatch::Voices(VoicePatch {
            lines: Some(vec![line(Some("https://cdn/new.mp3"))]),
        });
        let updated = VersionRepo::update(&store, AD, StreamType::Voices, &v.id, patch)
            .await
            .unwrap();

        assert_eq!(updated.created_at, v.created_at);
        assert_eq!(updated.created_by, CreatedBy::Llm);
        assert_eq!(updated.version_number, v.version_number);
        assert_eq!(updated.missing_audio_count(), 0);
    }

    #[tokio::test]
    async fn update_rejects_patch_for_other_stream() {
        let store = MemoryStore::new();
        let v = VersionRepo::create(&store, AD, StreamType::Voices, &voices(&[None]))
            .await
            .unwrap();
        let patch = PayloadPatch::Sfx(SfxPatch::default());
        let result = VersionRepo::update(&store, AD, StreamType::Voices, &v.id, patch).await;
        assert_matches!(result, Err(CoreError::MalformedInput(_)));
    }

    #[tokio::test]
    async fn deleting_active_version_clears_pointer() {
        let store = MemoryStore::new();
        let m = VersionRepo::create(&store, AD, StreamType::Music, &music()).await.unwrap();
        VersionRepo::freeze_or_activate(&store, AD, StreamType::Music, &m.id)
            .await
            .unwrap();

        let was_active = VersionRepo::delete(&store, AD, StreamType::Music, &m.id)
            .await
            .unwrap();
        assert!(was_active);
        assert_eq!(
            VersionRepo::get_active_id(&store, AD, StreamType::Music).await.unwrap(),
            None
        );
        assert!(VersionRepo::find_by_id(&store, AD, StreamType::Music, &m.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn deleting_inactive_version_keeps_pointer() {
        let store = MemoryStore::new();
        let active = VersionRepo::create(&store, AD, StreamType::Music, &music()).await.unwrap();
        let other = VersionRepo::create(&store, AD, StreamType::Music, &music()).await.unwrap();
        VersionRepo::freeze_or_activate(&store, AD, StreamType::Music, &active.id)
            .await
            .unwrap();

        let was_active = VersionRepo::delete(&store, AD, StreamType::Music, &other.id)
            .await
            .unwrap();
        assert!(!was_active);
        assert_eq!(
            VersionRepo::get_active_id(&store, AD, StreamType::Music).await.unwrap(),
            Some(active.id)
        );
    }

    #[tokio::test]
    async fn delete_missing_version_is_not_found() {
        let store = MemoryStore::new();
        let result = VersionRepo::delete(&store, AD, StreamType::Sfx, "missing").await;
        assert_matches!(result, Err(CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn clone_folds_legacy_urls_and_links_parent() {
        let store = MemoryStore::new();
        let source = VersionRepo::create(&store, AD, StreamType::Voices, &voices(&[None, None]))
            .await
            .unwrap();

        // Simulate an older record that stored URLs in the parallel array.
        let mut legacy = source.clone();
        legacy.generated_urls = vec!["https://cdn/a.mp3".into(), "https://cdn/b.mp3".into()];
        put_record(&store, &keys::version(AD, StreamType::Voices, &source.id), &legacy)
            .await
            .unwrap();

        let clone = VersionRepo::clone_version(&store, AD, StreamType::Voices, &source.id, CreatedBy::User)
            .await
            .unwrap();

        assert_eq!(clone.parent_version_id.as_deref(), Some(source.id.as_str()));
        assert_eq!(clone.version_number, 2);
        assert!(clone.is_draft());
        assert!(clone.generated_urls.is_empty());
        assert_eq!(clone.missing_audio_count(), 0);
        assert_ne!(clone.id, source.id);
    }

    #[tokio::test]
    async fn dangling_pointer_reads_as_absent() {
        let store = MemoryStore::new();
        put_record(&store, &keys::active(AD, StreamType::Sfx), &"ghost")
            .await
            .unwrap();

        assert_eq!(
            VersionRepo::get_active_id(&store, AD, StreamType::Sfx).await.unwrap(),
            Some("ghost".to_string())
        );
        assert!(VersionRepo::find_active(&store, AD, StreamType::Sfx)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn set_active_requires_existing_version() {
        let store = MemoryStore::new();
        let result = VersionRepo::set_active(&store, AD, StreamType::Music, "missing").await;
        assert_matches!(result, Err(CoreError::NotFound { .. }));

        let m = VersionRepo::create(&store, AD, StreamType::Music, &music()).await.unwrap();
        VersionRepo::set_active(&store, AD, StreamType::Music, &m.id).await.unwrap();
        assert!(VersionRepo::clear_active(&store, AD, StreamType::Music).await.unwrap());
        assert!(!VersionRepo::clear_active(&store, AD, StreamType::Music).await.unwrap());
    }

    /// Accepts every write except active-pointer updates.
    struct PointerWriteFails(MemoryStore);

    #[async_trait::async_trait]
    impl KvStore for PointerWriteFails {
        async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
            self.0.get(key).await
        }

        async fn set(&self, key: &str, record: serde_json::Value) -> Result<(), StoreError> {
            if key.ends_with(":active") {
                return Err(StoreError::Backend("write timed out".into()));
            }
            self.0.set(key, record).await
        }

        async fn delete(&self, key: &str) -> Result<bool, StoreError> {
            self.0.delete(key).await
        }

        async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
            self.0.list_keys(prefix).await
        }
    }

    #[tokio::test]
    async fn failed_pointer_write_leaves_version_editable() {
        let store = PointerWriteFails(MemoryStore::new());
        let input = voices(&[Some("https://cdn/a.mp3")]);
        let v = VersionRepo::create(&store, AD, StreamType::Voices, &input)
            .await
            .unwrap();

        let result = VersionRepo::freeze_or_activate(&store, AD, StreamType::Voices, &v.id).await;
        assert_matches!(result, Err(CoreError::StoreUnavailable(_)));

        let stored = VersionRepo::find_by_id(&store, AD, StreamType::Voices, &v.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, VersionStatus::Draft);
        assert!(VersionRepo::get_active_id(&store, AD, StreamType::Voices)
            .await
            .unwrap()
            .is_none());
    }
}
