//! Content versions and their per-stream payloads.
//!
//! A [`Version`] is one revision of one stream of one ad. Drafts are mutable;
//! once a version is frozen (activated) it never changes again. The payload
//! is a tagged union discriminated by the stream it belongs to.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::mixer::PlayAfter;
use crate::stream::StreamType;
use crate::types::{now_millis, new_version_id, EpochMillis, VersionId};

// ---------------------------------------------------------------------------
// Lifecycle enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    Draft,
    Frozen,
}

/// Who authored a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreatedBy {
    #[default]
    User,
    Llm,
}

// ---------------------------------------------------------------------------
// Stream payloads
// ---------------------------------------------------------------------------

/// One line of the voice script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct VoiceLine {
    #[validate(length(min = 1, message = "voice_id must not be empty"))]
    pub voice_id: String,
    /// Display name of the speaker, used as the track label.
    #[serde(default)]
    pub voice_name: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    pub text: String,
    #[serde(default)]
    pub generated_url: Option<String>,
    /// Approximate duration reported by the generation provider.
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub duration: Option<f64>,
    #[serde(default)]
    pub play_after: Option<PlayAfter>,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub overlap: Option<f64>,
    #[serde(default)]
    pub is_concurrent: bool,
    #[serde(default)]
    pub concurrent_group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate)]
pub struct VoicePayload {
    #[serde(default)]
    #[validate(nested)]
    pub lines: Vec<VoiceLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct MusicPayload {
    #[validate(length(min = 1, message = "provider must not be empty"))]
    pub provider: String,
    pub prompt: String,
    #[serde(default)]
    pub generated_url: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub duration: Option<f64>,
}

/// A single sound-effect prompt and its generated audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SoundFxPrompt {
    #[validate(length(min = 1, message = "description must not be empty"))]
    pub description: String,
    #[serde(default)]
    pub generated_url: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub duration: Option<f64>,
    #[serde(default)]
    pub play_after: Option<PlayAfter>,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub overlap: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate)]
pub struct SfxPayload {
    #[serde(default)]
    #[validate(nested)]
    pub effects: Vec<SoundFxPrompt>,
}

/// Stream-specific version content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stream", content = "content", rename_all = "lowercase")]
pub enum VersionPayload {
    Voices(VoicePayload),
    Music(MusicPayload),
    Sfx(SfxPayload),
}

impl VersionPayload {
    pub fn stream(&self) -> StreamType {
        match self {
            Self::Voices(_) => StreamType::Voices,
            Self::Music(_) => StreamType::Music,
            Self::Sfx(_) => StreamType::Sfx,
        }
    }

    /// Run shape validation on the inner payload.
    pub fn validate_shape(&self) -> Result<(), CoreError> {
        match self {
            Self::Voices(p) => p.validate()?,
            Self::Music(p) => p.validate()?,
            Self::Sfx(p) => p.validate()?,
        }
        Ok(())
    }

    /// Ensure the payload belongs to `stream`.
    pub fn ensure_stream(&self, stream: StreamType) -> Result<(), CoreError> {
        ensure_same_stream(self.stream(), stream)
    }

    /// Number of independently generated items in the payload.
    pub fn item_count(&self) -> usize {
        match self {
            Self::Voices(p) => p.lines.len(),
            Self::Music(_) => 1,
            Self::Sfx(p) => p.effects.len(),
        }
    }
}

fn ensure_same_stream(actual: StreamType, expected: StreamType) -> Result<(), CoreError> {
    if actual != expected {
        return Err(CoreError::MalformedInput(format!(
            "Payload is for stream '{actual}' but the request targets '{expected}'"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Partial updates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoicePatch {
    pub lines: Option<Vec<VoiceLine>>,
}

/// `generated_url` and `duration` distinguish an absent field (`None`,
/// unchanged) from an explicit `null` (`Some(None)`, cleared).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MusicPatch {
    pub provider: Option<String>,
    pub prompt: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub generated_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub duration: Option<Option<f64>>,
}

/// Any value that is present, including `null`, becomes `Some`.
fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SfxPatch {
    pub effects: Option<Vec<SoundFxPrompt>>,
}

/// A partial payload update. Only `Some` fields are applied.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "stream", content = "content", rename_all = "lowercase")]
pub enum PayloadPatch {
    Voices(VoicePatch),
    Music(MusicPatch),
    Sfx(SfxPatch),
}

impl PayloadPatch {
    pub fn stream(&self) -> StreamType {
        match self {
            Self::Voices(_) => StreamType::Voices,
            Self::Music(_) => StreamType::Music,
            Self::Sfx(_) => StreamType::Sfx,
        }
    }

    /// Produce the patched payload without touching `payload`.
    ///
    /// The result is shape-validated so a rejected patch never reaches the
    /// store.
    pub fn apply(self, payload: &VersionPayload) -> Result<VersionPayload, CoreError> {
        ensure_same_stream(self.stream(), payload.stream())?;

        let mut next = payload.clone();
        match (self, &mut next) {
            (Self::Voices(patch), VersionPayload::Voices(p)) => {
                if let Some(lines) = patch.lines {
                    p.lines = lines;
                }
            }
            (Self::Music(patch), VersionPayload::Music(p)) => {
                if let Some(provider) = patch.provider {
                    p.provider = provider;
                }
                if let Some(prompt) = patch.prompt {
                    p.prompt = prompt;
                }
                if let Some(url) = patch.generated_url {
                    p.generated_url = url;
                }
                if let Some(duration) = patch.duration {
                    p.duration = duration;
                }
            }
            (Self::Sfx(patch), VersionPayload::Sfx(p)) => {
                if let Some(effects) = patch.effects {
                    p.effects = effects;
                }
            }
            (patch, other) => {
                return Err(CoreError::MalformedInput(format!(
                    "Cannot apply a '{}' patch to a '{}' payload",
                    patch.stream(),
                    other.stream()
                )));
            }
        }

        next.validate_shape()?;
        Ok(next)
    }
}

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// One revision of one stream of one ad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub id: VersionId,
    /// Per-stream display number (max existing + 1 at creation time).
    pub version_number: i32,
    pub status: VersionStatus,
    pub created_at: EpochMillis,
    pub created_by: CreatedBy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_version_id: Option<VersionId>,
    pub payload: VersionPayload,
    /// URLs stored parallel to the payload items by older records.
    ///
    /// Read as a fallback only; new versions never populate it.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generated_urls: Vec<String>,
}

impl Version {
    /// Build a new draft with a fresh id.
    pub fn new_draft(
        version_number: i32,
        payload: VersionPayload,
        created_by: CreatedBy,
        parent_version_id: Option<VersionId>,
    ) -> Self {
        Self {
            id: new_version_id(),
            version_number,
            status: VersionStatus::Draft,
            created_at: now_millis(),
            created_by,
            parent_version_id,
            payload,
            generated_urls: Vec::new(),
        }
    }

    pub fn stream(&self) -> StreamType {
        self.payload.stream()
    }

    pub fn is_draft(&self) -> bool {
        self.status == VersionStatus::Draft
    }

    /// Resolve the audio URL of the item at `index`, falling back to the
    /// legacy parallel array when the item itself has none.
    pub fn resolve_url<'a>(&'a self, item_url: Option<&'a str>, index: usize) -> Option<&'a str> {
        resolve_url(item_url, &self.generated_urls, index)
    }

    /// Count voice lines that have no resolvable audio URL.
    ///
    /// Always zero for non-voice streams.
    pub fn missing_audio_count(&self) -> usize {
        match &self.payload {
            VersionPayload::Voices(p) => p
                .lines
                .iter()
                .enumerate()
                .filter(|(i, line)| self.resolve_url(line.generated_url.as_deref(), *i).is_none())
                .count(),
            _ => 0,
        }
    }

    /// Check the freeze guard: every voice line must have generated audio.
    pub fn ensure_activatable(&self) -> Result<(), CoreError> {
        let missing = self.missing_audio_count();
        if missing > 0 {
            return Err(CoreError::IncompleteContent { missing });
        }
        Ok(())
    }

    /// Payload with legacy URLs copied into the items that lack one.
    pub fn canonical_payload(&self) -> VersionPayload {
        let legacy = &self.generated_urls;
        let fold = |url: &Option<String>, i: usize| {
            resolve_url(url.as_deref(), legacy, i).map(str::to_string)
        };

        match &self.payload {
            VersionPayload::Voices(p) => VersionPayload::Voices(VoicePayload {
                lines: p
                    .lines
                    .iter()
                    .enumerate()
                    .map(|(i, line)| VoiceLine {
                        generated_url: fold(&line.generated_url, i),
                        ..line.clone()
                    })
                    .collect(),
            }),
            VersionPayload::Music(p) => VersionPayload::Music(MusicPayload {
                generated_url: fold(&p.generated_url, 0),
                ..p.clone()
            }),
            VersionPayload::Sfx(p) => VersionPayload::Sfx(SfxPayload {
                effects: p
                    .effects
                    .iter()
                    .enumerate()
                    .map(|(i, fx)| SoundFxPrompt {
                        generated_url: fold(&fx.generated_url, i),
                        ..fx.clone()
                    })
                    .collect(),
            }),
        }
    }
}

/// Resolve an item URL with the legacy parallel-array fallback.
///
/// Empty strings count as absent in both places.
pub fn resolve_url<'a>(
    item_url: Option<&'a str>,
    legacy: &'a [String],
    index: usize,
) -> Option<&'a str> {
    item_url
        .filter(|u| !u.trim().is_empty())
        .or_else(|| {
            legacy
                .get(index)
                .map(String::as_str)
                .filter(|u| !u.trim().is_empty())
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
