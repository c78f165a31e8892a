//! Mixer track and state types.
//!
//! A [`MixerTrack`] is an untimed reference to one piece of generated audio
//! plus its placement rules. The timeline calculator turns tracks into
//! [`CalculatedTrack`]s, and the rebuilder persists the result as a
//! [`MixerState`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{EpochMillis, VersionId};

// ---------------------------------------------------------------------------
// Track type and default volumes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    Voice,
    Music,
    Soundfx,
}

/// Default playback volume per track type.
const DEFAULT_VOLUMES: &[(TrackType, f64)] = &[
    (TrackType::Voice, 1.0),
    (TrackType::Music, 0.25),
    (TrackType::Soundfx, 0.7),
];

impl TrackType {
    /// Volume applied when a track does not declare one.
    pub fn default_volume(&self) -> f64 {
        DEFAULT_VOLUMES
            .iter()
            .find(|(t, _)| t == self)
            .map(|(_, v)| *v)
            .unwrap_or(1.0)
    }
}

// ---------------------------------------------------------------------------
// PlayAfter
// ---------------------------------------------------------------------------

/// Relative anchor for a track's start time.
///
/// Serialized as a plain string: `"start"`, `"previous"`, or a track id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlayAfter {
    Start,
    Previous,
    Track(String),
}

impl From<String> for PlayAfter {
    fn from(s: String) -> Self {
        match s.as_str() {
            "start" => Self::Start,
            "previous" => Self::Previous,
            _ => Self::Track(s),
        }
    }
}

impl From<PlayAfter> for String {
    fn from(p: PlayAfter) -> Self {
        match p {
            PlayAfter::Start => "start".to_string(),
            PlayAfter::Previous => "previous".to_string(),
            PlayAfter::Track(id) => id,
        }
    }
}

impl fmt::Display for PlayAfter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::Previous => f.write_str("previous"),
            Self::Track(id) => f.write_str(id),
        }
    }
}

// ---------------------------------------------------------------------------
// Tracks
// ---------------------------------------------------------------------------

/// Provenance of a track's audio.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_version_id: Option<VersionId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixerTrack {
    pub id: String,
    pub url: String,
    pub label: String,
    #[serde(rename = "type")]
    pub track_type: TrackType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play_after: Option<PlayAfter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlap: Option<f64>,
    #[serde(default)]
    pub is_concurrent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrent_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TrackMetadata>,
}

impl MixerTrack {
    /// A track with only the required fields set.
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        label: impl Into<String>,
        track_type: TrackType,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            label: label.into(),
            track_type,
            volume: None,
            start_time: None,
            duration: None,
            play_after: None,
            overlap: None,
            is_concurrent: false,
            concurrent_group: None,
            metadata: None,
        }
    }

    /// The concurrent group this track is pinned to, if any.
    ///
    /// A group only applies when the track is flagged concurrent and the
    /// group id is non-empty.
    pub fn group(&self) -> Option<&str> {
        if !self.is_concurrent {
            return None;
        }
        self.concurrent_group
            .as_deref()
            .filter(|g| !g.is_empty())
    }

    pub fn effective_volume(&self) -> f64 {
        self.volume
            .unwrap_or_else(|| self.track_type.default_volume())
    }
}

/// A track with its resolved position on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatedTrack {
    #[serde(flatten)]
    pub track: MixerTrack,
    pub actual_start_time: f64,
    pub actual_duration: f64,
}

impl CalculatedTrack {
    pub fn end_time(&self) -> f64 {
        self.actual_start_time + self.actual_duration
    }
}

// ---------------------------------------------------------------------------
// Mixer state
// ---------------------------------------------------------------------------

/// Measured audio durations reported by playback clients, keyed by track id.
pub type MeasuredDurations = BTreeMap<String, f64>;

/// The active version of each stream at rebuild time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveVersions {
    pub voices: Option<VersionId>,
    pub music: Option<VersionId>,
    pub sfx: Option<VersionId>,
}

/// Materialized mix for one ad. Rebuilt wholesale from the active versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixerState {
    pub tracks: Vec<MixerTrack>,
    pub calculated_tracks: Vec<CalculatedTrack>,
    pub total_duration: f64,
    pub volumes: BTreeMap<String, f64>,
    pub active_versions: ActiveVersions,
    pub last_calculated: EpochMillis,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_volumes_per_type() {
        assert_eq!(TrackType::Voice.default_volume(), 1.0);
        assert_eq!(TrackType::Music.default_volume(), 0.25);
        assert_eq!(TrackType::Soundfx.default_volume(), 0.7);
    }

    #[test]
    fn explicit_volume_wins_over_default() {
        let mut track = MixerTrack::new("m", "u", "l", TrackType::Music);
        assert_eq!(track.effective_volume(), 0.25);
        track.volume = Some(0.5);
        assert_eq!(track.effective_volume(), 0.5);
    }

    #[test]
    fn play_after_round_trips_as_plain_string() {
        let cases = [
            (PlayAfter::Start, "\"start\""),
            (PlayAfter::Previous, "\"previous\""),
            (PlayAfter::Track("voice-1".into()), "\"voice-1\""),
        ];
        for (value, json) in cases {
            assert_eq!(serde_json::to_string(&value).unwrap(), json);
            let parsed: PlayAfter = serde_json::from_str(json).unwrap();
            assert_eq!(parsed, value);
        }
    }

    #[test]
    fn group_requires_concurrent_flag() {
        let mut track = MixerTrack::new("a", "u", "l", TrackType::Voice);
        track.concurrent_group = Some("g1".into());
        assert_eq!(track.group(), None);
        track.is_concurrent = true;
        assert_eq!(track.group(), Some("g1"));
        track.concurrent_group = Some(String::new());
        assert_eq!(track.group(), None);
    }

    #[test]
    fn calculated_track_flattens_track_fields() {
        let calc = CalculatedTrack {
            track: MixerTrack::new("fx", "https://cdn/fx.mp3", "Whoosh", TrackType::Soundfx),
            actual_start_time: 1.0,
            actual_duration: 2.5,
        };
        let json = serde_json::to_value(&calc).unwrap();
        assert_eq!(json["id"], "fx");
        assert_eq!(json["type"], "soundfx");
        assert_eq!(json["actual_start_time"], 1.0);
        assert_eq!(calc.end_time(), 3.5);
    }
}
