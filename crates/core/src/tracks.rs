//! Conversion of active versions into untimed mixer tracks.
//!
//! Items without generated audio are skipped: a stream can be active while
//! some of its items are still pending generation.

use crate::mixer::{ActiveVersions, MixerTrack, PlayAfter, TrackMetadata, TrackType};
use crate::version::{Version, VersionPayload};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Number of prompt characters kept in a music track label.
pub const MUSIC_LABEL_PROMPT_CHARS: usize = 40;

// ---------------------------------------------------------------------------
// Track ids
// ---------------------------------------------------------------------------

pub fn voice_track_id(version_id: &str, index: usize) -> String {
    format!("voice-{version_id}-{index}")
}

pub fn music_track_id(version_id: &str) -> String {
    format!("music-{version_id}")
}

pub fn sfx_track_id(version_id: &str, index: usize) -> String {
    format!("sfx-{version_id}-{index}")
}

/// Expand stream-local shorthand references into full track ids.
///
/// Payload authors do not know the version id of another stream's active
/// version, so `play_after` may use `voice-N`, `sfx-N` or `music`. These
/// are rewritten against the active versions; anything else is kept as is.
pub fn expand_references(tracks: &mut [MixerTrack], active: &ActiveVersions) {
    for track in tracks.iter_mut() {
        if let Some(PlayAfter::Track(reference)) = &track.play_after {
            if let Some(expanded) = expand_reference(reference, active) {
                track.play_after = Some(PlayAfter::Track(expanded));
            }
        }
    }
}

fn expand_reference(reference: &str, active: &ActiveVersions) -> Option<String> {
    if reference == "music" {
        return active.music.as_deref().map(music_track_id);
    }
    let parse_index = |rest: &str| -> Option<usize> {
        if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        rest.parse().ok()
    };
    if let Some(index) = reference.strip_prefix("voice-").and_then(parse_index) {
        return active
            .voices
            .as_deref()
            .map(|vid| voice_track_id(vid, index));
    }
    if let Some(index) = reference.strip_prefix("sfx-").and_then(parse_index) {
        return active.sfx.as_deref().map(|vid| sfx_track_id(vid, index));
    }
    None
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Convert a version into the tracks it contributes to the mix.
pub fn tracks_for_version(version: &Version) -> Vec<MixerTrack> {
    match &version.payload {
        VersionPayload::Voices(_) => voice_tracks(version),
        VersionPayload::Music(_) => music_tracks(version),
        VersionPayload::Sfx(_) => sfx_tracks(version),
    }
}

/// One `voice` track per line that has resolvable audio.
pub fn voice_tracks(version: &Version) -> Vec<MixerTrack> {
    let VersionPayload::Voices(payload) = &version.payload else {
        return Vec::new();
    };

    payload
        .lines
        .iter()
        .enumerate()
        .filter_map(|(i, line)| {
            let url = version.resolve_url(line.generated_url.as_deref(), i)?;
            let label = line
                .voice_name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| line.voice_id.clone());

            let mut track =
                MixerTrack::new(voice_track_id(&version.id, i), url, label, TrackType::Voice);
            track.volume = Some(TrackType::Voice.default_volume());
            track.duration = line.duration;
            track.play_after = line.play_after.clone();
            track.overlap = line.overlap;
            track.is_concurrent = line.is_concurrent;
            track.concurrent_group = line.concurrent_group.clone();
            track.metadata = Some(TrackMetadata {
                voice_id: Some(line.voice_id.clone()),
                provider: line.provider.clone(),
                script_text: Some(line.text.clone()),
                source_version_id: Some(version.id.clone()),
                ..Default::default()
            });
            Some(track)
        })
        .collect()
}

/// At most one `music` track.
pub fn music_tracks(version: &Version) -> Vec<MixerTrack> {
    let VersionPayload::Music(payload) = &version.payload else {
        return Vec::new();
    };
    let Some(url) = version.resolve_url(payload.generated_url.as_deref(), 0) else {
        return Vec::new();
    };

    let mut track = MixerTrack::new(
        music_track_id(&version.id),
        url,
        music_label(&payload.provider, &payload.prompt),
        TrackType::Music,
    );
    track.volume = Some(TrackType::Music.default_volume());
    track.duration = payload.duration;
    track.metadata = Some(TrackMetadata {
        provider: Some(payload.provider.clone()),
        prompt_text: Some(payload.prompt.clone()),
        source_version_id: Some(version.id.clone()),
        ..Default::default()
    });
    vec![track]
}

/// One `soundfx` track per effect that has resolvable audio.
pub fn sfx_tracks(version: &Version) -> Vec<MixerTrack> {
    let VersionPayload::Sfx(payload) = &version.payload else {
        return Vec::new();
    };

    payload
        .effects
        .iter()
        .enumerate()
        .filter_map(|(i, fx)| {
            let url = version.resolve_url(fx.generated_url.as_deref(), i)?;
            let mut track = MixerTrack::new(
                sfx_track_id(&version.id, i),
                url,
                fx.description.clone(),
                TrackType::Soundfx,
            );
            track.volume = Some(TrackType::Soundfx.default_volume());
            track.duration = fx.duration;
            track.play_after = fx.play_after.clone();
            track.overlap = fx.overlap;
            track.metadata = Some(TrackMetadata {
                prompt_text: Some(fx.description.clone()),
                source_version_id: Some(version.id.clone()),
                ..Default::default()
            });
            Some(track)
        })
        .collect()
}

/// `"{Provider} - {prompt prefix}"`, e.g. `"Loudly - Upbeat summer pop with..."`.
pub fn music_label(provider: &str, prompt: &str) -> String {
    let mut chars = provider.chars();
    let provider = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };

    let prompt = prompt.trim();
    let mut prefix: String = prompt.chars().take(MUSIC_LABEL_PROMPT_CHARS).collect();
    if prompt.chars().count() > MUSIC_LABEL_PROMPT_CHARS {
        prefix.push_str("...");
    }
    format!("{provider} - {prefix}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
