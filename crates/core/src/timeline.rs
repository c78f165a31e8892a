//! Timeline calculator: assigns a start time and duration to every track.
//!
//! Pure and deterministic. Tracks are positioned by a fixed sequence of
//! passes; each pass only touches tracks that no earlier pass placed:
//!
//! 1. explicit `start_time`
//! 2. voice sequencing (non-concurrent voices)
//! 3. concurrent groups (all members share one start)
//! 4. music, anchored at 0 and trimmed to the speech plus a short tail
//! 5. sound effects
//! 6. catch-all, appended after everything else
//!
//! Within a pass tracks are resolved in input order, and "previous" always
//! refers to a track's origin index in the input slice. The calculator never
//! drops a track and never fails.

use std::collections::{HashMap, HashSet};

use crate::mixer::{CalculatedTrack, MeasuredDurations, MixerTrack, PlayAfter, TrackType};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Duration used when a track has neither a declared nor a measured duration.
pub const FALLBACK_DURATION_SECS: f64 = 3.0;

/// Fallback for sound effects, which are usually longer than a placeholder
/// voice line.
pub const SFX_FALLBACK_DURATION_SECS: f64 = 5.0;

/// How long music may play past the end of the last voice track.
pub const MUSIC_TAIL_SECS: f64 = 3.0;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Result of a timeline calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    /// One entry per input track, in input order.
    pub tracks: Vec<CalculatedTrack>,
    /// `ceil(max(start + duration))`, or 0 for an empty track list.
    pub total_duration: f64,
}

/// Position every track.
///
/// `measured` holds durations learned from real audio files, keyed by track
/// id. It is consulted only for tracks without a declared duration.
pub fn calculate_timeline(tracks: &[MixerTrack], measured: &MeasuredDurations) -> Timeline {
    let mut layout = Layout::new(tracks, measured);
    layout.place_explicit();
    layout.place_voices();
    layout.place_concurrent_groups();
    layout.place_music();
    layout.place_sound_effects();
    layout.place_remaining();
    layout.finish()
}

/// Resolve a track's duration: declared, then measured, then the fallback
/// for its track type.
pub fn resolve_duration(track: &MixerTrack, measured: &MeasuredDurations) -> f64 {
    track
        .duration
        .filter(|d| is_valid_seconds(*d))
        .or_else(|| {
            measured
                .get(&track.id)
                .copied()
                .filter(|d| is_valid_seconds(*d))
        })
        .unwrap_or_else(|| fallback_duration(track.track_type))
}

fn fallback_duration(track_type: TrackType) -> f64 {
    match track_type {
        TrackType::Soundfx => SFX_FALLBACK_DURATION_SECS,
        _ => FALLBACK_DURATION_SECS,
    }
}

fn is_valid_seconds(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

fn overlap_secs(overlap: Option<f64>) -> f64 {
    overlap
        .filter(|o| o.is_finite() && *o > 0.0)
        .unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Working state of one calculation, indexed by origin position.
struct Layout<'a> {
    tracks: &'a [MixerTrack],
    durations: Vec<f64>,
    starts: Vec<Option<f64>>,
    /// First occurrence wins when ids repeat.
    index_by_id: HashMap<&'a str, usize>,
}

impl<'a> Layout<'a> {
    fn new(tracks: &'a [MixerTrack], measured: &MeasuredDurations) -> Self {
        let mut index_by_id = HashMap::with_capacity(tracks.len());
        for (i, track) in tracks.iter().enumerate() {
            index_by_id.entry(track.id.as_str()).or_insert(i);
        }

        Self {
            tracks,
            durations: tracks.iter().map(|t| resolve_duration(t, measured)).collect(),
            starts: vec![None; tracks.len()],
            index_by_id,
        }
    }

    // -- primitives ---------------------------------------------------------

    fn is_placed(&self, i: usize) -> bool {
        self.starts[i].is_some()
    }

    fn place(&mut self, i: usize, start: f64) {
        let start = if start.is_finite() { start.max(0.0) } else { 0.0 };
        self.starts[i] = Some(start);
    }

    fn start(&self, i: usize) -> Option<f64> {
        self.starts[i]
    }

    fn end(&self, i: usize) -> Option<f64> {
        self.starts[i].map(|s| s + self.durations[i])
    }

    fn unplaced_of(&self, track_type: TrackType) -> Vec<usize> {
        (0..self.tracks.len())
            .filter(|&i| !self.is_placed(i) && self.tracks[i].track_type == track_type)
            .collect()
    }

    /// Index of a referenced track, excluding `from` itself.
    fn lookup(&self, id: &str, from: usize) -> Option<usize> {
        self.index_by_id.get(id).copied().filter(|&r| r != from)
    }

    /// Nearest placed track before `i` in input order with the given type.
    fn previous_placed(&self, i: usize, track_type: TrackType) -> Option<usize> {
        (0..i)
            .rev()
            .find(|&j| self.is_placed(j) && self.tracks[j].track_type == track_type)
    }

    /// Start right after `reference` ends, pulled earlier by `overlap` but
    /// never before the reference's own start. `None` if not yet placed.
    fn after(&self, reference: usize, overlap: Option<f64>) -> Option<f64> {
        let ref_start = self.start(reference)?;
        let ref_end = self.end(reference)?;
        Some((ref_end - overlap_secs(overlap)).max(ref_start))
    }

    /// Latest end among placed voice tracks, 0 if none.
    fn voice_end(&self) -> f64 {
        (0..self.tracks.len())
            .filter(|&i| self.tracks[i].track_type == TrackType::Voice)
            .filter_map(|i| self.end(i))
            .fold(0.0, f64::max)
    }

    fn has_placed_voice(&self) -> bool {
        (0..self.tracks.len())
            .any(|i| self.tracks[i].track_type == TrackType::Voice && self.is_placed(i))
    }

    /// Latest end among all placed tracks, 0 if none.
    fn latest_end(&self) -> f64 {
        (0..self.tracks.len())
            .filter_map(|i| self.end(i))
            .fold(0.0, f64::max)
    }

    // -- passes -------------------------------------------------------------

    /// Pass 1: declared start times are taken verbatim.
    fn place_explicit(&mut self) {
        for i in 0..self.tracks.len() {
            if let Some(start) = self.tracks[i].start_time.filter(|s| s.is_finite()) {
                self.place(i, start);
            }
        }
    }

    /// Pass 2: sequence non-concurrent voice tracks.
    fn place_voices(&mut self) {
        let candidates: Vec<usize> = self
            .unplaced_of(TrackType::Voice)
            .into_iter()
            .filter(|&i| self.tracks[i].group().is_none())
            .collect();

        let tracks = self.tracks;
        let mut cursor = 0.0_f64;
        for (n, i) in candidates.into_iter().enumerate() {
            let track = &tracks[i];
            let start = if n == 0 {
                0.0
            } else {
                match &track.play_after {
                    Some(PlayAfter::Previous) => self
                        .previous_placed(i, TrackType::Voice)
                        .and_then(|r| self.after(r, track.overlap))
                        .unwrap_or(cursor),
                    Some(PlayAfter::Track(id)) => self
                        .lookup(id, i)
                        .and_then(|r| self.after(r, track.overlap))
                        .unwrap_or(cursor),
                    Some(PlayAfter::Start) => 0.0,
                    None => cursor,
                }
            };

            self.place(i, start);
            if let Some(end) = self.end(i) {
                cursor = cursor.max(end);
            }
        }
    }

    /// Pass 3: every member of a concurrent group gets the lead's start.
    fn place_concurrent_groups(&mut self) {
        let tracks = self.tracks;
        let mut seen: HashSet<&'a str> = HashSet::new();

        for i in 0..tracks.len() {
            if self.is_placed(i) {
                continue;
            }
            let lead = &tracks[i];
            let Some(group) = lead.group() else {
                continue;
            };
            if !seen.insert(group) {
                continue;
            }

            let members: Vec<usize> = (i..tracks.len())
                .filter(|&j| !self.is_placed(j) && tracks[j].group() == Some(group))
                .collect();

            let fallback = self.voice_end();
            let start = match &lead.play_after {
                Some(PlayAfter::Previous) => self
                    .previous_placed(i, lead.track_type)
                    .and_then(|r| self.after(r, lead.overlap))
                    .unwrap_or(fallback),
                Some(PlayAfter::Track(id)) => self
                    .lookup(id, i)
                    .filter(|r| !members.contains(r))
                    .and_then(|r| self.after(r, lead.overlap))
                    .unwrap_or(fallback),
                Some(PlayAfter::Start) => 0.0,
                None => fallback,
            };

            for j in members {
                self.place(j, start);
            }
        }
    }

    /// Pass 4: music starts at 0 and stops shortly after the speech.
    fn place_music(&mut self) {
        let cap = self
            .has_placed_voice()
            .then(|| self.voice_end() + MUSIC_TAIL_SECS);

        for i in self.unplaced_of(TrackType::Music) {
            if let Some(cap) = cap {
                self.durations[i] = self.durations[i].min(cap);
            }
            self.place(i, 0.0);
        }
    }

    /// Pass 5: sound effects punctuate the ad.
    fn place_sound_effects(&mut self) {
        let tracks = self.tracks;
        for i in self.unplaced_of(TrackType::Soundfx) {
            let track = &tracks[i];
            let start = match &track.play_after {
                Some(PlayAfter::Start) | None => 0.0,
                Some(PlayAfter::Previous) => i
                    .checked_sub(1)
                    .and_then(|p| self.after(p, track.overlap))
                    .unwrap_or_else(|| self.voice_end()),
                Some(PlayAfter::Track(id)) => self
                    .lookup(id, i)
                    .and_then(|r| self.after(r, track.overlap))
                    .unwrap_or_else(|| self.voice_end()),
            };
            self.place(i, start);
        }
    }

    /// Pass 6: anything left is appended after the current end.
    fn place_remaining(&mut self) {
        let mut cursor = self.latest_end();
        for i in 0..self.tracks.len() {
            if self.is_placed(i) {
                continue;
            }
            self.place(i, cursor);
            cursor += self.durations[i];
        }
    }

    fn finish(self) -> Timeline {
        let tracks: Vec<CalculatedTrack> = self
            .tracks
            .iter()
            .enumerate()
            .map(|(i, track)| CalculatedTrack {
                track: track.clone(),
                actual_start_time: self.starts[i].unwrap_or(0.0),
                actual_duration: self.durations[i],
            })
            .collect();

        let total_duration = tracks
            .iter()
            .map(CalculatedTrack::end_time)
            .fold(0.0, f64::max)
            .ceil();

        Timeline {
            tracks,
            total_duration,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
