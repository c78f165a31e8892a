use admix_core::mixer::MeasuredDurations;
use serde::Deserialize;

/// Measured durations reported by a playback client, keyed by track id.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportDurations {
    pub durations: MeasuredDurations,
}
