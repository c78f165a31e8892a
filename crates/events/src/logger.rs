//! Structured-log sink for mixer events.
//!
//! [`EventLogger`] subscribes to the [`EventBus`](crate::bus::EventBus) and
//! writes every received [`MixerEvent`] to the tracing log. It runs as a
//! long-lived background task and stops when the bus is dropped.

use tokio::sync::broadcast;

use crate::bus::MixerEvent;

pub struct EventLogger;

impl EventLogger {
    /// Run the logging loop until the channel closes.
    ///
    /// Returns the number of events logged.
    pub async fn run(mut receiver: broadcast::Receiver<MixerEvent>) -> u64 {
        let mut logged = 0;
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    Self::log(&event);
                    logged += 1;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event logger lagged, some events were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, event logger shutting down");
                    break;
                }
            }
        }
        logged
    }

    fn log(event: &MixerEvent) {
        tracing::info!(
            event_type = %event.event_type,
            ad_id = %event.ad_id,
            stream = event.stream.map(|s| s.as_str()),
            version_id = event.version_id.as_deref(),
            payload = %event.payload,
            "Mixer event"
        );
    }
}
