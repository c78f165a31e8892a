//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`MixerEvent`]s.
//! It is shared via `Arc<EventBus>` across the application.

use admix_core::stream::StreamType;
use admix_core::types::{AdId, VersionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

pub mod event_types {
    pub const VERSION_CREATED: &str = "version.created";
    pub const VERSION_UPDATED: &str = "version.updated";
    pub const VERSION_ACTIVATED: &str = "version.activated";
    pub const VERSION_DELETED: &str = "version.deleted";
    pub const VERSION_CLONED: &str = "version.cloned";
    pub const MIXER_REBUILT: &str = "mixer.rebuilt";
    pub const MIXER_DURATION_REPORTED: &str = "mixer.duration_reported";
}

// ---------------------------------------------------------------------------
// MixerEvent
// ---------------------------------------------------------------------------

/// A version or mixer change on one ad.
///
/// Constructed via [`MixerEvent::new`] and enriched with the builder
/// methods [`with_stream`](MixerEvent::with_stream),
/// [`with_version`](MixerEvent::with_version), and
/// [`with_payload`](MixerEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixerEvent {
    /// Dot-separated event name, e.g. `"version.activated"`.
    pub event_type: String,

    pub ad_id: AdId,

    /// Stream the event concerns, if it is stream-scoped.
    pub stream: Option<StreamType>,

    pub version_id: Option<VersionId>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl MixerEvent {
    /// Create a new event for an ad. Optional fields start empty.
    pub fn new(event_type: impl Into<String>, ad_id: impl Into<AdId>) -> Self {
        Self {
            event_type: event_type.into(),
            ad_id: ad_id.into(),
            stream: None,
            version_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_stream(mut self, stream: StreamType) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn with_version(mut self, version_id: impl Into<VersionId>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use admix_events::bus::{event_types, EventBus, MixerEvent};
///
/// let bus = EventBus::default();
/// let _rx = bus.subscribe();
///
/// bus.publish(MixerEvent::new(event_types::MIXER_REBUILT, "summer-sale"));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<MixerEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is dropped.
    pub fn publish(&self, event: MixerEvent) {
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MixerEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
