//! Ad mixer event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`MixerEvent`]: the domain event envelope for version and mixer
//!   changes.
//! - [`EventLogger`]: background subscriber that writes every event to the
//!   structured log.

pub mod bus;
pub mod logger;

pub use bus::{event_types, EventBus, MixerEvent};
pub use logger::EventLogger;
