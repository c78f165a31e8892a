use std::sync::Arc;

use admix_core::store::KvStore;
use admix_events::EventBus;
use admix_pipeline::MixerPipeline;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Record store holding versions, pointers and mixer state.
    pub store: Arc<dyn KvStore>,
    pub config: Arc<ServerConfig>,
    /// Centralized event bus for version and mixer events.
    pub event_bus: Arc<EventBus>,
    /// Activation and rebuild sequencing, sharing `store` and `event_bus`.
    pub pipeline: MixerPipeline,
}

impl AppState {
    pub fn new(store: Arc<dyn KvStore>, config: ServerConfig, event_bus: Arc<EventBus>) -> Self {
        let pipeline = MixerPipeline::new(Arc::clone(&store), Arc::clone(&event_bus));
        Self {
            store,
            config: Arc::new(config),
            event_bus,
            pipeline,
        }
    }
}
