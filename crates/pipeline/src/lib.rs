//! Mixer rebuild pipeline.
//!
//! - [`rebuild_mixer`]: aggregates the active versions of an ad into a
//!   positioned [`MixerState`](admix_core::mixer::MixerState) and persists it.
//! - [`AdLocks`]: per-ad async locks that sequence activations and rebuilds.
//! - [`MixerPipeline`]: activation, deletion and duration reports, each
//!   followed by a rebuild under the ad's lock.

pub mod lifecycle;
pub mod locks;
pub mod rebuilder;

pub use lifecycle::{Activation, Deletion, MixerPipeline};
pub use locks::{AdLockGuard, AdLocks};
pub use rebuilder::rebuild_mixer;
