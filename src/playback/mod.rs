//! Audio playback.
//!
//! An engine plays one [`AudioResource`] at a time. Decoding is left to the
//! player; resources are handed over as they came from the provider.

pub mod command;
pub mod mock;

pub use command::CommandPlayer;
pub use mock::MockPlayer;

use crate::error::Result;
use crate::providers::AudioResource;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// How a `play` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackOutcome {
    Completed,
    Interrupted,
}

#[async_trait]
pub trait PlaybackEngine: Send + Sync {
    /// Play `resource` to the end. Starting a new `play` while one is active
    /// stops the previous one, which then resolves with `Interrupted`.
    async fn play(&self, resource: AudioResource) -> Result<PlaybackOutcome>;

    /// Force the active playback to end with `Interrupted`. No-op when idle.
    fn stop(&self);
}
