//! Mock playback engine for tests.

use super::{PlaybackEngine, PlaybackOutcome};
use crate::error::{Result, VoxturnError};
use crate::lock_unpoisoned;
use crate::providers::AudioResource;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Debug, Default)]
struct Shared {
    played: Vec<AudioResource>,
    current: Option<oneshot::Sender<PlaybackOutcome>>,
    stops: usize,
}

/// Records every resource it is asked to play.
///
/// By default a `play` call stays pending until [`MockPlayer::finish`] or
/// `stop` is called. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockPlayer {
    shared: Arc<Mutex<Shared>>,
    duration: Option<Duration>,
    should_fail: bool,
}

impl MockPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Complete every playback on its own after `duration`.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Fail every playback immediately.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Complete the pending playback. Returns false when nothing was playing.
    pub fn finish(&self) -> bool {
        lock_unpoisoned(&self.shared)
            .current
            .take()
            .is_some_and(|tx| tx.send(PlaybackOutcome::Completed).is_ok())
    }

    pub fn played(&self) -> Vec<AudioResource> {
        lock_unpoisoned(&self.shared).played.clone()
    }

    pub fn is_playing(&self) -> bool {
        lock_unpoisoned(&self.shared)
            .current
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Times an active playback was interrupted.
    pub fn stops(&self) -> usize {
        lock_unpoisoned(&self.shared).stops
    }
}

#[async_trait]
impl PlaybackEngine for MockPlayer {
    async fn play(&self, resource: AudioResource) -> Result<PlaybackOutcome> {
        let rx = {
            let mut shared = lock_unpoisoned(&self.shared);
            shared.played.push(resource);
            if self.should_fail {
                return Err(VoxturnError::Playback {
                    message: "mock playback failure".to_string(),
                });
            }
            let (tx, rx) = oneshot::channel();
            if let Some(previous) = shared.current.replace(tx)
                && previous.send(PlaybackOutcome::Interrupted).is_ok()
            {
                shared.stops += 1;
            }
            rx
        };

        let outcome = match self.duration {
            Some(duration) => tokio::select! {
                outcome = rx => outcome.unwrap_or(PlaybackOutcome::Interrupted),
                _ = tokio::time::sleep(duration) => PlaybackOutcome::Completed,
            },
            None => rx.await.unwrap_or(PlaybackOutcome::Interrupted),
        };
        Ok(outcome)
    }

    fn stop(&self) {
        let mut shared = lock_unpoisoned(&self.shared);
        if let Some(tx) = shared.current.take()
            && tx.send(PlaybackOutcome::Interrupted).is_ok()
        {
            shared.stops += 1;
        }
    }
}
