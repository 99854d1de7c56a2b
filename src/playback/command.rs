//! Playback through an external player process (`ffplay`, `mpv`, `paplay`, ...).
//!
//! URLs are passed as the last argument and fetched by the player itself.
//! In-memory audio is streamed to the player's stdin with `-` as the argument.

use super::{PlaybackEngine, PlaybackOutcome};
use crate::config::PlaybackConfig;
use crate::error::{Result, VoxturnError};
use crate::lock_unpoisoned;
use crate::providers::AudioResource;
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::debug;

struct ActivePlayback {
    id: u64,
    stop_tx: oneshot::Sender<()>,
}

pub struct CommandPlayer {
    command: String,
    args: Vec<String>,
    next_id: AtomicU64,
    active: Mutex<Option<ActivePlayback>>,
}

impl CommandPlayer {
    pub fn new(command: &str, args: Vec<String>) -> Self {
        Self {
            command: command.to_string(),
            args,
            next_id: AtomicU64::new(1),
            active: Mutex::new(None),
        }
    }

    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self::new(&config.command, config.args.clone())
    }

    fn command_for(&self, resource: &AudioResource) -> Command {
        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        match resource {
            AudioResource::Url(url) => {
                command.arg(url).stdin(Stdio::null());
            }
            AudioResource::Bytes { .. } => {
                command.arg("-").stdin(Stdio::piped());
            }
        }
        command
    }

    /// Register a new playback, stopping whatever was playing.
    fn begin(&self) -> (u64, oneshot::Receiver<()>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (stop_tx, stop_rx) = oneshot::channel();
        let previous = lock_unpoisoned(&self.active).replace(ActivePlayback { id, stop_tx });
        if let Some(previous) = previous {
            debug!(id = previous.id, "stopping previous playback");
            if previous.stop_tx.send(()).is_err() {
                debug!(id = previous.id, "previous playback had already ended");
            }
        }
        (id, stop_rx)
    }

    fn finish(&self, id: u64) {
        let mut active = lock_unpoisoned(&self.active);
        if active.as_ref().is_some_and(|a| a.id == id) {
            *active = None;
        }
    }

    async fn run(&self, resource: AudioResource, mut stop_rx: oneshot::Receiver<()>) -> Result<PlaybackOutcome> {
        let mut child = self.command_for(&resource).spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VoxturnError::PlayerNotFound {
                player: self.command.clone(),
            },
            _ => VoxturnError::Playback {
                message: format!("Failed to start '{}': {e}", self.command),
            },
        })?;

        if let (AudioResource::Bytes { data, .. }, Some(mut stdin)) = (resource, child.stdin.take()) {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&data).await {
                    debug!("player closed stdin early: {e}");
                    return;
                }
                if let Err(e) = stdin.shutdown().await {
                    debug!("failed to close player stdin: {e}");
                }
            });
        }

        tokio::select! {
            status = child.wait() => {
                let status = status?;
                if status.success() {
                    Ok(PlaybackOutcome::Completed)
                } else {
                    Err(VoxturnError::Playback {
                        message: format!("{} exited with {status}", self.command),
                    })
                }
            }
            _ = &mut stop_rx => {
                if let Err(e) = child.kill().await {
                    debug!("player already gone: {e}");
                }
                Ok(PlaybackOutcome::Interrupted)
            }
        }
    }
}

#[async_trait]
impl PlaybackEngine for CommandPlayer {
    async fn play(&self, resource: AudioResource) -> Result<PlaybackOutcome> {
        debug!(resource = %resource.describe(), player = %self.command, "playback starting");
        let (id, stop_rx) = self.begin();
        let outcome = self.run(resource, stop_rx).await;
        self.finish(id);
        outcome
    }

    fn stop(&self) {
        if let Some(active) = lock_unpoisoned(&self.active).take()
            && active.stop_tx.send(()).is_err()
        {
            debug!(id = active.id, "playback had already ended");
        }
    }
}
