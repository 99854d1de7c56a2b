//! The driver task that runs a [`TurnMachine`] against real collaborators.
//!
//! One task owns the machine, the capture adapter, the inactivity timer and the
//! playback stop capability. Provider calls and playback run in their own
//! tasks and report back through a channel, tagged with the token they were
//! started under. Events are processed one at a time, each to completion.

use super::machine::{Effect, TurnEvent, TurnMachine};
use super::types::{OrchestratorEvent, OrchestratorState, Severity, Snapshot, TurnToken};
use crate::capture::{CaptureEvent, CaptureSink, SpeechCapture};
use crate::config::Config;
use crate::defaults;
use crate::error::{Result, VoxturnError};
use crate::lock_unpoisoned;
use crate::playback::PlaybackEngine;
use crate::providers::{ProviderRegistry, ProviderSelection};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, trace, warn};

/// Timing and initial provider choice for an orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub inactivity_timeout: Duration,
    pub provider_timeout: Duration,
    pub selection: ProviderSelection,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            inactivity_timeout: Duration::from_secs(defaults::INACTIVITY_TIMEOUT_SECS),
            provider_timeout: Duration::from_secs(defaults::PROVIDER_TIMEOUT_SECS),
            selection: ProviderSelection::default(),
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            inactivity_timeout: config.conversation.inactivity_timeout(),
            provider_timeout: config.conversation.provider_timeout(),
            selection: config.providers,
        }
    }
}

#[derive(Debug)]
enum Intent {
    Start,
    Stop,
    Toggle,
    Select(ProviderSelection),
    Shutdown,
}

pub struct TurnOrchestrator {
    machine: TurnMachine,
    capture: Box<dyn SpeechCapture>,
    registry: ProviderRegistry,
    player: Arc<dyn PlaybackEngine>,
    settings: OrchestratorSettings,
    timer: Option<(TurnToken, Instant)>,
    dispatch: Option<JoinHandle<()>>,
    playback: Option<JoinHandle<()>>,
    capture_tx: mpsc::UnboundedSender<CaptureEvent>,
    results_tx: mpsc::UnboundedSender<TurnEvent>,
    events: broadcast::Sender<OrchestratorEvent>,
    snapshot: watch::Sender<Snapshot>,
    selection: watch::Sender<ProviderSelection>,
}

/// Cloneable control surface of a running orchestrator.
#[derive(Clone)]
pub struct OrchestratorHandle {
    intents: mpsc::Sender<Intent>,
    snapshot: watch::Receiver<Snapshot>,
    selection: watch::Receiver<ProviderSelection>,
    events: broadcast::Sender<OrchestratorEvent>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

struct Channels {
    intents: mpsc::Receiver<Intent>,
    capture: mpsc::UnboundedReceiver<CaptureEvent>,
    results: mpsc::UnboundedReceiver<TurnEvent>,
}

impl TurnOrchestrator {
    /// Start the driver task and return its handle. Must be called inside a
    /// tokio runtime.
    pub fn spawn(
        capture: Box<dyn SpeechCapture>,
        registry: ProviderRegistry,
        player: Arc<dyn PlaybackEngine>,
        settings: OrchestratorSettings,
    ) -> OrchestratorHandle {
        let (intents_tx, intents_rx) = mpsc::channel(defaults::EVENT_BUFFER);
        let (capture_tx, capture_rx) = mpsc::unbounded_channel();
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(defaults::EVENT_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::default());
        let (selection_tx, selection_rx) = watch::channel(settings.selection);

        let orchestrator = Self {
            machine: TurnMachine::new(),
            capture,
            registry,
            player,
            settings,
            timer: None,
            dispatch: None,
            playback: None,
            capture_tx,
            results_tx,
            events: events.clone(),
            snapshot: snapshot_tx,
            selection: selection_tx,
        };
        let channels = Channels {
            intents: intents_rx,
            capture: capture_rx,
            results: results_rx,
        };
        let task = tokio::spawn(orchestrator.run(channels));

        OrchestratorHandle {
            intents: intents_tx,
            snapshot: snapshot_rx,
            selection: selection_rx,
            events,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    async fn run(mut self, mut channels: Channels) {
        debug!("orchestrator running");
        loop {
            let timer = self.timer;
            let deadline = timer.map(|(_, at)| at).unwrap_or_else(Instant::now);

            let event = tokio::select! {
                biased;
                intent = channels.intents.recv() => match intent {
                    Some(Intent::Start) => TurnEvent::StartRequested,
                    Some(Intent::Stop) => TurnEvent::StopRequested,
                    Some(Intent::Toggle) => match self.machine.state() {
                        OrchestratorState::Idle => TurnEvent::StartRequested,
                        _ => TurnEvent::StopRequested,
                    },
                    Some(Intent::Select(selection)) => {
                        info!(
                            response = %selection.response,
                            synthesis = %selection.synthesis,
                            "provider selection changed"
                        );
                        self.settings.selection = selection;
                        self.selection.send_replace(selection);
                        continue;
                    }
                    Some(Intent::Shutdown) | None => break,
                },
                Some(event) = channels.capture.recv() => TurnEvent::Capture(event),
                Some(event) = channels.results.recv() => event,
                _ = sleep_until(deadline), if timer.is_some() => {
                    self.timer = None;
                    match timer {
                        Some((token, _)) => TurnEvent::InactivityElapsed { token },
                        None => continue,
                    }
                }
            };

            self.process(event);
        }
        self.shutdown();
    }

    /// Feed `event` and everything it triggers through the machine.
    fn process(&mut self, event: TurnEvent) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            trace!(?event, "handling");
            for effect in self.machine.handle(event) {
                if let Some(follow_up) = self.apply(effect) {
                    queue.push_back(follow_up);
                }
            }
        }
        self.snapshot.send_replace(self.machine.snapshot());
    }

    /// Carry out one effect. Synchronous failures come back as a follow-up event.
    fn apply(&mut self, effect: Effect) -> Option<TurnEvent> {
        match effect {
            Effect::ArmCapture { token } => {
                let sink = CaptureSink::new(token, self.capture_tx.clone());
                if let Err(error) = self.capture.start(sink) {
                    return Some(TurnEvent::CaptureStartFailed { token, error });
                }
            }
            Effect::DisarmCapture => self.capture.stop(),
            Effect::StartInactivityTimer { token } => {
                self.timer = Some((token, Instant::now() + self.settings.inactivity_timeout));
            }
            Effect::CancelInactivityTimer => self.timer = None,
            Effect::Dispatch { token, prompt } => {
                let plan = match self.registry.plan(self.settings.selection) {
                    Ok(plan) => plan,
                    Err(error) => return Some(TurnEvent::DispatchFinished { token, result: Err(error) }),
                };
                debug!(%token, ?plan, "dispatching");
                let limit = self.settings.provider_timeout;
                let results = self.results_tx.clone();
                self.dispatch = Some(tokio::spawn(async move {
                    let result = plan.run(&prompt, limit).await;
                    if results.send(TurnEvent::DispatchFinished { token, result }).is_err() {
                        debug!(%token, "orchestrator gone before dispatch finished");
                    }
                }));
            }
            Effect::CancelDispatch => {
                if let Some(task) = self.dispatch.take() {
                    task.abort();
                }
            }
            Effect::Play { token, resource } => {
                debug!(%token, resource = %resource.describe(), "playing reply");
                let player = Arc::clone(&self.player);
                let results = self.results_tx.clone();
                self.playback = Some(tokio::spawn(async move {
                    let result = player.play(resource).await;
                    if results.send(TurnEvent::PlaybackFinished { token, result }).is_err() {
                        debug!(%token, "orchestrator gone before playback finished");
                    }
                }));
            }
            Effect::StopPlayback => {
                self.player.stop();
                if let Some(task) = self.playback.take() {
                    task.abort();
                }
            }
            Effect::StateChanged { from, to } => {
                if from == OrchestratorState::Listening {
                    self.timer = None;
                }
                info!(%from, %to, token = %self.machine.token(), "state changed");
                self.publish(OrchestratorEvent::StateChanged { from, to });
            }
            Effect::Notify(notice) => {
                match notice.severity {
                    Severity::Error => warn!(kind = ?notice.kind, "{}", notice.message),
                    Severity::Info => info!(kind = ?notice.kind, "{}", notice.message),
                }
                self.publish(OrchestratorEvent::Notice(notice));
            }
            Effect::TurnCommitted { user, assistant } => {
                debug!(turns = self.machine.history().len(), "turn committed");
                self.publish(OrchestratorEvent::TurnCommitted { user, assistant });
            }
        }
        None
    }

    fn publish(&self, event: OrchestratorEvent) {
        if self.events.send(event).is_err() {
            trace!("no event subscribers");
        }
    }

    fn shutdown(&mut self) {
        debug!("orchestrator shutting down");
        self.capture.stop();
        self.player.stop();
        for task in [self.dispatch.take(), self.playback.take()].into_iter().flatten() {
            task.abort();
        }
    }
}

impl OrchestratorHandle {
    async fn send(&self, intent: Intent) -> Result<()> {
        self.intents
            .send(intent)
            .await
            .map_err(|_| VoxturnError::Other("conversation has shut down".to_string()))
    }

    /// Begin listening. Ignored unless the conversation is idle.
    pub async fn request_start(&self) -> Result<()> {
        self.send(Intent::Start).await
    }

    /// Stop whatever is happening and go idle.
    pub async fn request_stop(&self) -> Result<()> {
        self.send(Intent::Stop).await
    }

    /// Start when idle, stop otherwise.
    pub async fn toggle(&self) -> Result<()> {
        self.send(Intent::Toggle).await
    }

    /// Choose backends for the next dispatch. A turn already in flight keeps its own.
    pub async fn set_selection(&self, selection: ProviderSelection) -> Result<()> {
        self.send(Intent::Select(selection)).await
    }

    pub fn state(&self) -> OrchestratorState {
        self.snapshot.borrow().state
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    pub fn selection(&self) -> ProviderSelection {
        *self.selection.borrow()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    /// Wait until the orchestrator reaches `state`.
    pub async fn wait_for(&self, state: OrchestratorState) -> Result<Snapshot> {
        let mut rx = self.snapshot.clone();
        let snapshot = rx
            .wait_for(|snapshot| snapshot.state == state)
            .await
            .map_err(|_| VoxturnError::Other("conversation has shut down".to_string()))?;
        Ok(snapshot.clone())
    }

    /// Stop the driver task and release capture and playback.
    pub async fn shutdown(&self) -> Result<()> {
        if self.send(Intent::Shutdown).await.is_err() {
            debug!("orchestrator already stopped");
        }
        let task = lock_unpoisoned(&self.task).take();
        if let Some(task) = task {
            task.await
                .map_err(|e| VoxturnError::Other(format!("orchestrator task failed: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ManualCapture;
    use crate::conversation::types::NoticeKind;
    use crate::playback::MockPlayer;
    use crate::providers::mock::{MockResponder, MockSynthesizer};
    use crate::providers::{ResponderKind, ResponseBackend, SynthesizerKind};

    fn registry() -> ProviderRegistry {
        ProviderRegistry::new()
            .with_responder(
                ResponderKind::Gemini,
                ResponseBackend::Turn(Arc::new(MockResponder::new("llm").with_response("OK"))),
            )
            .with_synthesizer(SynthesizerKind::SpeechApi, Arc::new(MockSynthesizer::new("tts")))
    }

    #[tokio::test]
    async fn test_start_and_stop_through_handle() {
        let capture = ManualCapture::new();
        let feed = capture.feed();
        let handle = TurnOrchestrator::spawn(
            Box::new(capture),
            registry(),
            Arc::new(MockPlayer::new()),
            OrchestratorSettings::default(),
        );

        handle.request_start().await.unwrap();
        handle.wait_for(OrchestratorState::Listening).await.unwrap();
        assert!(feed.is_armed());

        handle.request_stop().await.unwrap();
        let snapshot = handle.wait_for(OrchestratorState::Idle).await.unwrap();
        assert_eq!(snapshot.status_text, "Conversation stopped.");
        assert!(!feed.is_armed());

        handle.shutdown().await.unwrap();
        assert!(handle.request_start().await.is_err());
    }

    #[tokio::test]
    async fn test_toggle_flips_between_idle_and_listening() {
        let handle = TurnOrchestrator::spawn(
            Box::new(ManualCapture::new()),
            registry(),
            Arc::new(MockPlayer::new()),
            OrchestratorSettings::default(),
        );
        handle.toggle().await.unwrap();
        handle.wait_for(OrchestratorState::Listening).await.unwrap();
        handle.toggle().await.unwrap();
        handle.wait_for(OrchestratorState::Idle).await.unwrap();
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_selection_is_published() {
        let handle = TurnOrchestrator::spawn(
            Box::new(ManualCapture::new()),
            registry(),
            Arc::new(MockPlayer::new()),
            OrchestratorSettings::default(),
        );
        let selection = ProviderSelection {
            response: ResponderKind::Groq,
            synthesis: SynthesizerKind::Webhook,
        };
        handle.set_selection(selection).await.unwrap();
        handle.shutdown().await.unwrap();
        assert_eq!(handle.selection(), selection);
    }

    #[tokio::test]
    async fn test_unsupported_capture_returns_to_idle() {
        let handle = TurnOrchestrator::spawn(
            Box::new(ManualCapture::new().with_unsupported()),
            registry(),
            Arc::new(MockPlayer::new()),
            OrchestratorSettings::default(),
        );
        let mut events = handle.subscribe();
        handle.request_start().await.unwrap();

        let mut saw_notice = false;
        while let Ok(event) = events.recv().await {
            if let OrchestratorEvent::Notice(notice) = event {
                assert_eq!(notice.kind, NoticeKind::UnsupportedCapability);
                saw_notice = true;
                break;
            }
        }
        assert!(saw_notice);
        assert_eq!(handle.state(), OrchestratorState::Idle);
        handle.shutdown().await.unwrap();
    }
}
