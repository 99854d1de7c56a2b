//! The turn state machine.
//!
//! [`TurnMachine::handle`] consumes one event and returns the effects the
//! driver must carry out. It performs no I/O; timers, capture, providers and
//! playback are all owned by the driver.

use super::types::{
    ConversationHistory, ConversationTurn, Notice, NoticeKind, OrchestratorState, Snapshot,
    TurnToken,
};
use crate::capture::{CaptureEvent, CaptureEventKind};
use crate::error::VoxturnError;
use crate::playback::PlaybackOutcome;
use crate::providers::{AudioResource, Reply};
use tracing::{debug, warn};

/// Everything that can move the machine.
#[derive(Debug)]
pub enum TurnEvent {
    StartRequested,
    StopRequested,
    Capture(CaptureEvent),
    /// The capture adapter refused to start a session.
    CaptureStartFailed { token: TurnToken, error: VoxturnError },
    InactivityElapsed { token: TurnToken },
    DispatchFinished {
        token: TurnToken,
        result: Result<Reply, VoxturnError>,
    },
    PlaybackFinished {
        token: TurnToken,
        result: Result<PlaybackOutcome, VoxturnError>,
    },
}

/// Work for the driver, in the order it must be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ArmCapture { token: TurnToken },
    DisarmCapture,
    StartInactivityTimer { token: TurnToken },
    CancelInactivityTimer,
    Dispatch { token: TurnToken, prompt: String },
    CancelDispatch,
    Play { token: TurnToken, resource: AudioResource },
    StopPlayback,
    StateChanged {
        from: OrchestratorState,
        to: OrchestratorState,
    },
    Notify(Notice),
    TurnCommitted {
        user: ConversationTurn,
        assistant: ConversationTurn,
    },
}

#[derive(Debug, Default)]
pub struct TurnMachine {
    state: OrchestratorState,
    token: TurnToken,
    history: ConversationHistory,
    /// User transcript awaiting its answer. Committed only together with it.
    pending: Option<String>,
    last_transcript: Option<String>,
    status_text: Option<String>,
}

impl TurnMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn token(&self) -> TurnToken {
        self.token
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            status_text: self
                .status_text
                .clone()
                .unwrap_or_else(|| self.state.status_text().to_string()),
            last_transcript: self.last_transcript.clone(),
            turns: self.history.len(),
        }
    }

    pub fn handle(&mut self, event: TurnEvent) -> Vec<Effect> {
        let mut effects = Vec::new();
        match event {
            TurnEvent::StartRequested => self.on_start(&mut effects),
            TurnEvent::StopRequested => self.on_stop(&mut effects),
            TurnEvent::Capture(event) => {
                if self.accepts(event.token, OrchestratorState::Listening) {
                    self.on_capture(event.kind, &mut effects);
                }
            }
            TurnEvent::CaptureStartFailed { token, error } => {
                if self.accepts(token, OrchestratorState::Listening) {
                    let notice = match error {
                        VoxturnError::UnsupportedCapability { .. } => {
                            Notice::error(NoticeKind::UnsupportedCapability, error.to_string())
                        }
                        other => Notice::error(NoticeKind::CaptureError, other.to_string()),
                    };
                    self.leave_listening(&mut effects);
                    self.enter(OrchestratorState::Idle, &mut effects);
                    self.notify(notice, &mut effects);
                }
            }
            TurnEvent::InactivityElapsed { token } => {
                if self.accepts(token, OrchestratorState::Listening) {
                    effects.push(Effect::DisarmCapture);
                    self.enter(OrchestratorState::Idle, &mut effects);
                    self.notify(
                        Notice::info(
                            NoticeKind::InactivityTimeout,
                            "No speech for a while, conversation paused.",
                        ),
                        &mut effects,
                    );
                }
            }
            TurnEvent::DispatchFinished { token, result } => {
                if self.accepts(token, OrchestratorState::Dispatching) {
                    self.on_dispatch_finished(result, &mut effects);
                }
            }
            TurnEvent::PlaybackFinished { token, result } => {
                if self.accepts(token, OrchestratorState::Speaking) {
                    self.on_playback_finished(result, &mut effects);
                }
            }
        }
        effects
    }

    /// Whether an async result tagged `token` still belongs to the current turn.
    fn accepts(&self, token: TurnToken, expected: OrchestratorState) -> bool {
        let current = token == self.token && self.state == expected;
        if !current {
            debug!(
                %token,
                current = %self.token,
                state = %self.state,
                "dropping stale event"
            );
        }
        current
    }

    fn enter(&mut self, to: OrchestratorState, effects: &mut Vec<Effect>) {
        let from = self.state;
        self.state = to;
        self.token = self.token.next();
        self.status_text = None;
        effects.push(Effect::StateChanged { from, to });
    }

    fn notify(&mut self, notice: Notice, effects: &mut Vec<Effect>) {
        self.status_text = Some(notice.message.clone());
        effects.push(Effect::Notify(notice));
    }

    fn enter_listening(&mut self, effects: &mut Vec<Effect>) {
        self.enter(OrchestratorState::Listening, effects);
        effects.push(Effect::ArmCapture { token: self.token });
        effects.push(Effect::StartInactivityTimer { token: self.token });
    }

    fn leave_listening(&mut self, effects: &mut Vec<Effect>) {
        effects.push(Effect::CancelInactivityTimer);
        effects.push(Effect::DisarmCapture);
    }

    fn on_start(&mut self, effects: &mut Vec<Effect>) {
        if self.state != OrchestratorState::Idle {
            debug!(state = %self.state, "start rejected, conversation already running");
            return;
        }
        self.enter_listening(effects);
    }

    fn on_stop(&mut self, effects: &mut Vec<Effect>) {
        match self.state {
            OrchestratorState::Idle => return,
            OrchestratorState::Listening => self.leave_listening(effects),
            OrchestratorState::Dispatching => {
                self.pending = None;
                effects.push(Effect::CancelDispatch);
            }
            OrchestratorState::Speaking => effects.push(Effect::StopPlayback),
            OrchestratorState::Erroring => {}
        }
        self.enter(OrchestratorState::Idle, effects);
        self.notify(
            Notice::info(NoticeKind::Stopped, "Conversation stopped."),
            effects,
        );
    }

    fn on_capture(&mut self, kind: CaptureEventKind, effects: &mut Vec<Effect>) {
        match kind {
            CaptureEventKind::Finalized(text) => {
                let transcript = text.trim();
                if transcript.is_empty() {
                    debug!("discarding empty transcript");
                    return;
                }
                let prompt = self.history.build_prompt(transcript);
                self.pending = Some(transcript.to_string());
                self.last_transcript = Some(transcript.to_string());

                self.leave_listening(effects);
                self.enter(OrchestratorState::Dispatching, effects);
                effects.push(Effect::Dispatch {
                    token: self.token,
                    prompt,
                });
            }
            CaptureEventKind::Failed(kind) => {
                self.leave_listening(effects);
                self.enter(OrchestratorState::Idle, effects);
                self.notify(
                    Notice::error(NoticeKind::CaptureError, format!("Speech capture failed: {kind}")),
                    effects,
                );
            }
            CaptureEventKind::Ended => {
                self.leave_listening(effects);
                self.enter(OrchestratorState::Idle, effects);
                self.notify(
                    Notice::info(NoticeKind::CaptureEnded, "Speech capture ended."),
                    effects,
                );
            }
        }
    }

    fn on_dispatch_finished(&mut self, result: Result<Reply, VoxturnError>, effects: &mut Vec<Effect>) {
        let Some(transcript) = self.pending.take() else {
            debug!("dispatch finished without a pending transcript");
            return;
        };

        match result {
            Ok(reply) => {
                let user = ConversationTurn::user(transcript);
                let assistant = ConversationTurn::assistant(reply.text);
                self.history.commit(user.clone(), assistant.clone());
                effects.push(Effect::TurnCommitted { user, assistant });

                self.enter(OrchestratorState::Speaking, effects);
                effects.push(Effect::Play {
                    token: self.token,
                    resource: reply.audio,
                });
            }
            Err(error) => {
                let notice = if error.is_timeout() {
                    Notice::error(NoticeKind::ProviderTimeout, error.to_string())
                } else {
                    Notice::error(
                        NoticeKind::ProviderError,
                        format!("Could not get an answer: {error}"),
                    )
                };
                self.recover(notice, effects);
            }
        }
    }

    fn on_playback_finished(
        &mut self,
        result: Result<PlaybackOutcome, VoxturnError>,
        effects: &mut Vec<Effect>,
    ) {
        match result {
            Ok(PlaybackOutcome::Completed) => self.enter_listening(effects),
            // Something other than our own stop cut the reply short.
            Ok(PlaybackOutcome::Interrupted) => {
                warn!(token = %self.token, "playback interrupted outside a stop request");
                self.enter(OrchestratorState::Idle, effects);
                self.notify(
                    Notice::info(
                        NoticeKind::Stopped,
                        "Playback was interrupted, conversation stopped.",
                    ),
                    effects,
                );
            }
            Err(error) => self.recover(
                Notice::error(NoticeKind::PlaybackError, format!("Playback failed: {error}")),
                effects,
            ),
        }
    }

    /// Surface `notice` from `Erroring`, then resume listening. The notice
    /// stays as status text until the next transition.
    fn recover(&mut self, notice: Notice, effects: &mut Vec<Effect>) {
        let message = notice.message.clone();
        self.enter(OrchestratorState::Erroring, effects);
        self.notify(notice, effects);
        self.enter_listening(effects);
        self.status_text = Some(message);
    }
}
