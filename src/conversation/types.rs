//! Conversation data types shared by the machine, the driver and the surfaces.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One utterance in the conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    role: Role,
    content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Ordered transcript of committed turns, kept for prompt context only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user turn and its answer together.
    pub fn commit(&mut self, user: ConversationTurn, assistant: ConversationTurn) {
        self.turns.push(user);
        self.turns.push(assistant);
    }

    /// Prior turn contents in order, then `transcript`, one per line.
    /// Turns with no text (a hosted reply that only carried audio) are skipped.
    pub fn build_prompt(&self, transcript: &str) -> String {
        self.turns
            .iter()
            .map(ConversationTurn::content)
            .filter(|content| !content.trim().is_empty())
            .chain(std::iter::once(transcript))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    #[default]
    Idle,
    Listening,
    Dispatching,
    Speaking,
    Erroring,
}

impl OrchestratorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestratorState::Idle => "idle",
            OrchestratorState::Listening => "listening",
            OrchestratorState::Dispatching => "dispatching",
            OrchestratorState::Speaking => "speaking",
            OrchestratorState::Erroring => "erroring",
        }
    }

    /// Status line shown while sitting in this state.
    pub fn status_text(&self) -> &'static str {
        match self {
            OrchestratorState::Idle => "Ready. Start a conversation to talk.",
            OrchestratorState::Listening => "Listening...",
            OrchestratorState::Dispatching => "Thinking...",
            OrchestratorState::Speaking => "Speaking...",
            OrchestratorState::Erroring => "Something went wrong.",
        }
    }
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag carried by every asynchronous result. Advances on each state change,
/// so anything scheduled under an older token is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TurnToken(u64);

impl TurnToken {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for TurnToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// The user stopped the conversation.
    Stopped,
    /// Nobody spoke for the whole inactivity window.
    InactivityTimeout,
    /// The recognizer ended its session on its own.
    CaptureEnded,
    CaptureError,
    UnsupportedCapability,
    ProviderError,
    ProviderTimeout,
    PlaybackError,
}

/// A user-visible notification. Every failure produces exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub severity: Severity,
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn info(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            kind,
            message: message.into(),
        }
    }

    pub fn error(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            message: message.into(),
        }
    }
}

/// What the presentation layer observes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    StateChanged {
        from: OrchestratorState,
        to: OrchestratorState,
    },
    Notice(Notice),
    TurnCommitted {
        user: ConversationTurn,
        assistant: ConversationTurn,
    },
}

/// Point-in-time view of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: OrchestratorState,
    pub status_text: String,
    pub last_transcript: Option<String>,
    pub turns: usize,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            state: OrchestratorState::Idle,
            status_text: OrchestratorState::Idle.status_text().to_string(),
            last_transcript: None,
            turns: 0,
        }
    }
}
