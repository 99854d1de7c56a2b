//! JSON message protocol for IPC communication between CLI and daemon.
//!
//! One command per connection, one JSON object per line. `follow` keeps the
//! connection open and streams `event` responses until the client hangs up.

use crate::conversation::{OrchestratorEvent, OrchestratorState};
use crate::providers::{ResponderKind, SynthesizerKind};
use serde::{Deserialize, Serialize};

/// Commands sent by CLI to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Start listening
    Start,
    /// Stop the conversation, whatever it is doing
    Stop,
    /// Start when idle, stop otherwise
    Toggle,
    /// Get conversation status
    Status,
    /// Change backends for the next turn; omitted fields keep their value
    Select {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<ResponderKind>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        synthesis: Option<SynthesizerKind>,
    },
    /// Stream conversation events
    Follow,
    /// Shutdown the daemon
    Shutdown,
}

impl Command {
    /// Serialize command to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize command from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Responses sent by daemon to CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Command accepted
    Ok { message: String },
    /// Current conversation status
    Status {
        state: OrchestratorState,
        status_text: String,
        response_provider: ResponderKind,
        synthesis_provider: SynthesizerKind,
        turns: usize,
        version: String,
    },
    /// One streamed conversation event
    Event { event: OrchestratorEvent },
    /// Error occurred
    Error { message: String },
}

impl Response {
    pub fn ok(message: impl Into<String>) -> Self {
        Response::Ok {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }

    /// Serialize response to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize response from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
