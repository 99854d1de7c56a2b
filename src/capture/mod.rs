//! Speech capture adapters.
//!
//! An adapter runs at most one capture session at a time. Every event it emits
//! is stamped with the token the session was started with, so the orchestrator
//! can drop anything that was already queued when the session was stopped.

pub mod manual;
pub mod process;

pub use manual::{CaptureFeed, ManualCapture};
pub use process::ProcessCapture;

use crate::conversation::TurnToken;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// Why a capture session failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum CaptureErrorKind {
    /// Microphone access was refused.
    NotAllowed,
    /// No audio input device could be opened.
    AudioCapture,
    /// The recognizer needed a network service and could not reach it.
    Network,
    /// Any other engine failure.
    Engine(String),
}

impl fmt::Display for CaptureErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureErrorKind::NotAllowed => f.write_str("microphone access was denied"),
            CaptureErrorKind::AudioCapture => f.write_str("no audio input available"),
            CaptureErrorKind::Network => f.write_str("recognizer could not reach its service"),
            CaptureErrorKind::Engine(message) => write!(f, "recognizer failed: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEventKind {
    /// One recognized utterance, final (no interim results are ever emitted).
    Finalized(String),
    Failed(CaptureErrorKind),
    /// The engine ended the session on its own.
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureEvent {
    pub token: TurnToken,
    pub kind: CaptureEventKind,
}

/// Where an adapter sends its events.
#[derive(Debug, Clone)]
pub struct CaptureSink {
    token: TurnToken,
    tx: mpsc::UnboundedSender<CaptureEvent>,
}

impl CaptureSink {
    pub fn new(token: TurnToken, tx: mpsc::UnboundedSender<CaptureEvent>) -> Self {
        Self { token, tx }
    }

    pub fn token(&self) -> TurnToken {
        self.token
    }

    /// Forward one event. Returns false once the receiver is gone.
    pub fn emit(&self, kind: CaptureEventKind) -> bool {
        self.tx
            .send(CaptureEvent {
                token: self.token,
                kind,
            })
            .is_ok()
    }

    pub fn finalized(&self, text: impl Into<String>) -> bool {
        self.emit(CaptureEventKind::Finalized(text.into()))
    }

    pub fn failed(&self, kind: CaptureErrorKind) -> bool {
        self.emit(CaptureEventKind::Failed(kind))
    }
}

/// Continuous speech recognition in a fixed locale.
pub trait SpeechCapture: Send {
    /// Begin a session. Fails with `UnsupportedCapability` when no recognizer
    /// is available; any session still running is stopped first.
    fn start(&mut self, sink: CaptureSink) -> Result<()>;

    /// End the current session. No `Finalized` event for it is emitted afterwards.
    fn stop(&mut self);
}

/// Map a recognizer's error line (`error: <kind>`) to an error kind.
///
/// Recognizers report failures on stdout using the Web Speech API error names.
pub fn parse_error_kind(raw: &str) -> CaptureErrorKind {
    match raw.trim() {
        "not-allowed" | "service-not-allowed" => CaptureErrorKind::NotAllowed,
        "audio-capture" => CaptureErrorKind::AudioCapture,
        "network" => CaptureErrorKind::Network,
        other => CaptureErrorKind::Engine(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_kind() {
        assert_eq!(parse_error_kind("not-allowed"), CaptureErrorKind::NotAllowed);
        assert_eq!(parse_error_kind(" network "), CaptureErrorKind::Network);
        assert_eq!(parse_error_kind("audio-capture"), CaptureErrorKind::AudioCapture);
        assert_eq!(
            parse_error_kind("aborted"),
            CaptureErrorKind::Engine("aborted".to_string())
        );
    }

    #[test]
    fn test_sink_stamps_token() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = CaptureSink::new(TurnToken::new(7), tx);

        assert!(sink.finalized("olá"));
        let event = rx.try_recv().unwrap();
        assert_eq!(event.token, TurnToken::new(7));
        assert_eq!(event.kind, CaptureEventKind::Finalized("olá".to_string()));
    }

    #[test]
    fn test_sink_reports_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = CaptureSink::new(TurnToken::new(1), tx);
        drop(rx);
        assert!(!sink.failed(CaptureErrorKind::Network));
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(
            CaptureErrorKind::Engine("boom".into()).to_string(),
            "recognizer failed: boom"
        );
    }
}
