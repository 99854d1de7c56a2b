//! In-process capture fed by typed lines or by tests.

use super::{CaptureErrorKind, CaptureEventKind, CaptureSink, SpeechCapture};
use crate::error::{Result, VoxturnError};
use crate::lock_unpoisoned;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Shared {
    sink: Option<CaptureSink>,
    unsupported: bool,
    starts: usize,
    stops: usize,
}

/// Capture adapter whose utterances come from a [`CaptureFeed`].
#[derive(Debug, Default)]
pub struct ManualCapture {
    shared: Arc<Mutex<Shared>>,
}

/// Producer side of a [`ManualCapture`]. Input is forwarded only while a
/// session is armed and dropped otherwise.
#[derive(Debug, Clone)]
pub struct CaptureFeed {
    shared: Arc<Mutex<Shared>>,
}

impl ManualCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `start` fail as if no recognizer existed.
    pub fn with_unsupported(self) -> Self {
        lock_unpoisoned(&self.shared).unsupported = true;
        self
    }

    pub fn feed(&self) -> CaptureFeed {
        CaptureFeed {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl SpeechCapture for ManualCapture {
    fn start(&mut self, sink: CaptureSink) -> Result<()> {
        let mut shared = lock_unpoisoned(&self.shared);
        if shared.unsupported {
            return Err(VoxturnError::UnsupportedCapability {
                capability: "speech recognition".to_string(),
            });
        }
        shared.sink = Some(sink);
        shared.starts += 1;
        Ok(())
    }

    fn stop(&mut self) {
        let mut shared = lock_unpoisoned(&self.shared);
        if shared.sink.take().is_some() {
            shared.stops += 1;
        }
    }
}

impl CaptureFeed {
    fn forward(&self, kind: CaptureEventKind, ends_session: bool) -> bool {
        let mut shared = lock_unpoisoned(&self.shared);
        let delivered = match &shared.sink {
            Some(sink) => sink.emit(kind),
            None => false,
        };
        if delivered && ends_session {
            shared.sink = None;
        }
        delivered
    }

    /// Deliver one finalized utterance. Returns false when nothing was listening.
    pub fn say(&self, text: &str) -> bool {
        self.forward(CaptureEventKind::Finalized(text.to_string()), false)
    }

    /// Fail the current session.
    pub fn fail(&self, kind: CaptureErrorKind) -> bool {
        self.forward(CaptureEventKind::Failed(kind), true)
    }

    /// End the current session from the engine side.
    pub fn end(&self) -> bool {
        self.forward(CaptureEventKind::Ended, true)
    }

    /// Make later `start` calls fail (or succeed again), as when the
    /// recognizer disappears mid-conversation.
    pub fn set_unsupported(&self, unsupported: bool) {
        lock_unpoisoned(&self.shared).unsupported = unsupported;
    }

    pub fn is_armed(&self) -> bool {
        lock_unpoisoned(&self.shared).sink.is_some()
    }

    /// Sessions started so far.
    pub fn starts(&self) -> usize {
        lock_unpoisoned(&self.shared).starts
    }

    /// Sessions stopped by the orchestrator so far.
    pub fn stops(&self) -> usize {
        lock_unpoisoned(&self.shared).stops
    }
}
