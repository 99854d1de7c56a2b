//! Capture through an external recognizer process.
//!
//! The recognizer is started once per session with the locale in
//! `VOXTURN_LOCALE` (and substituted for `{locale}` in its arguments). It must
//! print one finalized utterance per stdout line, or `error: <kind>` on
//! failure. Exiting ends the session.

use super::{CaptureErrorKind, CaptureEventKind, CaptureSink, SpeechCapture, parse_error_kind};
use crate::config::CaptureConfig;
use crate::defaults;
use crate::error::{Result, VoxturnError};
use crate::lock_unpoisoned;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::oneshot;
use tracing::debug;

const ERROR_PREFIX: &str = "error:";

/// The running recognizer. Shared so `stop` can kill it without waiting on
/// the session task.
type SharedChild = Arc<Mutex<Option<Child>>>;

struct Session {
    live: Arc<AtomicBool>,
    child: SharedChild,
    stop_tx: Option<oneshot::Sender<()>>,
}

pub struct ProcessCapture {
    command: String,
    args: Vec<String>,
    locale: String,
    session: Option<Session>,
}

impl ProcessCapture {
    pub fn new(command: &str, args: Vec<String>, locale: &str) -> Self {
        Self {
            command: command.to_string(),
            args,
            locale: locale.to_string(),
            session: None,
        }
    }

    pub fn from_config(config: &CaptureConfig, locale: &str) -> Self {
        Self::new(&config.command, config.args.clone(), locale)
    }

    fn resolved_args(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(defaults::LOCALE_PLACEHOLDER, &self.locale))
            .collect()
    }

    fn spawn(&self) -> Result<Child> {
        let unsupported = || VoxturnError::UnsupportedCapability {
            capability: format!("speech recognition ({})", self.command),
        };
        if self.command.trim().is_empty() {
            return Err(unsupported());
        }

        Command::new(&self.command)
            .args(self.resolved_args())
            .env(defaults::LOCALE_ENV, &self.locale)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => unsupported(),
                _ => VoxturnError::Capture {
                    message: format!("Failed to start recognizer '{}': {e}", self.command),
                },
            })
    }
}

/// What a single stdout line means.
fn classify_line(line: &str) -> Option<CaptureEventKind> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.strip_prefix(ERROR_PREFIX) {
        Some(kind) => Some(CaptureEventKind::Failed(parse_error_kind(kind))),
        None => Some(CaptureEventKind::Finalized(line.to_string())),
    }
}

/// Send SIGKILL to the recognizer if it is still ours. Returns at once; the
/// dropped child is reaped by tokio.
fn kill_now(child: &SharedChild) {
    if let Some(mut child) = lock_unpoisoned(child).take()
        && let Err(e) = child.start_kill()
    {
        debug!("recognizer already gone: {e}");
    }
}

async fn run_session(
    stdout: ChildStdout,
    child: SharedChild,
    sink: CaptureSink,
    live: Arc<AtomicBool>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut lines = BufReader::new(stdout).lines();

    loop {
        tokio::select! {
            _ = &mut stop_rx => {
                kill_now(&child);
                return;
            }
            line = lines.next_line() => {
                let kind = match line {
                    Ok(Some(line)) => match classify_line(&line) {
                        Some(kind) => kind,
                        None => continue,
                    },
                    Ok(None) => break,
                    Err(e) => CaptureEventKind::Failed(CaptureErrorKind::Engine(e.to_string())),
                };
                let ends = !matches!(kind, CaptureEventKind::Finalized(_));
                if !live.load(Ordering::SeqCst) || !sink.emit(kind) || ends {
                    kill_now(&child);
                    return;
                }
            }
        }
    }

    // stdout closed; a missing child means `stop` already killed it
    let exited = lock_unpoisoned(&child).take();
    let Some(mut exited) = exited else {
        return;
    };
    let status = tokio::select! {
        _ = &mut stop_rx => return,
        status = exited.wait() => status,
    };
    let outcome = match status {
        Ok(status) if status.success() => CaptureEventKind::Ended,
        Ok(status) => CaptureEventKind::Failed(CaptureErrorKind::Engine(format!(
            "recognizer exited with {status}"
        ))),
        Err(e) => CaptureEventKind::Failed(CaptureErrorKind::Engine(e.to_string())),
    };
    if live.load(Ordering::SeqCst) {
        sink.emit(outcome);
    }
}

impl SpeechCapture for ProcessCapture {
    fn start(&mut self, sink: CaptureSink) -> Result<()> {
        // the previous recognizer is killed before the next one spawns
        self.stop();

        let mut child = self.spawn()?;
        let Some(stdout) = child.stdout.take() else {
            return Err(VoxturnError::Capture {
                message: format!("recognizer '{}' has no stdout", self.command),
            });
        };
        debug!(command = %self.command, token = %sink.token(), "recognizer started");

        let live = Arc::new(AtomicBool::new(true));
        let child = Arc::new(Mutex::new(Some(child)));
        let (stop_tx, stop_rx) = oneshot::channel();
        tokio::spawn(run_session(
            stdout,
            Arc::clone(&child),
            sink,
            Arc::clone(&live),
            stop_rx,
        ));
        self.session = Some(Session {
            live,
            child,
            stop_tx: Some(stop_tx),
        });
        Ok(())
    }

    fn stop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.live.store(false, Ordering::SeqCst);
        kill_now(&session.child);
        if let Some(stop_tx) = session.stop_tx.take()
            && stop_tx.send(()).is_err()
        {
            debug!("recognizer session had already finished");
        }
    }
}

impl Drop for ProcessCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
