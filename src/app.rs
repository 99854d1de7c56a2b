//! Interactive conversation entry point.
//!
//! Wires the configured backends, capture and player into a
//! [`TurnOrchestrator`] and drives it from the terminal: typed lines stand
//! in for speech unless an external recognizer is configured.

use crate::capture::{CaptureFeed, ManualCapture, ProcessCapture, SpeechCapture};
use crate::config::Config;
use crate::conversation::{OrchestratorHandle, OrchestratorSettings, TurnOrchestrator};
use crate::error::Result;
use crate::output::{clear_line, render_event};
use crate::playback::CommandPlayer;
use crate::providers::{ProviderRegistry, ProviderSelection, ResponderKind, SynthesizerKind};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::debug;

/// One line typed at the interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Start,
    Stop,
    Status,
    Quit,
    Help,
    Use(String),
    Speech(String),
    Unknown(String),
    Empty,
}

impl Input {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Input::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Input::Speech(line.to_string());
        };
        let (name, rest) = command
            .split_once(char::is_whitespace)
            .map(|(name, rest)| (name, rest.trim()))
            .unwrap_or((command, ""));
        match name {
            "start" => Input::Start,
            "stop" => Input::Stop,
            "status" => Input::Status,
            "quit" | "exit" => Input::Quit,
            "help" => Input::Help,
            "use" if !rest.is_empty() => Input::Use(rest.to_string()),
            _ => Input::Unknown(line.to_string()),
        }
    }
}

const HELP: &str = "\
Commands:
  /start        start listening
  /stop         stop the conversation
  /status       show state and backends
  /use NAME     switch backend for the next turn (gemini, groq, hosted, speech_api, webhook)
  /quit         leave
Anything else is spoken to the assistant while listening.";

/// Run a conversation in this terminal until `/quit` or end of input.
pub async fn run_conversation_command(config: Config, quiet: bool) -> Result<()> {
    let registry = ProviderRegistry::from_config(&config)?;
    let player = CommandPlayer::from_config(&config.playback);

    let (capture, feed): (Box<dyn SpeechCapture>, Option<CaptureFeed>) =
        if config.capture.command.trim().is_empty() {
            let manual = ManualCapture::new();
            let feed = manual.feed();
            (Box::new(manual), Some(feed))
        } else {
            let process = ProcessCapture::from_config(&config.capture, &config.conversation.locale);
            (Box::new(process), None)
        };

    let conversation = TurnOrchestrator::spawn(
        capture,
        registry.clone(),
        Arc::new(player),
        OrchestratorSettings::from_config(&config),
    );

    let renderer = tokio::spawn(render_events(conversation.subscribe()));

    if !quiet {
        let selection = conversation.selection();
        eprintln!(
            "voxturn {} using {} + {}. Type /help for commands.",
            crate::version_string(),
            selection.response,
            selection.synthesis
        );
        if feed.is_none() {
            eprintln!("Listening through: {}", config.capture.command);
        }
    }

    conversation.request_start().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Input::parse(&line) {
            Input::Empty => {}
            Input::Quit => break,
            Input::Start => conversation.request_start().await?,
            Input::Stop => conversation.request_stop().await?,
            Input::Help => eprintln!("{HELP}"),
            Input::Status => print_status(&conversation),
            Input::Use(name) => switch_backend(&conversation, &registry, &name).await?,
            Input::Unknown(line) => eprintln!("Unknown command: {line} (try /help)"),
            Input::Speech(text) => match &feed {
                Some(feed) => {
                    if !feed.say(&text) {
                        eprintln!("Not listening right now ({}).", conversation.state());
                    }
                }
                None => eprintln!("Speech comes from the recognizer; typed text is ignored."),
            },
        }
    }

    conversation.shutdown().await?;
    if let Err(e) = renderer.await {
        debug!("event renderer ended abnormally: {e}");
    }
    clear_line();
    Ok(())
}

async fn render_events(mut events: broadcast::Receiver<crate::conversation::OrchestratorEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => render_event(&event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "renderer fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_status(conversation: &OrchestratorHandle) {
    let snapshot = conversation.snapshot();
    let selection = conversation.selection();
    eprintln!("State:    {} ({})", snapshot.state, snapshot.status_text);
    eprintln!("Backends: {} + {}", selection.response, selection.synthesis);
    eprintln!("Turns:    {}", snapshot.turns);
    if let Some(transcript) = snapshot.last_transcript {
        eprintln!("Heard:    {transcript}");
    }
}

/// Resolve `name` as either backend kind and apply it to the next turn.
async fn switch_backend(
    conversation: &OrchestratorHandle,
    registry: &ProviderRegistry,
    name: &str,
) -> Result<()> {
    let mut selection = conversation.selection();
    match (
        name.parse::<ResponderKind>(),
        name.parse::<SynthesizerKind>(),
    ) {
        (Ok(response), _) => selection.response = response,
        (_, Ok(synthesis)) => selection.synthesis = synthesis,
        (Err(e), Err(_)) => {
            eprintln!("{e}");
            return Ok(());
        }
    }
    if let Err(e) = registry.plan(selection) {
        eprintln!("Cannot switch: {e}");
        return Ok(());
    }
    conversation.set_selection(selection).await?;
    let ProviderSelection {
        response,
        synthesis,
    } = selection;
    eprintln!("Next turn uses {response} + {synthesis}.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_speech() {
        assert_eq!(
            Input::parse("  what time is it? "),
            Input::Speech("what time is it?".to_string())
        );
    }

    #[test]
    fn slash_commands() {
        assert_eq!(Input::parse("/start"), Input::Start);
        assert_eq!(Input::parse("/stop"), Input::Stop);
        assert_eq!(Input::parse("/status"), Input::Status);
        assert_eq!(Input::parse("/quit"), Input::Quit);
        assert_eq!(Input::parse("/exit"), Input::Quit);
        assert_eq!(Input::parse("/help"), Input::Help);
        assert_eq!(Input::parse("/use  groq "), Input::Use("groq".to_string()));
    }

    #[test]
    fn blank_and_unknown_lines() {
        assert_eq!(Input::parse("   "), Input::Empty);
        assert_eq!(Input::parse("/use"), Input::Unknown("/use".to_string()));
        assert_eq!(
            Input::parse("/dance now"),
            Input::Unknown("/dance now".to_string())
        );
    }
}
