//! Command-line interface for voxturn
//!
//! Provides argument parsing using clap derive macros.

use crate::providers::{ResponderKind, SynthesizerKind};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Hands-free spoken conversations with pluggable AI backends
#[derive(Parser, Debug)]
#[command(
    name = "voxturn",
    version,
    about = "Hands-free spoken conversations with pluggable AI backends"
)]
pub struct Cli {
    /// Subcommand to execute (default: interactive conversation in this terminal)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug logs, -vv: trace logs)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Response backend (gemini, groq, hosted)
    #[arg(long, global = true, value_name = "PROVIDER", value_parser = parse_responder)]
    pub response: Option<ResponderKind>,

    /// Synthesis backend (speech_api, webhook)
    #[arg(long, global = true, value_name = "PROVIDER", value_parser = parse_synthesizer)]
    pub synthesis: Option<SynthesizerKind>,

    /// Pause after this much silence (default: 60s). Examples: 90s, 2m, 1m30s
    #[arg(long, value_name = "DURATION", value_parser = parse_timeout)]
    pub inactivity_timeout: Option<Duration>,
}

/// Parse a timeout string.
///
/// Bare numbers are seconds; anything else goes through `humantime`
/// (`30s`, `2m`, `1m30s`).
fn parse_timeout(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let duration = match s.parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(_) => humantime::parse_duration(s).map_err(|e| e.to_string())?,
    };
    if duration.as_secs() == 0 {
        return Err("timeout must be at least one second".to_string());
    }
    Ok(duration)
}

fn parse_responder(s: &str) -> Result<ResponderKind, String> {
    s.parse().map_err(|e: crate::error::VoxturnError| e.to_string())
}

fn parse_synthesizer(s: &str) -> Result<SynthesizerKind, String> {
    s.parse().map_err(|e: crate::error::VoxturnError| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the conversation in the background, controlled over a Unix socket
    Daemon {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/voxturn.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Start listening via IPC
    Start {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/voxturn.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Stop the conversation via IPC
    Stop {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/voxturn.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Toggle the conversation on/off via IPC
    Toggle {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/voxturn.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Get daemon status via IPC
    Status {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/voxturn.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Switch backends for the next turn (use with --response / --synthesis)
    Select {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/voxturn.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Follow daemon events (state changes, notices, committed turns)
    Follow {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/voxturn.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Ask the daemon to exit
    Shutdown {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/voxturn.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// List backends and whether they are configured
    Providers,

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Dump a commented configuration template
    Dump,
    /// Show the effective configuration (API keys masked)
    Show,
}
