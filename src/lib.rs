//! voxturn - Hands-free spoken conversations
//!
//! Listen, ask a language model, speak the answer, listen again.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod capture;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod conversation;
#[cfg(feature = "http-providers")]
pub mod daemon;
pub mod defaults;
pub mod error;
pub mod ipc;
pub mod logging;
pub mod output;
pub mod playback;
pub mod providers;

// Composition root for the interactive terminal conversation
#[cfg(feature = "http-providers")]
pub mod app;

use std::sync::{Mutex, MutexGuard, PoisonError};

// Seams (capture → respond → synthesize → play)
pub use capture::{CaptureSink, SpeechCapture};
pub use playback::{PlaybackEngine, PlaybackOutcome};
pub use providers::{AudioResource, CombinedResponder, Reply, Synthesizer, TurnResponder};

// Orchestration
pub use conversation::{
    OrchestratorEvent, OrchestratorHandle, OrchestratorSettings, OrchestratorState,
    TurnMachine, TurnOrchestrator,
};

// Error handling
pub use error::{Result, VoxturnError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

/// Lock `mutex`, recovering the data if a holder panicked.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_contains_plus_when_git_hash_present() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            let hash_part = ver.split('+').nth(1).unwrap_or("");
            assert_eq!(hash_part.len(), 7, "Git hash should be 7 chars, got: {}", ver);
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }

    #[test]
    fn lock_unpoisoned_recovers_after_panic() {
        let mutex = std::sync::Arc::new(Mutex::new(1));
        let poisoner = std::sync::Arc::clone(&mutex);
        let joined = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();
        assert!(joined.is_err());
        assert!(mutex.is_poisoned());
        assert_eq!(*lock_unpoisoned(&mutex), 1);
    }
}
