//! Default configuration constants for voxturn.
//!
//! Shared between the config file layer, the CLI and the orchestrator so the
//! same numbers are used everywhere.

/// Seconds of silence in `Listening` before the conversation returns to idle.
pub const INACTIVITY_TIMEOUT_SECS: u64 = 60;

/// Upper bound for a single provider call (response or synthesis).
pub const PROVIDER_TIMEOUT_SECS: u64 = 30;

/// Locale handed to the speech recognizer.
pub const LOCALE: &str = "pt-BR";

/// Environment variable carrying the locale into recognizer processes.
pub const LOCALE_ENV: &str = "VOXTURN_LOCALE";

/// Placeholder in recognizer arguments replaced by the configured locale.
pub const LOCALE_PLACEHOLDER: &str = "{locale}";

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const GEMINI_MODEL: &str = "gemini-pro";

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const GROQ_MODEL: &str = "llama3-8b-8192";

pub const HOSTED_URL: &str = "https://bff-iarahub.vercel.app/api/ia/openai";

/// voxturn's own convention for a hosted endpoint to return the reply text next
/// to the audio. The stock endpoint sends audio only.
pub const HOSTED_TEXT_HEADER: &str = "x-response-text";

pub const SPEECH_API_BASE_URL: &str = "https://api.openai.com/v1";
pub const SPEECH_API_MODEL: &str = "tts-1";
pub const SPEECH_API_VOICE: &str = "nova";
pub const SPEECH_API_FORMAT: &str = "mp3";

pub const WEBHOOK_URL: &str = "https://bff-iarahub.vercel.app/api/webhook";

/// Default audio player. Reads a URL argument or stdin when given `-`.
pub const PLAYER_COMMAND: &str = "ffplay";
pub const PLAYER_ARGS: &[&str] = &["-nodisp", "-autoexit", "-loglevel", "quiet"];

/// Capacity of the orchestrator's event broadcast.
pub const EVENT_BUFFER: usize = 64;
