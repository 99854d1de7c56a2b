use crate::defaults;
use crate::error::{Result, VoxturnError};
use crate::providers::{ProviderSelection, ResponderKind, SynthesizerKind};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub conversation: ConversationConfig,
    pub providers: ProviderSelection,
    pub gemini: GeminiConfig,
    pub groq: GroqConfig,
    pub hosted: HostedConfig,
    pub speech_api: SpeechApiConfig,
    pub webhook: WebhookConfig,
    pub capture: CaptureConfig,
    pub playback: PlaybackConfig,
}

/// Turn-taking behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConversationConfig {
    pub locale: String,
    pub inactivity_timeout_secs: u64,
    pub provider_timeout_secs: u64,
}

/// LLM-A: Google Gemini
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeminiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

/// LLM-B: Groq (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GroqConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

/// Hosted assistant that answers with ready-made audio
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HostedConfig {
    pub url: String,
}

/// TTS-A: OpenAI-compatible speech endpoint returning audio bytes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeechApiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub voice: String,
    pub format: String,
}

/// TTS-B: webhook returning a media URL
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebhookConfig {
    pub url: String,
}

/// External speech recognizer. Empty command means typed input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct CaptureConfig {
    pub command: String,
    pub args: Vec<String>,
}

/// External audio player
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackConfig {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            locale: defaults::LOCALE.to_string(),
            inactivity_timeout_secs: defaults::INACTIVITY_TIMEOUT_SECS,
            provider_timeout_secs: defaults::PROVIDER_TIMEOUT_SECS,
        }
    }
}

impl ConversationConfig {
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: defaults::GEMINI_MODEL.to_string(),
            base_url: defaults::GEMINI_BASE_URL.to_string(),
        }
    }
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: defaults::GROQ_MODEL.to_string(),
            base_url: defaults::GROQ_BASE_URL.to_string(),
        }
    }
}

impl Default for HostedConfig {
    fn default() -> Self {
        Self {
            url: defaults::HOSTED_URL.to_string(),
        }
    }
}

impl Default for SpeechApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: defaults::SPEECH_API_BASE_URL.to_string(),
            model: defaults::SPEECH_API_MODEL.to_string(),
            voice: defaults::SPEECH_API_VOICE.to_string(),
            format: defaults::SPEECH_API_FORMAT.to_string(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: defaults::WEBHOOK_URL.to_string(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            command: defaults::PLAYER_COMMAND.to_string(),
            args: defaults::PLAYER_ARGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn has_value(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist.
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if e.downcast_ref::<std::io::Error>()
                    .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound) =>
            {
                Ok(Self::default())
            }
            Err(e) => Err(e.context(format!("Failed to load config from {}", path.display()))),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXTURN_RESPONSE_PROVIDER → providers.response
    /// - VOXTURN_SYNTHESIS_PROVIDER → providers.synthesis
    /// - VOXTURN_LOCALE → conversation.locale
    /// - GEMINI_API_KEY → gemini.api_key
    /// - GROQ_API_KEY → groq.api_key
    /// - SPEECH_API_KEY → speech_api.api_key
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(value) = env_value("VOXTURN_RESPONSE_PROVIDER") {
            match value.parse::<ResponderKind>() {
                Ok(kind) => self.providers.response = kind,
                Err(e) => tracing::warn!(error = %e, "ignoring VOXTURN_RESPONSE_PROVIDER"),
            }
        }

        if let Some(value) = env_value("VOXTURN_SYNTHESIS_PROVIDER") {
            match value.parse::<SynthesizerKind>() {
                Ok(kind) => self.providers.synthesis = kind,
                Err(e) => tracing::warn!(error = %e, "ignoring VOXTURN_SYNTHESIS_PROVIDER"),
            }
        }

        if let Some(locale) = env_value(defaults::LOCALE_ENV) {
            self.conversation.locale = locale;
        }

        if let Some(key) = env_value("GEMINI_API_KEY") {
            self.gemini.api_key = Some(key);
        }

        if let Some(key) = env_value("GROQ_API_KEY") {
            self.groq.api_key = Some(key);
        }

        if let Some(key) = env_value("SPEECH_API_KEY") {
            self.speech_api.api_key = Some(key);
        }

        self
    }

    /// Check that timeouts are usable and the selected backends have what they need.
    pub fn validate(&self) -> Result<()> {
        if self.conversation.inactivity_timeout_secs == 0 {
            return Err(VoxturnError::ConfigInvalidValue {
                key: "conversation.inactivity_timeout_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.conversation.provider_timeout_secs == 0 {
            return Err(VoxturnError::ConfigInvalidValue {
                key: "conversation.provider_timeout_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        match self.providers.response {
            ResponderKind::Gemini if !has_value(&self.gemini.api_key) => {
                return Err(missing_key("gemini.api_key", "GEMINI_API_KEY"));
            }
            ResponderKind::Groq if !has_value(&self.groq.api_key) => {
                return Err(missing_key("groq.api_key", "GROQ_API_KEY"));
            }
            ResponderKind::Hosted if self.hosted.url.trim().is_empty() => {
                return Err(VoxturnError::ConfigInvalidValue {
                    key: "hosted.url".to_string(),
                    message: "must not be empty".to_string(),
                });
            }
            _ => {}
        }

        // The combined responder brings its own audio.
        if self.providers.response.is_combined() {
            return Ok(());
        }

        match self.providers.synthesis {
            SynthesizerKind::SpeechApi if !has_value(&self.speech_api.api_key) => {
                Err(missing_key("speech_api.api_key", "SPEECH_API_KEY"))
            }
            SynthesizerKind::Webhook if self.webhook.url.trim().is_empty() => {
                Err(VoxturnError::ConfigInvalidValue {
                    key: "webhook.url".to_string(),
                    message: "must not be empty".to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Copy of the configuration with credentials masked, for display.
    pub fn redacted(&self) -> Self {
        fn mask(key: &Option<String>) -> Option<String> {
            key.as_ref().map(|_| "********".to_string())
        }

        let mut config = self.clone();
        config.gemini.api_key = mask(&self.gemini.api_key);
        config.groq.api_key = mask(&self.groq.api_key);
        config.speech_api.api_key = mask(&self.speech_api.api_key);
        config
    }

    /// Render as TOML with credentials masked.
    pub fn to_display_toml(&self) -> Result<String> {
        toml::to_string_pretty(&self.redacted()).map_err(|e| VoxturnError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Commented template containing every default value.
    pub fn dump_template() -> Result<String> {
        let body = toml::to_string_pretty(&Config::default()).map_err(|e| {
            VoxturnError::ConfigParse {
                message: e.to_string(),
            }
        })?;
        Ok(format!(
            "# voxturn configuration\n\
             # API keys may also come from GEMINI_API_KEY, GROQ_API_KEY and SPEECH_API_KEY.\n\n{body}"
        ))
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxturn/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("voxturn")
            .join("config.toml")
    }
}

fn missing_key(key: &str, env: &str) -> VoxturnError {
    VoxturnError::ConfigInvalidValue {
        key: key.to_string(),
        message: format!("required by the selected provider (or set {env})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_voxturn_env() {
        for key in [
            "VOXTURN_RESPONSE_PROVIDER",
            "VOXTURN_SYNTHESIS_PROVIDER",
            "VOXTURN_LOCALE",
            "GEMINI_API_KEY",
            "GROQ_API_KEY",
            "SPEECH_API_KEY",
        ] {
            remove_env(key);
        }
    }

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.conversation.locale, "pt-BR");
        assert_eq!(config.conversation.inactivity_timeout_secs, 60);
        assert_eq!(config.conversation.provider_timeout_secs, 30);
        assert_eq!(config.providers.response, ResponderKind::Gemini);
        assert_eq!(config.providers.synthesis, SynthesizerKind::SpeechApi);
        assert_eq!(config.gemini.model, "gemini-pro");
        assert_eq!(config.groq.model, "llama3-8b-8192");
        assert!(config.capture.command.is_empty());
        assert_eq!(config.playback.command, "ffplay");
        assert_eq!(
            config.conversation.inactivity_timeout(),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_load_from_toml_file() {
        let temp_file = write_temp(
            r#"
            [conversation]
            locale = "en-US"
            inactivity_timeout_secs = 90

            [providers]
            response = "hosted"
            synthesis = "webhook"

            [groq]
            api_key = "gsk-test"
            model = "llama3-70b"

            [capture]
            command = "recognize"
            args = ["--lang", "{locale}"]
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.conversation.locale, "en-US");
        assert_eq!(config.conversation.inactivity_timeout_secs, 90);
        assert_eq!(config.conversation.provider_timeout_secs, 30);
        assert_eq!(config.providers.response, ResponderKind::Hosted);
        assert_eq!(config.providers.synthesis, SynthesizerKind::Webhook);
        assert_eq!(config.groq.api_key.as_deref(), Some("gsk-test"));
        assert_eq!(config.groq.model, "llama3-70b");
        assert_eq!(config.capture.command, "recognize");
        assert_eq!(config.capture.args, vec!["--lang", "{locale}"]);
    }

    #[test]
    fn test_unknown_provider_name_is_rejected() {
        let temp_file = write_temp(
            r#"
            [providers]
            response = "clippy"
        "#,
        );
        assert!(Config::load(temp_file.path()).is_err());
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let temp_file = write_temp("[conversation\nlocale = \"broken");
        assert!(Config::load(temp_file.path()).is_err());
        assert!(Config::load_or_default(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_voxturn_config_12345.toml");
        let config = Config::load_or_default(missing_path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_voxturn_env();

        set_env("VOXTURN_RESPONSE_PROVIDER", "groq");
        set_env("VOXTURN_SYNTHESIS_PROVIDER", "webhook");
        set_env("VOXTURN_LOCALE", "en-GB");
        set_env("GROQ_API_KEY", "gsk-env");

        let config = Config::default().with_env_overrides();

        assert_eq!(config.providers.response, ResponderKind::Groq);
        assert_eq!(config.providers.synthesis, SynthesizerKind::Webhook);
        assert_eq!(config.conversation.locale, "en-GB");
        assert_eq!(config.groq.api_key.as_deref(), Some("gsk-env"));

        clear_voxturn_env();
    }

    #[test]
    fn test_env_override_empty_or_invalid_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_voxturn_env();

        set_env("VOXTURN_RESPONSE_PROVIDER", "nonsense");
        set_env("GEMINI_API_KEY", "");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.providers.response, ResponderKind::Gemini);
        assert_eq!(config.gemini.api_key, None);

        clear_voxturn_env();
    }

    #[test]
    fn test_validate_requires_key_for_selected_responder() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("gemini.api_key"));

        let mut config = Config::default();
        config.gemini.api_key = Some("key".to_string());
        config.speech_api.api_key = Some("key".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_skips_synthesis_for_combined_responder() {
        let mut config = Config::default();
        config.providers.response = ResponderKind::Hosted;
        config.speech_api.api_key = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let mut config = Config::default();
        config.providers.response = ResponderKind::Hosted;
        config.conversation.inactivity_timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("inactivity_timeout_secs"));
    }

    #[test]
    fn test_display_toml_masks_keys() {
        let mut config = Config::default();
        config.gemini.api_key = Some("super-secret".to_string());
        let rendered = config.to_display_toml().unwrap();
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("********"));
    }

    #[test]
    fn test_dump_template_parses_back_to_defaults() {
        let template = Config::dump_template().unwrap();
        let parsed: Config = toml::from_str(&template).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_default_path_ends_with_config_toml() {
        let path = Config::default_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("voxturn"));
        assert!(path_str.ends_with("config.toml"));
    }
}
