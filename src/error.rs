//! Error types for voxturn.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxturnError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Speech capture errors
    #[error("Capability not supported on this host: {capability}")]
    UnsupportedCapability { capability: String },

    #[error("Speech capture failed: {message}")]
    Capture { message: String },

    // Provider errors
    #[error("{provider} request failed: {message}")]
    Upstream { provider: String, message: String },

    #[error("{provider} did not answer within {after_secs}s")]
    Timeout { provider: String, after_secs: u64 },

    #[error("Provider {provider} is not configured: {message}")]
    ProviderNotConfigured { provider: String, message: String },

    // Playback errors
    #[error("Audio player not found: {player}")]
    PlayerNotFound { player: String },

    #[error("Playback failed: {message}")]
    Playback { message: String },

    // IPC errors
    #[error("IPC socket error: {message}")]
    IpcSocket { message: String },

    #[error("IPC protocol error: {message}")]
    IpcProtocol { message: String },

    #[error("IPC connection failed: {message}")]
    IpcConnection { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl VoxturnError {
    /// True for provider calls that ran out of time rather than failing upstream.
    pub fn is_timeout(&self) -> bool {
        matches!(self, VoxturnError::Timeout { .. })
    }

    /// Shorthand for an upstream failure attributed to `provider`.
    pub fn upstream(provider: &str, message: impl Into<String>) -> Self {
        VoxturnError::Upstream {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxturnError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_file_not_found_display() {
        let error = VoxturnError::ConfigFileNotFound {
            path: "/path/to/config.toml".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Configuration file not found at /path/to/config.toml"
        );
    }

    #[test]
    fn test_config_invalid_value_display() {
        let error = VoxturnError::ConfigInvalidValue {
            key: "conversation.inactivity_timeout_secs".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for conversation.inactivity_timeout_secs: must be positive"
        );
    }

    #[test]
    fn test_unsupported_capability_display() {
        let error = VoxturnError::UnsupportedCapability {
            capability: "speech recognition".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Capability not supported on this host: speech recognition"
        );
    }

    #[test]
    fn test_upstream_display() {
        let error = VoxturnError::upstream("groq", "401 Unauthorized");
        assert_eq!(error.to_string(), "groq request failed: 401 Unauthorized");
        assert!(!error.is_timeout());
    }

    #[test]
    fn test_timeout_display_and_predicate() {
        let error = VoxturnError::Timeout {
            provider: "webhook".to_string(),
            after_secs: 30,
        };
        assert_eq!(error.to_string(), "webhook did not answer within 30s");
        assert!(error.is_timeout());
    }

    #[test]
    fn test_player_not_found_display() {
        let error = VoxturnError::PlayerNotFound {
            player: "ffplay".to_string(),
        };
        assert_eq!(error.to_string(), "Audio player not found: ffplay");
    }

    #[test]
    fn test_ipc_protocol_display() {
        let error = VoxturnError::IpcProtocol {
            message: "invalid message format".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "IPC protocol error: invalid message format"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: VoxturnError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: VoxturnError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: VoxturnError = io_error.into();
        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<VoxturnError>();
        assert_sync::<VoxturnError>();
    }
}
