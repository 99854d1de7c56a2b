//! Response and synthesis backends.
//!
//! Three separate capabilities:
//! - [`TurnResponder`]: text in, text out
//! - [`Synthesizer`]: text in, audio out
//! - [`CombinedResponder`]: text in, text and audio out in one round trip
//!
//! [`ProviderRegistry::plan`] turns the user's [`ProviderSelection`] into a
//! [`DispatchPlan`], checking for a combined responder first so the synthesis
//! step can be skipped entirely.

pub mod mock;

#[cfg(feature = "http-providers")]
pub mod gemini;
#[cfg(feature = "http-providers")]
pub mod groq;
#[cfg(feature = "http-providers")]
pub mod hosted;
#[cfg(feature = "http-providers")]
pub mod http;
#[cfg(feature = "http-providers")]
pub mod speech_api;
#[cfg(feature = "http-providers")]
pub mod webhook;

use crate::error::{Result, VoxturnError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Named response backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponderKind {
    #[default]
    Gemini,
    Groq,
    /// Hosted assistant returning text and audio together.
    Hosted,
}

impl ResponderKind {
    pub const ALL: [ResponderKind; 3] = [
        ResponderKind::Gemini,
        ResponderKind::Groq,
        ResponderKind::Hosted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponderKind::Gemini => "gemini",
            ResponderKind::Groq => "groq",
            ResponderKind::Hosted => "hosted",
        }
    }

    /// Whether this backend produces its own audio.
    pub fn is_combined(&self) -> bool {
        matches!(self, ResponderKind::Hosted)
    }
}

impl fmt::Display for ResponderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponderKind {
    type Err = VoxturnError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| VoxturnError::ConfigInvalidValue {
                key: "providers.response".to_string(),
                message: format!("unknown response provider '{s}' (expected gemini, groq or hosted)"),
            })
    }
}

/// Named synthesis backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesizerKind {
    #[default]
    SpeechApi,
    Webhook,
}

impl SynthesizerKind {
    pub const ALL: [SynthesizerKind; 2] = [SynthesizerKind::SpeechApi, SynthesizerKind::Webhook];

    pub fn as_str(&self) -> &'static str {
        match self {
            SynthesizerKind::SpeechApi => "speech_api",
            SynthesizerKind::Webhook => "webhook",
        }
    }
}

impl fmt::Display for SynthesizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SynthesizerKind {
    type Err = VoxturnError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| VoxturnError::ConfigInvalidValue {
                key: "providers.synthesis".to_string(),
                message: format!("unknown synthesis provider '{s}' (expected speech_api or webhook)"),
            })
    }
}

/// Which backends the next turn will use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSelection {
    pub response: ResponderKind,
    pub synthesis: SynthesizerKind,
}

/// Something the playback engine can play.
///
/// Backends return whichever form they naturally produce; nothing is downloaded
/// or decoded here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioResource {
    /// Encoded audio held in memory.
    Bytes { data: Vec<u8>, mime: String },
    /// Audio fetchable by the player.
    Url(String),
}

impl AudioResource {
    pub fn bytes(data: Vec<u8>, mime: &str) -> Self {
        AudioResource::Bytes {
            data,
            mime: mime.to_string(),
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        AudioResource::Url(url.into())
    }

    /// Short description for logs and status lines.
    pub fn describe(&self) -> String {
        match self {
            AudioResource::Bytes { data, mime } => format!("{} bytes of {}", data.len(), mime),
            AudioResource::Url(url) => url.clone(),
        }
    }
}

/// Text in, text out.
#[async_trait]
pub trait TurnResponder: Send + Sync {
    fn name(&self) -> &str;

    /// Answer `prompt`. Fails with `Upstream` on network, auth or quota errors.
    async fn respond(&self, prompt: &str) -> Result<String>;
}

/// Text in, text and ready-to-play audio out.
#[async_trait]
pub trait CombinedResponder: Send + Sync {
    fn name(&self) -> &str;

    async fn respond_with_audio(&self, prompt: &str) -> Result<Reply>;
}

/// Text in, audio out.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    fn name(&self) -> &str;

    async fn synthesize(&self, text: &str) -> Result<AudioResource>;
}

/// Assistant reply ready for playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub audio: AudioResource,
}

/// A registered response backend, tagged by capability.
#[derive(Clone)]
pub enum ResponseBackend {
    Combined(Arc<dyn CombinedResponder>),
    Turn(Arc<dyn TurnResponder>),
}

/// How one turn will be answered.
#[derive(Clone)]
pub enum DispatchPlan {
    Combined(Arc<dyn CombinedResponder>),
    TwoStep {
        responder: Arc<dyn TurnResponder>,
        synthesizer: Arc<dyn Synthesizer>,
    },
}

impl fmt::Debug for DispatchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchPlan::Combined(responder) => {
                f.debug_tuple("Combined").field(&responder.name()).finish()
            }
            DispatchPlan::TwoStep {
                responder,
                synthesizer,
            } => f
                .debug_struct("TwoStep")
                .field("responder", &responder.name())
                .field("synthesizer", &synthesizer.name())
                .finish(),
        }
    }
}

impl DispatchPlan {
    /// Run the plan, bounding every provider call by `limit`.
    pub async fn run(&self, prompt: &str, limit: Duration) -> Result<Reply> {
        match self {
            DispatchPlan::Combined(responder) => {
                bounded(responder.name(), limit, responder.respond_with_audio(prompt)).await
            }
            DispatchPlan::TwoStep {
                responder,
                synthesizer,
            } => {
                let text = bounded(responder.name(), limit, responder.respond(prompt)).await?;
                let audio = bounded(synthesizer.name(), limit, synthesizer.synthesize(&text)).await?;
                Ok(Reply { text, audio })
            }
        }
    }
}

/// Await `call`, failing with `Timeout` once `limit` has passed.
pub async fn bounded<T, F>(provider: &str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(VoxturnError::Timeout {
            provider: provider.to_string(),
            after_secs: limit.as_secs(),
        }),
    }
}

/// Backends available to the orchestrator, keyed by the names users select.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    responders: HashMap<ResponderKind, ResponseBackend>,
    synthesizers: HashMap<SynthesizerKind, Arc<dyn Synthesizer>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responder(mut self, kind: ResponderKind, backend: ResponseBackend) -> Self {
        self.responders.insert(kind, backend);
        self
    }

    pub fn with_synthesizer(mut self, kind: SynthesizerKind, synthesizer: Arc<dyn Synthesizer>) -> Self {
        self.synthesizers.insert(kind, synthesizer);
        self
    }

    /// Register every vendor backend whose credentials are present in `config`.
    #[cfg(feature = "http-providers")]
    pub fn from_config(config: &crate::config::Config) -> Result<Self> {
        let client = http::HttpClient::new(config.conversation.provider_timeout())?;
        let mut registry = Self::new();

        if let Some(key) = config.gemini.api_key.as_deref().filter(|k| !k.is_empty()) {
            let gemini = gemini::GeminiResponder::new(client.clone(), &config.gemini, key);
            registry = registry.with_responder(
                ResponderKind::Gemini,
                ResponseBackend::Turn(Arc::new(gemini)),
            );
        }
        if let Some(key) = config.groq.api_key.as_deref().filter(|k| !k.is_empty()) {
            let groq = groq::GroqResponder::new(client.clone(), &config.groq, key);
            registry =
                registry.with_responder(ResponderKind::Groq, ResponseBackend::Turn(Arc::new(groq)));
        }
        if !config.hosted.url.trim().is_empty() {
            let hosted = hosted::HostedResponder::new(client.clone(), &config.hosted);
            registry = registry.with_responder(
                ResponderKind::Hosted,
                ResponseBackend::Combined(Arc::new(hosted)),
            );
        }
        if let Some(key) = config.speech_api.api_key.as_deref().filter(|k| !k.is_empty()) {
            let speech = speech_api::SpeechApiSynthesizer::new(client.clone(), &config.speech_api, key);
            registry = registry.with_synthesizer(SynthesizerKind::SpeechApi, Arc::new(speech));
        }
        if !config.webhook.url.trim().is_empty() {
            let webhook = webhook::WebhookSynthesizer::new(client, &config.webhook);
            registry = registry.with_synthesizer(SynthesizerKind::Webhook, Arc::new(webhook));
        }

        Ok(registry)
    }

    /// Resolve `selection` into a plan. A combined responder wins and needs no synthesizer.
    pub fn plan(&self, selection: ProviderSelection) -> Result<DispatchPlan> {
        let backend = self.responders.get(&selection.response).ok_or_else(|| {
            VoxturnError::ProviderNotConfigured {
                provider: selection.response.to_string(),
                message: "no credentials or endpoint configured".to_string(),
            }
        })?;

        match backend {
            ResponseBackend::Combined(responder) => Ok(DispatchPlan::Combined(responder.clone())),
            ResponseBackend::Turn(responder) => {
                let synthesizer = self.synthesizers.get(&selection.synthesis).ok_or_else(|| {
                    VoxturnError::ProviderNotConfigured {
                        provider: selection.synthesis.to_string(),
                        message: "no credentials or endpoint configured".to_string(),
                    }
                })?;
                Ok(DispatchPlan::TwoStep {
                    responder: responder.clone(),
                    synthesizer: synthesizer.clone(),
                })
            }
        }
    }

    pub fn responders(&self) -> Vec<ResponderKind> {
        ResponderKind::ALL
            .into_iter()
            .filter(|kind| self.responders.contains_key(kind))
            .collect()
    }

    pub fn synthesizers(&self) -> Vec<SynthesizerKind> {
        SynthesizerKind::ALL
            .into_iter()
            .filter(|kind| self.synthesizers.contains_key(kind))
            .collect()
    }
}
