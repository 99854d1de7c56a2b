//! In-process backends for tests and offline runs.
//!
//! Clones share their call logs, so a test can hand one clone to the
//! orchestrator and inspect the other.

use super::{AudioResource, CombinedResponder, Reply, Synthesizer, TurnResponder};
use crate::error::{Result, VoxturnError};
use crate::lock_unpoisoned;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

async fn pause(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

fn mock_failure(provider: &str) -> VoxturnError {
    VoxturnError::upstream(provider, "mock upstream failure")
}

/// Mock text responder
#[derive(Debug, Clone)]
pub struct MockResponder {
    name: String,
    response: String,
    should_fail: bool,
    delay: Option<Duration>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockResponder {
    /// Create a new mock responder with default settings
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            response: "mock response".to_string(),
            should_fail: false,
            delay: None,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Configure the mock to return a specific response
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Configure the mock to fail with an upstream error
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Wait this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Prompts received so far, oldest first
    pub fn prompts(&self) -> Vec<String> {
        lock_unpoisoned(&self.prompts).clone()
    }

    pub fn calls(&self) -> usize {
        lock_unpoisoned(&self.prompts).len()
    }
}

#[async_trait]
impl TurnResponder for MockResponder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond(&self, prompt: &str) -> Result<String> {
        lock_unpoisoned(&self.prompts).push(prompt.to_string());
        pause(self.delay).await;
        if self.should_fail {
            Err(mock_failure(&self.name))
        } else {
            Ok(self.response.clone())
        }
    }
}

/// Mock synthesizer
#[derive(Debug, Clone)]
pub struct MockSynthesizer {
    name: String,
    resource: AudioResource,
    should_fail: bool,
    delay: Option<Duration>,
    texts: Arc<Mutex<Vec<String>>>,
}

impl MockSynthesizer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            resource: AudioResource::bytes(vec![0x49, 0x44, 0x33], "audio/mpeg"),
            should_fail: false,
            delay: None,
            texts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_resource(mut self, resource: AudioResource) -> Self {
        self.resource = resource;
        self
    }

    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// The resource every successful call returns
    pub fn resource(&self) -> AudioResource {
        self.resource.clone()
    }

    pub fn texts(&self) -> Vec<String> {
        lock_unpoisoned(&self.texts).clone()
    }

    pub fn calls(&self) -> usize {
        lock_unpoisoned(&self.texts).len()
    }
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn synthesize(&self, text: &str) -> Result<AudioResource> {
        lock_unpoisoned(&self.texts).push(text.to_string());
        pause(self.delay).await;
        if self.should_fail {
            Err(mock_failure(&self.name))
        } else {
            Ok(self.resource.clone())
        }
    }
}

/// Mock hosted assistant answering with text and audio at once
#[derive(Debug, Clone)]
pub struct MockCombinedResponder {
    name: String,
    text: String,
    resource: AudioResource,
    should_fail: bool,
    delay: Option<Duration>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockCombinedResponder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            text: "mock hosted reply".to_string(),
            resource: AudioResource::bytes(vec![0x52, 0x49, 0x46, 0x46], "audio/wav"),
            should_fail: false,
            delay: None,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn resource(&self) -> AudioResource {
        self.resource.clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        lock_unpoisoned(&self.prompts).clone()
    }

    pub fn calls(&self) -> usize {
        lock_unpoisoned(&self.prompts).len()
    }
}

#[async_trait]
impl CombinedResponder for MockCombinedResponder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond_with_audio(&self, prompt: &str) -> Result<Reply> {
        lock_unpoisoned(&self.prompts).push(prompt.to_string());
        pause(self.delay).await;
        if self.should_fail {
            Err(mock_failure(&self.name))
        } else {
            Ok(Reply {
                text: self.text.clone(),
                audio: self.resource.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_responder_returns_response_and_records_prompt() {
        let responder = MockResponder::new("llm").with_response("Olá");
        let observer = responder.clone();

        assert_eq!(responder.respond("oi").await.unwrap(), "Olá");
        assert_eq!(observer.prompts(), vec!["oi".to_string()]);
        assert_eq!(observer.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_responder_failure_is_upstream() {
        let responder = MockResponder::new("llm").with_failure();
        match responder.respond("oi").await {
            Err(VoxturnError::Upstream { provider, message }) => {
                assert_eq!(provider, "llm");
                assert_eq!(message, "mock upstream failure");
            }
            other => panic!("Expected Upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mock_synthesizer_custom_resource() {
        let synthesizer =
            MockSynthesizer::new("tts").with_resource(AudioResource::url("https://x/y.mp3"));
        let audio = synthesizer.synthesize("hello").await.unwrap();
        assert_eq!(audio, AudioResource::url("https://x/y.mp3"));
        assert_eq!(synthesizer.texts(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_combined_responder() {
        let hosted = MockCombinedResponder::new("hosted").with_text("resposta");
        let reply = hosted.respond_with_audio("pergunta").await.unwrap();
        assert_eq!(reply.text, "resposta");
        assert_eq!(reply.audio, hosted.resource());
        assert_eq!(hosted.calls(), 1);
    }

    #[test]
    fn test_traits_are_object_safe() {
        let _responder: Box<dyn TurnResponder> = Box::new(MockResponder::new("a"));
        let _synth: Box<dyn Synthesizer> = Box::new(MockSynthesizer::new("b"));
        let _hosted: Box<dyn CombinedResponder> = Box::new(MockCombinedResponder::new("c"));
    }
}
