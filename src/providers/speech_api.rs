//! OpenAI-compatible `/audio/speech` synthesis.

use super::http::{HttpClient, endpoint};
use super::{AudioResource, Synthesizer};
use crate::config::SpeechApiConfig;
use crate::error::{Result, VoxturnError};
use async_trait::async_trait;
use serde::Serialize;

const NAME: &str = "speech_api";

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

pub struct SpeechApiSynthesizer {
    client: HttpClient,
    url: String,
    api_key: String,
    model: String,
    voice: String,
    format: String,
}

impl SpeechApiSynthesizer {
    pub fn new(client: HttpClient, config: &SpeechApiConfig, api_key: &str) -> Self {
        Self {
            client,
            url: endpoint(&config.base_url, "audio/speech"),
            api_key: api_key.to_string(),
            model: config.model.clone(),
            voice: config.voice.clone(),
            format: config.format.clone(),
        }
    }
}

/// MIME type for a `response_format` value.
fn mime_for(format: &str) -> &'static str {
    match format {
        "wav" => "audio/wav",
        "opus" => "audio/ogg",
        "aac" => "audio/aac",
        "flac" => "audio/flac",
        "pcm" => "audio/L16",
        _ => "audio/mpeg",
    }
}

#[async_trait]
impl Synthesizer for SpeechApiSynthesizer {
    fn name(&self) -> &str {
        NAME
    }

    async fn synthesize(&self, text: &str) -> Result<AudioResource> {
        let body = SpeechRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            response_format: &self.format,
        };
        let request = self
            .client
            .inner()
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body);

        let data = self
            .client
            .send(NAME, request)
            .await?
            .bytes()
            .await
            .map_err(|e| self.client.map_error(NAME, e))?;

        if data.is_empty() {
            return Err(VoxturnError::upstream(NAME, "response contained no audio"));
        }
        Ok(AudioResource::bytes(data.to_vec(), mime_for(&self.format)))
    }
}
