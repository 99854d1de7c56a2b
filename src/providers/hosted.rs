//! Hosted assistant answering a prompt with ready-to-play WAV audio.
//!
//! The endpoint returns the audio as the response body and no text. An
//! endpoint deployed for voxturn may add the spoken text in an
//! `x-response-text` header (a voxturn convention, not part of the stock
//! API); without it the reply text is empty and only the audio is kept.

use super::http::HttpClient;
use super::{AudioResource, CombinedResponder, Reply};
use crate::config::HostedConfig;
use crate::defaults;
use crate::error::{Result, VoxturnError};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use serde::Serialize;

const NAME: &str = "hosted";
const FALLBACK_MIME: &str = "audio/wav";

#[derive(Debug, Serialize)]
struct PromptRequest<'a> {
    prompt: &'a str,
}

pub struct HostedResponder {
    client: HttpClient,
    url: String,
}

impl HostedResponder {
    pub fn new(client: HttpClient, config: &HostedConfig) -> Self {
        Self {
            client,
            url: config.url.trim().to_string(),
        }
    }
}

fn reply_text(headers: &HeaderMap) -> String {
    headers
        .get(defaults::HOSTED_TEXT_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|text| text.trim().to_string())
        .unwrap_or_default()
}

fn audio_mime(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .filter(|mime| mime.starts_with("audio/"))
        .unwrap_or(FALLBACK_MIME)
        .to_string()
}

#[async_trait]
impl CombinedResponder for HostedResponder {
    fn name(&self) -> &str {
        NAME
    }

    async fn respond_with_audio(&self, prompt: &str) -> Result<Reply> {
        let request = self
            .client
            .inner()
            .post(&self.url)
            .json(&PromptRequest { prompt });

        let response = self.client.send(NAME, request).await?;
        let text = reply_text(response.headers());
        let mime = audio_mime(response.headers());
        let data = response
            .bytes()
            .await
            .map_err(|e| self.client.map_error(NAME, e))?;

        if data.is_empty() {
            return Err(VoxturnError::upstream(NAME, "response contained no audio"));
        }

        Ok(Reply {
            text,
            audio: AudioResource::bytes(data.to_vec(), &mime),
        })
    }
}
