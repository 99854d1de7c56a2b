//! Google Gemini `generateContent` backend.

use super::TurnResponder;
use super::http::{HttpClient, endpoint};
use crate::config::GeminiConfig;
use crate::error::{Result, VoxturnError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const NAME: &str = "gemini";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

pub struct GeminiResponder {
    client: HttpClient,
    url: String,
    api_key: String,
}

impl GeminiResponder {
    pub fn new(client: HttpClient, config: &GeminiConfig, api_key: &str) -> Self {
        let url = endpoint(
            &config.base_url,
            &format!("models/{}:generateContent", config.model),
        );
        Self {
            client,
            url,
            api_key: api_key.to_string(),
        }
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(response: GenerateResponse) -> Result<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(VoxturnError::upstream(NAME, "response contained no text"));
    }
    Ok(text)
}

#[async_trait]
impl TurnResponder for GeminiResponder {
    fn name(&self) -> &str {
        NAME
    }

    async fn respond(&self, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        };
        let request = self
            .client
            .inner()
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body);

        let response: GenerateResponse = self.client.json(NAME, request).await?;
        extract_text(response)
    }
}
