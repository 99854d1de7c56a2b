//! Groq backend (OpenAI-compatible chat completions).

use super::TurnResponder;
use super::http::{HttpClient, endpoint};
use crate::config::GroqConfig;
use crate::error::{Result, VoxturnError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const NAME: &str = "groq";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub struct GroqResponder {
    client: HttpClient,
    url: String,
    model: String,
    api_key: String,
}

impl GroqResponder {
    pub fn new(client: HttpClient, config: &GroqConfig, api_key: &str) -> Self {
        Self {
            client,
            url: endpoint(&config.base_url, "chat/completions"),
            model: config.model.clone(),
            api_key: api_key.to_string(),
        }
    }
}

fn extract_text(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| VoxturnError::upstream(NAME, "response contained no message"))
}

#[async_trait]
impl TurnResponder for GroqResponder {
    fn name(&self) -> &str {
        NAME
    }

    async fn respond(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        let request = self
            .client
            .inner()
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body);

        let response: ChatResponse = self.client.json(NAME, request).await?;
        extract_text(response)
    }
}
