//! Synthesis webhook answering `GET ?text=` with a link to the rendered audio.

use super::http::HttpClient;
use super::{AudioResource, Synthesizer};
use crate::config::WebhookConfig;
use crate::error::{Result, VoxturnError};
use async_trait::async_trait;
use serde::Deserialize;

const NAME: &str = "webhook";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookResponse {
    media_url: Option<String>,
}

pub struct WebhookSynthesizer {
    client: HttpClient,
    url: String,
}

impl WebhookSynthesizer {
    pub fn new(client: HttpClient, config: &WebhookConfig) -> Self {
        Self {
            client,
            url: config.url.trim().to_string(),
        }
    }

    fn request_url(&self, text: &str) -> Result<reqwest::Url> {
        reqwest::Url::parse_with_params(&self.url, &[("text", text)])
            .map_err(|e| VoxturnError::upstream(NAME, format!("invalid webhook URL: {e}")))
    }
}

fn media_url(response: WebhookResponse) -> Result<AudioResource> {
    response
        .media_url
        .filter(|url| !url.trim().is_empty())
        .map(AudioResource::url)
        .ok_or_else(|| VoxturnError::upstream(NAME, "response did not include mediaUrl"))
}

#[async_trait]
impl Synthesizer for WebhookSynthesizer {
    fn name(&self) -> &str {
        NAME
    }

    async fn synthesize(&self, text: &str) -> Result<AudioResource> {
        let url = self.request_url(text)?;
        let request = self.client.inner().get(url);
        let response: WebhookResponse = self.client.json(NAME, request).await?;
        media_url(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_request_url_encodes_text() {
        let client = HttpClient::new(Duration::from_secs(1)).unwrap();
        let webhook = WebhookSynthesizer::new(
            client,
            &WebhookConfig {
                url: "https://example.com/api/webhook".to_string(),
            },
        );
        let url = webhook.request_url("olá mundo & cia").unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![("text".to_string(), "olá mundo & cia".to_string())]
        );
    }

    #[test]
    fn test_media_url_extracted() {
        let response: WebhookResponse =
            serde_json::from_str(r#"{"mediaUrl":"https://cdn.example.com/a.mp3"}"#).unwrap();
        assert_eq!(
            media_url(response).unwrap(),
            AudioResource::url("https://cdn.example.com/a.mp3")
        );
    }

    #[test]
    fn test_missing_media_url_is_upstream() {
        let response: WebhookResponse = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
        assert!(matches!(
            media_url(response),
            Err(VoxturnError::Upstream { provider, .. }) if provider == "webhook"
        ));
    }
}
