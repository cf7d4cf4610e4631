//! Gemini `generateContent` client implementing [`TextTransformer`].

use async_trait::async_trait;
use channel_relay_core::contract::TextTransformer;
use channel_relay_core::error::TransformError;
use serde::Deserialize;
use serde_json::json;

use crate::load_config::Endpoints;

pub struct GeminiTransformer {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiTransformer {
    pub fn new(endpoints: &Endpoints, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: endpoints.gemini_base.trim_end_matches('/').to_string(),
            model: endpoints.gemini_model.clone(),
            api_key: api_key.to_string(),
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

/// Text of the first part of the first candidate.
fn first_text(reply: GenerateResponse) -> Result<String, TransformError> {
    reply
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| TransformError::Malformed("reply has no candidates".to_string()))?
        .content
        .parts
        .into_iter()
        .next()
        .and_then(|part| part.text)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| TransformError::Malformed("first candidate has no text part".to_string()))
}

#[async_trait]
impl TextTransformer for GeminiTransformer {
    async fn transform(&self, prompt: &str) -> Result<String, TransformError> {
        let url = self.url();
        tracing::debug!(url = %url, prompt_chars = prompt.len(), "Requesting caption rewrite");

        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, "Transform service unreachable");
                TransformError::Unreachable(Box::new(e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<Failed to decode response body>"));
            tracing::error!(status = %status, "Transform service returned error. Response body: {body}");
            return Err(TransformError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .map_err(|e| TransformError::Malformed(e.to_string()))?;
        let text = first_text(reply)?;
        tracing::info!(caption_chars = text.len(), "Received rewritten caption");
        Ok(text)
    }
}
