//! Gemini provider: one generateContent call per request
//!
//! Implements the Provider trait over the Gemini REST API. The provider knows
//! nothing about key rotation: it authenticates with the key it is given and
//! maps every failure into a `ProviderError` whose signal the key pool
//! classifies.

use provider::{CallRequest, CallResponse, Provider, ProviderError};
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

use crate::config::GeminiConfig;

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini generateContent client.
pub struct GeminiProvider {
    client: reqwest::Client,
    endpoint: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiProvider {
    pub fn new(client: reqwest::Client, config: &GeminiConfig) -> Self {
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model
        );
        Self {
            client,
            endpoint,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": self.temperature,
                "topP": 0.95,
                "topK": 40,
                "maxOutputTokens": self.max_output_tokens,
                "responseMimeType": "application/json"
            }
        })
    }
}

impl Provider for GeminiProvider {
    fn id(&self) -> &str {
        "gemini"
    }

    fn call<'a>(
        &'a self,
        key: &'a str,
        request: &'a CallRequest,
    ) -> Pin<Box<dyn Future<Output = provider::Result<CallResponse>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .client
                .post(&self.endpoint)
                .header(API_KEY_HEADER, key)
                .json(&self.request_body(&request.prompt))
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status();
            let body = response.text().await.map_err(transport_error)?;
            debug!(status = status.as_u16(), bytes = body.len(), "gemini response");

            if !status.is_success() {
                return Err(ProviderError::Upstream {
                    status: status.as_u16(),
                    body,
                });
            }
            extract_text(&body)
        })
    }
}

/// Describe a transport failure so the classifier can tell timeouts and
/// connection problems from anything else. The error never carries the key.
fn transport_error(e: reqwest::Error) -> ProviderError {
    let e = e.without_url();
    if e.is_timeout() {
        ProviderError::Transport(format!("request timed out: {e}"))
    } else if e.is_connect() {
        ProviderError::Transport(format!("connection failed: {e}"))
    } else {
        ProviderError::Transport(format!("request failed: {e}"))
    }
}

/// Concatenate the text parts of the first candidate.
pub fn extract_text(body: &str) -> provider::Result<CallResponse> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::Decode(format!("invalid JSON body: {e}")))?;

    let parts = value
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| ProviderError::Decode("no candidate content in response".into()))?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.is_empty() {
        return Err(ProviderError::Decode("candidate has no text parts".into()));
    }
    Ok(CallResponse { text })
}
