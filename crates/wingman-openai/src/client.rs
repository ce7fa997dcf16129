// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for OpenAI-compatible APIs (OpenAI, Kimi, OpenRouter, Ollama).
//!
//! The client makes exactly one attempt per call. Retries, backoff and
//! failover belong to the provider manager.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::debug;
use wingman_core::{ProviderStream, WingmanError};

use crate::sse;
use crate::types::{ApiErrorResponse, ChatCompletionRequest, ChatCompletionResponse};

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAiClient {
    /// Builds a client for `api_base` (e.g. `https://api.openai.com/v1`).
    /// A missing key sends no `Authorization` header, as local servers expect.
    pub fn new(
        api_base: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, WingmanError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| WingmanError::Config(format!("invalid API key header value: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| WingmanError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /chat/completions` without streaming.
    pub async fn chat(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, WingmanError> {
        let response = self.post_completions(request).await?;
        let body = response.text().await.map_err(|e| WingmanError::Provider {
            message: format!("failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;
        serde_json::from_str(&body).map_err(|e| WingmanError::Provider {
            message: format!("failed to parse API response: {e}"),
            source: Some(Box::new(e)),
        })
    }

    /// `POST /chat/completions` with `stream: true`, returning parsed chunks.
    pub async fn chat_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ProviderStream, WingmanError> {
        let response = self.post_completions(request).await?;
        Ok(sse::parse_sse_stream(response))
    }

    /// `GET /models`; returns the status code.
    pub async fn list_models(&self) -> Result<StatusCode, WingmanError> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .send()
            .await
            .map_err(|e| WingmanError::Provider {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(response.status())
    }

    async fn post_completions(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<reqwest::Response, WingmanError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| WingmanError::Provider {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, stream = request.stream, "completion response received");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(WingmanError::provider(error_message(status, &body)))
    }
}

/// Prefers the structured `{"error": {...}}` message over the raw body.
fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api_err) => match api_err.error.error_type {
            Some(kind) => format!("API error {status} ({kind}): {}", api_err.error.message),
            None => format!("API error {status}: {}", api_err.error.message),
        },
        Err(_) => format!("API returned {status}: {body}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_errors_are_unwrapped() {
        let msg = error_message(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"message":"slow down","type":"rate_limit"}}"#,
        );
        assert_eq!(msg, "API error 429 Too Many Requests (rate_limit): slow down");

        let msg = error_message(StatusCode::BAD_GATEWAY, "upstream gone");
        assert_eq!(msg, "API returned 502 Bad Gateway: upstream gone");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client =
            OpenAiClient::new("http://localhost:11434/v1/", None, Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434/v1");
    }
}
