// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `http_fetch`: HTTP requests over reqwest.
//!
//! Response bodies are truncated to 50KB.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use wingman_core::WingmanError;

use crate::tool::{required_str, Tool, ToolOutput};

/// Maximum response body size in bytes (50KB).
const MAX_RESPONSE_SIZE: usize = 50 * 1024;

pub struct HttpFetchTool {
    client: reqwest::Client,
}

impl HttpFetchTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for HttpFetchTool {
    fn name(&self) -> &str {
        "http_fetch"
    }

    fn description(&self) -> &str {
        "Make an HTTP request and return the status and response body"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "The URL to request" },
                "method": {
                    "type": "string",
                    "enum": ["GET", "POST", "PUT", "DELETE", "PATCH"],
                    "default": "GET"
                },
                "headers": { "type": "object", "description": "HTTP headers as key-value pairs" },
                "body": { "type": "string", "description": "Request body" }
            },
            "required": ["url"]
        })
    }

    async fn invoke(&self, input: Value) -> Result<ToolOutput, WingmanError> {
        let url = required_str(&input, "url")?;

        let parsed = reqwest::Url::parse(url).map_err(|e| WingmanError::Tool {
            message: format!("invalid URL: {e}"),
            source: Some(Box::new(e)),
        })?;
        let scheme = parsed.scheme();
        if scheme != "http" && scheme != "https" {
            return Ok(ToolOutput::error(format!(
                "URL scheme '{scheme}' not allowed. Only http and https are supported."
            )));
        }

        let method_str = input["method"].as_str().unwrap_or("GET");
        let method = method_str
            .to_ascii_uppercase()
            .parse::<reqwest::Method>()
            .map_err(|e| WingmanError::Tool {
                message: format!("invalid HTTP method '{method_str}': {e}"),
                source: Some(Box::new(e)),
            })?;

        let mut request = self.client.request(method, parsed);
        if let Some(headers) = input["headers"].as_object() {
            for (key, value) in headers {
                if let Some(v) = value.as_str() {
                    request = request.header(key.as_str(), v);
                }
            }
        }
        if let Some(body) = input["body"].as_str() {
            request = request.body(body.to_string());
        }

        let response = request.send().await.map_err(|e| WingmanError::Tool {
            message: format!("HTTP request failed: {e}"),
            source: Some(Box::new(e)),
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| WingmanError::Tool {
            message: format!("failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;

        let body = if body.len() > MAX_RESPONSE_SIZE {
            let mut end = MAX_RESPONSE_SIZE;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!(
                "{}...\n\n[Response truncated from {} to {} bytes]",
                &body[..end],
                body.len(),
                MAX_RESPONSE_SIZE
            )
        } else {
            body
        };

        let content = format!("HTTP {}\n\n{body}", status.as_u16());
        if status.is_client_error() || status.is_server_error() {
            Ok(ToolOutput::error(content))
        } else {
            Ok(ToolOutput::ok(content))
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn fetches_body_and_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hello"))
            .respond_with(ResponseTemplate::new(200).set_body_string("world"))
            .mount(&server)
            .await;

        let out = HttpFetchTool::new()
            .invoke(serde_json::json!({"url": format!("{}/hello", server.uri())}))
            .await
            .unwrap();
        assert!(!out.is_error);
        assert_eq!(out.content, "HTTP 200\n\nworld");
    }

    #[tokio::test]
    async fn server_errors_are_error_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let out = HttpFetchTool::new()
            .invoke(serde_json::json!({"url": server.uri(), "method": "post", "body": "{}"}))
            .await
            .unwrap();
        assert!(out.is_error);
        assert!(out.content.starts_with("HTTP 503"));
    }

    #[tokio::test]
    async fn rejects_non_http_scheme() {
        let out = HttpFetchTool::new()
            .invoke(serde_json::json!({"url": "file:///etc/passwd"}))
            .await
            .unwrap();
        assert!(out.is_error);
        assert!(out.content.contains("not allowed"));
    }
}
