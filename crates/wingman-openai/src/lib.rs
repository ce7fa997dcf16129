// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible provider adapter for Wingman.
//!
//! One adapter covers every backend that speaks `/chat/completions`:
//! OpenAI, Kimi (Moonshot), OpenRouter and Ollama's `/v1` endpoint.

pub mod client;
pub mod sse;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};
use wingman_config::model::ProviderBackendConfig;
use wingman_core::{
    AdapterType, ChatMessage, HealthStatus, ModelInfo, PluginAdapter, ProviderAdapter,
    ProviderRequest, ProviderResponse, ProviderStream, Role, TokenUsage, ToolCall, WingmanError,
};

use crate::client::OpenAiClient;
use crate::types::{ApiFunction, ApiMessage, ApiToolCall, ChatCompletionRequest};

pub struct OpenAiProvider {
    name: String,
    model: String,
    context_window: u32,
    client: OpenAiClient,
}

impl OpenAiProvider {
    /// Builds an adapter from one `[[providers.backends]]` entry.
    pub fn from_config(
        backend: &ProviderBackendConfig,
        request_timeout: Duration,
    ) -> Result<Self, WingmanError> {
        let api_key = backend.resolve_api_key();
        if api_key.is_none() {
            warn!(
                provider = %backend.name,
                "no API key configured, sending unauthenticated requests"
            );
        }
        let client = OpenAiClient::new(&backend.api_base, api_key.as_deref(), request_timeout)?;

        info!(
            provider = %backend.name,
            model = %backend.model,
            api_base = %client.base_url(),
            "OpenAI-compatible provider initialized"
        );

        Ok(Self {
            name: backend.name.clone(),
            model: backend.model.clone(),
            context_window: backend.context_window,
            client,
        })
    }

    fn to_api_request(&self, request: &ProviderRequest, stream: bool) -> ChatCompletionRequest {
        let tools = (!request.tools.is_empty())
            .then(|| request.tools.iter().map(|t| t.to_openai_format()).collect());
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: request.messages.iter().map(to_api_message).collect(),
            tools,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        }
    }
}

fn to_api_message(msg: &ChatMessage) -> ApiMessage {
    let tool_only = msg.role == Role::Assistant && !msg.tool_calls.is_empty();
    let content = if tool_only && msg.content.is_empty() {
        None
    } else {
        Some(msg.content.clone())
    };
    ApiMessage {
        role: msg.role.to_string(),
        content,
        tool_calls: msg
            .tool_calls
            .iter()
            .map(|tc| ApiToolCall {
                id: Some(tc.id.clone()),
                call_type: "function".into(),
                function: ApiFunction {
                    name: tc.name.clone(),
                    arguments: tc.arguments.to_string(),
                },
            })
            .collect(),
        tool_call_id: msg.tool_call_id.clone(),
        name: msg.name.clone(),
    }
}

/// Decodes string-encoded arguments. Anything that is not a JSON object is
/// passed through under `raw` so the tool sees what the model sent.
fn decode_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return serde_json::json!({});
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => value,
        _ => serde_json::json!({ "raw": raw }),
    }
}

fn from_api_tool_call(index: usize, call: ApiToolCall) -> ToolCall {
    ToolCall {
        id: call.id.unwrap_or_else(|| format!("call_{index}")),
        name: call.function.name,
        arguments: decode_arguments(&call.function.arguments),
    }
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, WingmanError> {
        match self.client.list_models().await {
            Ok(status) if status.is_success() => Ok(HealthStatus::Healthy),
            Ok(status) => Ok(HealthStatus::Unhealthy(format!("GET /models returned {status}"))),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, WingmanError> {
        let api_request = self.to_api_request(&request, false);
        let response = self.client.chat(&api_request).await?;

        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        });
        let Some(choice) = response.choices.into_iter().next() else {
            return Err(WingmanError::provider("API response contained no choices"));
        };

        Ok(ProviderResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls: choice
                .message
                .tool_calls
                .into_iter()
                .enumerate()
                .map(|(i, tc)| from_api_tool_call(i, tc))
                .collect(),
            finish_reason: choice.finish_reason,
            usage,
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, WingmanError> {
        let api_request = self.to_api_request(&request, true);
        self.client.chat_stream(&api_request).await
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: self.name.clone(),
            model: self.model.clone(),
            context_window: self.context_window,
            supports_tools: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use wingman_core::ToolDefinition;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn backend(uri: &str, key: Option<&str>) -> ProviderBackendConfig {
        ProviderBackendConfig {
            name: "primary".into(),
            api_base: format!("{uri}/v1"),
            api_key: key.map(String::from),
            api_key_env: None,
            model: "gpt-test".into(),
            context_window: 8192,
        }
    }

    fn provider(uri: &str) -> OpenAiProvider {
        OpenAiProvider::from_config(&backend(uri, Some("sk-test")), Duration::from_secs(5))
            .unwrap()
    }

    #[tokio::test]
    async fn complete_returns_text_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-test", "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "4"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 10, "completion_tokens": 1, "total_tokens": 11}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = provider(&server.uri())
            .complete(ProviderRequest {
                messages: vec![ChatMessage::user("What's 2+2?")],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(response.content, "4");
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
        assert_eq!(response.usage.unwrap().prompt_tokens, 10);
        assert!(!response.has_tool_calls());
    }

    #[tokio::test]
    async fn complete_decodes_tool_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": {
                        "content": null,
                        "tool_calls": [
                            {"id": "call_a", "type": "function",
                             "function": {"name": "bash", "arguments": "{\"command\":\"ls\"}"}},
                            {"type": "function",
                             "function": {"name": "bash", "arguments": "not json"}}
                        ]
                    },
                    "finish_reason": "tool_calls"
                }]
            })))
            .mount(&server)
            .await;

        let response = provider(&server.uri())
            .complete(ProviderRequest {
                messages: vec![ChatMessage::user("list files")],
                tools: vec![ToolDefinition {
                    name: "bash".into(),
                    description: "Run a command".into(),
                    parameters: serde_json::json!({"type": "object"}),
                }],
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(response.content, "");
        assert_eq!(response.tool_calls.len(), 2);
        assert_eq!(response.tool_calls[0].id, "call_a");
        assert_eq!(response.tool_calls[0].arguments["command"], "ls");
        assert_eq!(response.tool_calls[1].id, "call_1");
        assert_eq!(response.tool_calls[1].arguments["raw"], "not json");
    }

    #[tokio::test]
    async fn error_status_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": {"message": "overloaded", "type": "server_error"}
            })))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .complete(ProviderRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WingmanError::Provider { .. }));
        assert!(err.to_string().contains("overloaded"), "{err}");
    }

    #[tokio::test]
    async fn stream_yields_deltas_until_done() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let mut stream = provider(&server.uri())
            .stream(ProviderRequest {
                messages: vec![ChatMessage::user("hi")],
                ..Default::default()
            })
            .await
            .unwrap();

        let mut text = String::new();
        let mut finish = None;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            text.push_str(&chunk.delta);
            if chunk.finish_reason.is_some() {
                finish = chunk.finish_reason;
            }
        }
        assert_eq!(text, "Hello");
        assert_eq!(finish.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn health_check_probes_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&server)
            .await;
        assert_eq!(
            provider(&server.uri()).health_check().await.unwrap(),
            HealthStatus::Healthy
        );

        let down = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&down)
            .await;
        let status = provider(&down.uri()).health_check().await.unwrap();
        assert!(!status.is_reachable());
    }

    #[test]
    fn tool_call_history_round_trips_to_wire() {
        let msg = ChatMessage {
            role: Role::Assistant,
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: "call_1".into(),
                name: "bash".into(),
                arguments: serde_json::json!({"command": "ls"}),
            }],
            tool_call_id: None,
            name: None,
        };
        let api = to_api_message(&msg);
        assert!(api.content.is_none());
        assert_eq!(api.tool_calls[0].function.arguments, r#"{"command":"ls"}"#);

        let tool = ChatMessage {
            role: Role::Tool,
            content: "a.txt".into(),
            tool_calls: vec![],
            tool_call_id: Some("call_1".into()),
            name: Some("bash".into()),
        };
        let api = to_api_message(&tool);
        assert_eq!(api.role, "tool");
        assert_eq!(api.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn model_info_reflects_backend() {
        let info = provider("http://localhost:1").model_info();
        assert_eq!(info.provider, "primary");
        assert_eq!(info.model, "gpt-test");
        assert_eq!(info.context_window, 8192);
        assert!(info.supports_tools);
    }
}
