// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE parsing for streamed chat completions.
//!
//! Each `data:` line carries a [`StreamChunk`]; the literal `[DONE]` ends the
//! stream.

use eventsource_stream::Eventsource;
use futures::stream::StreamExt;
use wingman_core::{ProviderStream, ProviderStreamChunk, TokenUsage, WingmanError};

use crate::types::StreamChunk;

const DONE_MARKER: &str = "[DONE]";

pub fn parse_sse_stream(response: reqwest::Response) -> ProviderStream {
    let events = response
        .bytes_stream()
        .eventsource()
        .take_while(|result| {
            let done = matches!(result, Ok(event) if event.data.trim() == DONE_MARKER);
            futures::future::ready(!done)
        })
        .filter_map(|result| async move {
            match result {
                Ok(event) => parse_data(&event.data),
                Err(e) => Some(Err(WingmanError::Provider {
                    message: format!("SSE stream error: {e}"),
                    source: None,
                })),
            }
        });
    Box::pin(events)
}

/// Maps one `data:` payload to a chunk. Payloads with neither text, a finish
/// reason nor usage produce nothing.
pub(crate) fn parse_data(data: &str) -> Option<Result<ProviderStreamChunk, WingmanError>> {
    let chunk: StreamChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            return Some(Err(WingmanError::Provider {
                message: format!("failed to parse stream chunk: {e}"),
                source: Some(Box::new(e)),
            }));
        }
    };

    let choice = chunk.choices.into_iter().next();
    let delta = choice
        .as_ref()
        .and_then(|c| c.delta.content.clone())
        .unwrap_or_default();
    let finish_reason = choice.and_then(|c| c.finish_reason);
    let usage = chunk.usage.map(|u| TokenUsage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
    });

    if delta.is_empty() && finish_reason.is_none() && usage.is_none() {
        return None;
    }
    Some(Ok(ProviderStreamChunk {
        delta,
        finish_reason,
        usage,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_delta() {
        let chunk = parse_data(r#"{"choices":[{"delta":{"content":"Hel"}}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(chunk.delta, "Hel");
        assert!(chunk.finish_reason.is_none());
    }

    #[test]
    fn role_only_delta_is_skipped() {
        assert!(parse_data(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).is_none());
    }

    #[test]
    fn finish_reason_and_usage() {
        let chunk = parse_data(
            r#"{"choices":[{"delta":{},"finish_reason":"stop"}],"usage":{"prompt_tokens":3,"completion_tokens":5}}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(chunk.finish_reason.as_deref(), Some("stop"));
        assert_eq!(chunk.usage.unwrap().completion_tokens, 5);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_data("not json").unwrap().is_err());
    }
}
