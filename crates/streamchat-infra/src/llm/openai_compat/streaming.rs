//! SSE stream adapter for OpenAI-style chat completion streams.
//!
//! OpenAI-style streams send one chunk per delta:
//! 1. `delta.content` -- a piece of response text
//! 2. `finish_reason` -- on the last choice chunk
//! 3. `usage` -- on a trailing chunk with no choices (requires
//!    `stream_options.include_usage = true` on the request)
//!
//! The stream ends with `data: [DONE]` or, failing that, connection close.
//! OpenRouter reports failures after the headers as a `data:` payload
//! holding an `error` object.

use async_openai::types::chat::{
    CreateChatCompletionRequest, CreateChatCompletionStreamResponse, FinishReason,
};
use eventsource_stream::{EventStreamError, Eventsource};
use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};

use streamchat_core::llm::provider::LlmEventStream;
use streamchat_types::llm::{LlmError, StopReason, StreamEvent, Usage};

use super::{ErrorEnvelope, check_status, network_error};

const DONE_MARKER: &str = "[DONE]";

/// Map an OpenAI `finish_reason` to the provider-agnostic [`StopReason`].
pub fn map_finish_reason(reason: &FinishReason) -> StopReason {
    match reason {
        FinishReason::Stop => StopReason::EndTurn,
        FinishReason::Length => StopReason::MaxTokens,
        FinishReason::ContentFilter => StopReason::ContentFilter,
        FinishReason::ToolCalls | FinishReason::FunctionCall => StopReason::Other,
    }
}

/// Turn one SSE `data:` payload into zero or more `StreamEvent`s.
///
/// `[DONE]` yields a single [`StreamEvent::Done`].
pub fn process_openai_chunk(data: &str) -> Result<Vec<StreamEvent>, LlmError> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if data == DONE_MARKER {
        return Ok(vec![StreamEvent::Done]);
    }

    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(data) {
        return Err(LlmError::Upstream {
            status: envelope.error.status().unwrap_or(500),
            body: envelope.error.message,
        });
    }

    let chunk: CreateChatCompletionStreamResponse = serde_json::from_str(data)
        .map_err(|e| LlmError::Deserialization(format!("chat completion chunk: {e}")))?;

    let mut events = Vec::new();
    for choice in &chunk.choices {
        if let Some(text) = choice.delta.content.as_ref().filter(|t| !t.is_empty()) {
            events.push(StreamEvent::TextDelta { text: text.clone() });
        }
        if let Some(reason) = choice.finish_reason.as_ref() {
            events.push(StreamEvent::MessageDelta {
                stop_reason: map_finish_reason(reason),
            });
        }
    }
    if let Some(usage) = chunk.usage.as_ref() {
        events.push(StreamEvent::Usage(Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }));
    }
    Ok(events)
}

/// Create a streaming SSE connection to a chat completions endpoint.
///
/// Nothing is sent until the returned stream is first polled. Dropping the
/// stream drops the response body and with it the connection. There is no
/// reconnect: a broken body ends the stream with [`LlmError::Network`].
pub fn create_openai_stream(
    client: &reqwest::Client,
    url: &str,
    body: CreateChatCompletionRequest,
    api_key: &SecretString,
) -> LlmEventStream {
    let client = client.clone();
    let url = url.to_string();
    let api_key = SecretString::from(api_key.expose_secret());

    Box::pin(async_stream::try_stream! {
        let response = client
            .post(&url)
            .bearer_auth(api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        let response = check_status(response).await?;

        yield StreamEvent::Connected;

        let mut events = response.bytes_stream().eventsource();
        let mut chunks = 0usize;
        let mut done = false;
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| match e {
                EventStreamError::Transport(e) => network_error(e),
                other => LlmError::Stream(other.to_string()),
            })?;
            chunks += 1;
            for ev in process_openai_chunk(&event.data)? {
                done = ev == StreamEvent::Done;
                yield ev;
            }
            if done {
                break;
            }
        }

        tracing::debug!(chunks, "Chat completion stream closed");
        if !done {
            yield StreamEvent::Done;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reason_to_stop_reason_mapping() {
        let cases = vec![
            (FinishReason::Stop, StopReason::EndTurn),
            (FinishReason::Length, StopReason::MaxTokens),
            (FinishReason::ContentFilter, StopReason::ContentFilter),
            (FinishReason::ToolCalls, StopReason::Other),
        ];
        for (finish, expected) in cases {
            assert_eq!(map_finish_reason(&finish), expected);
        }
    }

    #[test]
    fn test_process_delta_chunk() {
        let data = r#"{"id":"gen-1","object":"chat.completion.chunk","created":1,"model":"m",
            "choices":[{"index":0,"delta":{"role":"assistant","content":"Hi"}}]}"#;
        assert_eq!(
            process_openai_chunk(data).unwrap(),
            vec![StreamEvent::TextDelta {
                text: "Hi".to_string()
            }]
        );
    }

    #[test]
    fn test_process_done_and_blank() {
        assert_eq!(
            process_openai_chunk("[DONE]").unwrap(),
            vec![StreamEvent::Done]
        );
        assert!(process_openai_chunk("  ").unwrap().is_empty());
    }

    #[test]
    fn test_process_error_payload() {
        let data = r#"{"error":{"message":"Provider returned error","code":502}}"#;
        match process_openai_chunk(data) {
            Err(LlmError::Upstream { status, body }) => {
                assert_eq!(status, 502);
                assert_eq!(body, "Provider returned error");
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[test]
    fn test_process_malformed_chunk() {
        assert!(matches!(
            process_openai_chunk("{not json"),
            Err(LlmError::Deserialization(_))
        ));
    }
}
