//! SSE stream adapter for Gemini `streamGenerateContent?alt=sse`.
//!
//! The endpoint answers with `text/event-stream`. Every `data:` line holds
//! one complete `GenerateContentResponse` JSON object; there is no explicit
//! end marker, the server simply closes the connection after the last chunk.
//!
//! Per chunk we emit, in order: the text delta (if any), usage, and the stop
//! reason (on the final chunk).

use eventsource_stream::{EventStreamError, Eventsource};
use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};

use streamchat_core::llm::provider::LlmEventStream;
use streamchat_types::llm::{LlmError, StreamEvent};

use super::client::{check_status, network_error};
use super::types::{GeminiRequest, GeminiResponse};

/// Turn one SSE `data:` payload into zero or more `StreamEvent`s.
///
/// Blank payloads yield nothing. An `error` object in the payload is the
/// provider reporting a failure after the stream had already started.
pub fn process_gemini_chunk(data: &str) -> Result<Vec<StreamEvent>, LlmError> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let chunk: GeminiResponse = serde_json::from_str(data)
        .map_err(|e| LlmError::Deserialization(format!("gemini chunk: {e}")))?;

    if let Some(err) = chunk.error {
        return Err(LlmError::Upstream {
            status: err.code.unwrap_or(500),
            body: err.message,
        });
    }

    let mut events = Vec::new();
    let text = chunk.text();
    if !text.is_empty() {
        events.push(StreamEvent::TextDelta { text });
    }
    if let Some(usage) = chunk.usage() {
        events.push(StreamEvent::Usage(usage));
    }
    if let Some(stop_reason) = chunk.stop_reason() {
        events.push(StreamEvent::MessageDelta { stop_reason });
    }
    Ok(events)
}

/// Create a streaming SSE connection to the Gemini API.
///
/// Nothing is sent until the returned stream is first polled. Dropping the
/// stream drops the response body and with it the connection.
///
/// # Arguments
///
/// * `client` - Shared reqwest HTTP client
/// * `url` - Full endpoint URL including `?alt=sse`
/// * `body` - Gemini request body
/// * `api_key` - API key wrapped in SecretString, sent as `x-goog-api-key`
pub fn create_gemini_stream(
    client: &reqwest::Client,
    url: &str,
    body: GeminiRequest,
    api_key: &SecretString,
) -> LlmEventStream {
    let client = client.clone();
    let url = url.to_string();
    let api_key = SecretString::from(api_key.expose_secret());

    Box::pin(async_stream::try_stream! {
        let response = client
            .post(&url)
            .header("x-goog-api-key", api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        let response = check_status(response).await?;

        yield StreamEvent::Connected;

        let mut events = response.bytes_stream().eventsource();
        let mut chunks = 0usize;
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| match e {
                EventStreamError::Transport(e) => network_error(e),
                other => LlmError::Stream(other.to_string()),
            })?;
            chunks += 1;
            for ev in process_gemini_chunk(&event.data)? {
                yield ev;
            }
        }

        tracing::debug!(chunks, "Gemini stream closed");
        yield StreamEvent::Done;
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamchat_types::llm::{StopReason, Usage};

    #[test]
    fn test_process_text_chunk() {
        let data = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hi"},{"text":" there"}]}}]}"#;
        let events = process_gemini_chunk(data).unwrap();
        assert_eq!(
            events,
            vec![StreamEvent::TextDelta {
                text: "Hi there".to_string()
            }]
        );
    }

    #[test]
    fn test_process_final_chunk() {
        let data = r#"{"candidates":[{"content":{"parts":[{"text":"!"}]},"finishReason":"STOP"}],
            "usageMetadata":{"promptTokenCount":4,"candidatesTokenCount":9}}"#;
        let events = process_gemini_chunk(data).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[1],
            StreamEvent::Usage(Usage {
                input_tokens: 4,
                output_tokens: 9
            })
        );
        assert_eq!(
            events[2],
            StreamEvent::MessageDelta {
                stop_reason: StopReason::EndTurn
            }
        );
    }

    #[test]
    fn test_process_empty_data_is_skipped() {
        assert!(process_gemini_chunk("").unwrap().is_empty());
        assert!(process_gemini_chunk("   ").unwrap().is_empty());
    }

    #[test]
    fn test_process_error_payload() {
        let data = r#"{"error":{"code":503,"message":"The model is overloaded.","status":"UNAVAILABLE"}}"#;
        match process_gemini_chunk(data) {
            Err(LlmError::Upstream { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "The model is overloaded.");
            }
            other => panic!("expected Upstream error, got {other:?}"),
        }
    }

    #[test]
    fn test_process_malformed_payload() {
        assert!(matches!(
            process_gemini_chunk("{not json"),
            Err(LlmError::Deserialization(_))
        ));
    }
}
