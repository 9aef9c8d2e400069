//! OpenAI-compatible LLM provider implementation.
//!
//! A single [`OpenAiCompatibleProvider`] talks to OpenRouter, or to any
//! endpoint speaking the OpenAI chat completions protocol when a base URL
//! is configured.
//!
//! Request and response bodies are the [`async_openai`] chat types. The
//! HTTP calls go through `reqwest` directly and the SSE body is parsed with
//! `eventsource-stream`, so a failed request is reported once and never
//! re-sent behind the caller's back.

pub mod config;
pub mod streaming;

use std::time::Duration;

use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, ChatCompletionStreamOptions,
    CreateChatCompletionRequest, CreateChatCompletionResponse,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use streamchat_core::llm::provider::{LlmEventStream, LlmProvider};
use streamchat_types::chat::Role;
use streamchat_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StopReason, Usage,
};

use self::config::OpenAiCompatConfig;
use self::streaming::{create_openai_stream, map_finish_reason};

/// Provider for OpenRouter and other OpenAI-compatible APIs.
///
/// # API Key Security
///
/// Does NOT derive Debug. The key is a [`SecretString`] and is only exposed
/// when building the `Authorization` header.
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    provider_name: String,
    capabilities: ProviderCapabilities,
}

/// `{"error": {"message": ..., "code": ...}}`. OpenAI sends a string
/// `code`, OpenRouter a numeric one.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: String,
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn status(&self) -> Option<u16> {
        self.code
            .as_ref()
            .and_then(serde_json::Value::as_u64)
            .and_then(|c| u16::try_from(c).ok())
    }
}

impl OpenAiCompatibleProvider {
    /// Create a new OpenAI-compatible provider from a configuration.
    ///
    /// Only the connect phase has a timeout; a long reply is never cut off.
    pub fn new(config: OpenAiCompatConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LlmError::Provider {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key: config.api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            provider_name: config.provider_name,
            capabilities: config.capabilities,
        })
    }

    /// Create an OpenRouter provider.
    ///
    /// Uses `https://openrouter.ai/api/v1` as the base URL.
    pub fn openrouter(api_key: SecretString) -> Result<Self, LlmError> {
        Self::new(config::openrouter_defaults(api_key))
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Build a [`CreateChatCompletionRequest`] from a generic [`CompletionRequest`].
    fn build_request(&self, request: &CompletionRequest, stream: bool) -> CreateChatCompletionRequest {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();

        if let Some(ref system) = request.system {
            messages.push(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(system.clone()),
                    name: None,
                },
            ));
        }

        for msg in &request.messages {
            let oai_msg = match msg.role {
                Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                    content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                    name: None,
                }),
                Role::Assistant => {
                    #[allow(deprecated)]
                    ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                        content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                            msg.content.clone(),
                        )),
                        refusal: None,
                        name: None,
                        audio: None,
                        tool_calls: None,
                        function_call: None,
                    })
                }
            };
            messages.push(oai_msg);
        }

        let mut req = CreateChatCompletionRequest {
            model: request.model.clone(),
            messages,
            max_completion_tokens: Some(request.max_tokens),
            temperature: request.temperature.map(|t| t as f32),
            ..Default::default()
        };

        if stream {
            req.stream = Some(true);
            req.stream_options = Some(ChatCompletionStreamOptions {
                include_usage: Some(true),
                include_obfuscation: None,
            });
        }

        req
    }
}

/// A request that never produced a response, or a body read that broke.
pub fn network_error(err: reqwest::Error) -> LlmError {
    LlmError::Network(err.to_string())
}

/// Classify a non-success response, preferring the API's own message.
pub fn error_from_status(status: u16, body: &str) -> LlmError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|env| env.error.message)
        .unwrap_or_else(|_| body.to_string());

    match status {
        401 => LlmError::AuthenticationFailed,
        429 => LlmError::RateLimited {
            retry_after_ms: None,
        },
        _ => LlmError::Upstream {
            status,
            body: message,
        },
    }
}

/// Pass a success response through; turn anything else into an error,
/// logging the status and body.
pub async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(
        status = status.as_u16(),
        body = %body,
        "Completion API returned an error status"
    );
    Err(error_from_status(status.as_u16(), &body))
}

impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.build_request(request, false);

        let response = self
            .client
            .post(self.url())
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;
        let response = check_status(response).await?;

        let response: CreateChatCompletionResponse = response.json().await.map_err(|e| {
            LlmError::Deserialization(format!("failed to parse response: {e}"))
        })?;

        let choice = response.choices.first();
        let content = choice
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();
        let stop_reason = choice
            .and_then(|c| c.finish_reason.as_ref())
            .map(map_finish_reason)
            .unwrap_or(StopReason::EndTurn);
        let usage = response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            id: response.id,
            content,
            model: response.model,
            stop_reason,
            usage,
        })
    }

    fn stream(&self, request: CompletionRequest) -> LlmEventStream {
        let body = self.build_request(&request, true);
        create_openai_stream(&self.client, &self.url(), body, &self.api_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Json;
    use axum::Router;
    use axum::body::{Body, Bytes};
    use axum::http::{HeaderMap, StatusCode, header};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use futures_util::StreamExt;
    use streamchat_types::llm::{Message, StreamEvent};

    type Captured = Arc<Mutex<Vec<(String, serde_json::Value)>>>;

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// Answers every request with `body` as an SSE stream and records the
    /// `Authorization` header and the JSON body it received.
    async fn sse_server(body: &'static str) -> (String, Captured) {
        let captured: Captured = Arc::default();
        let seen = captured.clone();
        let router = Router::new().route(
            "/chat/completions",
            post(
                move |headers: HeaderMap, Json(request): Json<serde_json::Value>| {
                    let seen = seen.clone();
                    async move {
                        let auth = headers
                            .get(header::AUTHORIZATION)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string();
                        seen.lock().unwrap().push((auth, request));
                        ([(header::CONTENT_TYPE, "text/event-stream")], body)
                    }
                },
            ),
        );
        (spawn_server(router).await, captured)
    }

    fn provider_at(base_url: &str) -> OpenAiCompatibleProvider {
        let mut config = config::openrouter_defaults(SecretString::from("sk-or-test"));
        config.base_url = base_url.to_string();
        OpenAiCompatibleProvider::new(config).unwrap()
    }

    fn provider() -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::openrouter(SecretString::from("sk-or-test")).unwrap()
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "deepseek/deepseek-chat:free".to_string(),
            messages: vec![Message::user("Hello"), Message::assistant("Hi there!")],
            system: Some("Be helpful".to_string()),
            max_tokens: 1024,
            temperature: Some(0.7),
            thinking_budget: Some(0),
            stream: false,
        }
    }

    #[test]
    fn test_openrouter_factory() {
        let provider = provider();
        assert_eq!(provider.name(), "openrouter");
        assert!(provider.capabilities().streaming);
        assert_eq!(provider.capabilities().max_output_tokens, 16_384);
        assert_eq!(provider.url(), "https://openrouter.ai/api/v1/chat/completions");
    }

    #[test]
    fn test_build_request_messages() {
        let oai_req = provider().build_request(&request(), false);
        assert_eq!(oai_req.model, "deepseek/deepseek-chat:free");
        // 1 system + 2 conversation = 3 messages
        assert_eq!(oai_req.messages.len(), 3);
        assert!(matches!(
            oai_req.messages[2],
            ChatCompletionRequestMessage::Assistant(_)
        ));
        assert_eq!(oai_req.max_completion_tokens, Some(1024));
        assert!(oai_req.stream.is_none());
        assert!(oai_req.stream_options.is_none());
    }

    #[test]
    fn test_build_request_streaming() {
        let oai_req = provider().build_request(&request(), true);
        assert_eq!(oai_req.stream, Some(true));
        let opts = oai_req.stream_options.unwrap();
        assert_eq!(opts.include_usage, Some(true));
    }

    #[test]
    fn test_error_from_status() {
        assert!(matches!(
            error_from_status(401, r#"{"error":{"message":"No auth credentials found","code":401}}"#),
            LlmError::AuthenticationFailed
        ));
        assert!(matches!(
            error_from_status(429, ""),
            LlmError::RateLimited { .. }
        ));
        match error_from_status(400, r#"{"error":{"message":"not a valid model ID","code":400}}"#) {
            LlmError::Upstream { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "not a valid model ID");
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
        match error_from_status(502, "Bad Gateway") {
            LlmError::Upstream { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "Bad Gateway");
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stream_deltas_usage_and_done() {
        let body = concat!(
            ": OPENROUTER PROCESSING\n\n",
            "data: {\"id\":\"gen-1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"m\",",
            "\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"Hel\"}}]}\n\n",
            "data: {\"id\":\"gen-1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"m\",",
            "\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"},\"finish_reason\":\"stop\"}]}\n\n",
            "data: {\"id\":\"gen-1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"m\",",
            "\"choices\":[],\"usage\":{\"prompt_tokens\":5,\"completion_tokens\":2,\"total_tokens\":7}}\n\n",
            "data: [DONE]\n\n",
        );
        let (base, captured) = sse_server(body).await;

        let events: Vec<_> = provider_at(&base)
            .stream(request())
            .map(|e| e.unwrap())
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                StreamEvent::Connected,
                StreamEvent::TextDelta {
                    text: "Hel".to_string()
                },
                StreamEvent::TextDelta {
                    text: "lo".to_string()
                },
                StreamEvent::MessageDelta {
                    stop_reason: StopReason::EndTurn
                },
                StreamEvent::Usage(Usage {
                    input_tokens: 5,
                    output_tokens: 2
                }),
                StreamEvent::Done,
            ]
        );

        let captured = captured.lock().unwrap();
        assert_eq!(captured.len(), 1);
        let (auth, body) = &captured[0];
        assert_eq!(auth, "Bearer sk-or-test");
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["messages"][0]["role"], "system");
    }

    #[tokio::test]
    async fn test_stream_non_success_status() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({
                        "error": {"message": "gemini-2.5-flash is not a valid model ID", "code": 400}
                    })),
                )
                    .into_response()
            }),
        );
        let base = spawn_server(router).await;

        let events: Vec<_> = provider_at(&base).stream(request()).collect().await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            Err(LlmError::Upstream { status, body }) => {
                assert_eq!(*status, 400);
                assert_eq!(body, "gemini-2.5-flash is not a valid model ID");
            }
            other => panic!("expected Upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stream_connection_refused_is_network_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let events: Vec<_> = provider_at(&format!("http://{addr}"))
            .stream(request())
            .collect()
            .await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(LlmError::Network(_))));
    }

    #[tokio::test]
    async fn test_stream_broken_body_is_not_resent() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/chat/completions",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let first = Bytes::from_static(
                        b"data: {\"id\":\"gen-1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"m\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Par\"}}]}\n\n",
                    );
                    let chunks = futures_util::stream::iter(vec![
                        Ok(first),
                        Err(std::io::Error::other("connection reset")),
                    ]);
                    (
                        [(header::CONTENT_TYPE, "text/event-stream")],
                        Body::from_stream(chunks),
                    )
                }
            }),
        );
        let base = spawn_server(router).await;

        let events: Vec<_> = provider_at(&base).stream(request()).collect().await;
        assert!(matches!(events.first(), Some(Ok(StreamEvent::Connected))));
        assert!(matches!(events.last(), Some(Err(LlmError::Network(_)))));

        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_complete() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async {
                Json(serde_json::json!({
                    "id": "gen-42",
                    "object": "chat.completion",
                    "created": 1,
                    "model": "deepseek/deepseek-chat:free",
                    "choices": [{
                        "index": 0,
                        "message": {"role": "assistant", "content": "Hello!"},
                        "finish_reason": "stop"
                    }],
                    "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
                }))
            }),
        );
        let base = spawn_server(router).await;

        let response = provider_at(&base).complete(&request()).await.unwrap();
        assert_eq!(response.id, "gen-42");
        assert_eq!(response.content, "Hello!");
        assert_eq!(response.stop_reason, StopReason::EndTurn);
        assert_eq!(response.usage.input_tokens, 3);
    }
}
