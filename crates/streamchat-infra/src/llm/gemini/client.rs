//! GeminiProvider -- concrete [`LlmProvider`] implementation for the
//! Google Generative Language API.
//!
//! Streaming goes through `:streamGenerateContent?alt=sse`, the one-shot
//! path through `:generateContent`. The API key travels in the
//! `x-goog-api-key` header, never in the query string.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use streamchat_core::llm::provider::{LlmEventStream, LlmProvider};
use streamchat_observe::genai_attrs;
use streamchat_types::chat::Role;
use streamchat_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StopReason,
};

use super::streaming::create_gemini_stream;
use super::types::{
    GeminiContent, GeminiErrorEnvelope, GeminiRequest, GeminiResponse, GenerationConfig,
    ThinkingConfig,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini LLM provider.
///
/// # API Key Security
///
/// The API key is stored as a [`SecretString`] and is only exposed when
/// constructing HTTP request headers. It never appears in Debug output,
/// Display output, or tracing logs.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    capabilities: ProviderCapabilities,
}

impl GeminiProvider {
    /// Create a provider talking to the public endpoint.
    ///
    /// Only the connect phase has a timeout; a long reply is never cut off.
    pub fn new(api_key: SecretString) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LlmError::Provider {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            capabilities: ProviderCapabilities {
                streaming: true,
                thinking_budget: true,
                max_context_tokens: 1_048_576,
                max_output_tokens: 65_536,
            },
        })
    }

    /// Override the base URL (useful for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{model}:{method}", self.base_url)
    }

    /// Convert a generic [`CompletionRequest`] into a [`GeminiRequest`].
    fn to_gemini_request(&self, request: &CompletionRequest) -> GeminiRequest {
        let contents = request
            .messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                GeminiContent::text(Some(role), m.content.clone())
            })
            .collect();

        GeminiRequest {
            contents,
            system_instruction: request
                .system
                .as_ref()
                .map(|s| GeminiContent::text(None, s.clone())),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                thinking_config: request
                    .thinking_budget
                    .map(|thinking_budget| ThinkingConfig { thinking_budget }),
            },
        }
    }
}

/// A request that never produced a response, or a body read that broke.
pub fn network_error(err: reqwest::Error) -> LlmError {
    LlmError::Network(err.to_string())
}

/// Classify a non-success response. The API's own error message is used
/// as the body when the payload is a recognizable error envelope.
pub fn error_from_status(status: u16, body: &str) -> LlmError {
    let message = serde_json::from_str::<GeminiErrorEnvelope>(body)
        .map(|env| env.error.message)
        .unwrap_or_else(|_| body.to_string());

    match status {
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

// GeminiProvider intentionally does NOT derive Debug to prevent
// accidental exposure of internal state.

impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        genai_attrs::PROVIDER_GEMINI
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.to_gemini_request(request);
        let url = self.url(&request.model, "generateContent");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;
        let response = check_status(response).await?;

        let gemini_resp: GeminiResponse = response.json().await.map_err(|e| {
            LlmError::Deserialization(format!("failed to parse response: {e}"))
        })?;

        if let Some(err) = gemini_resp.error {
            return Err(LlmError::Upstream {
                status: err.code.unwrap_or(500),
                body: err.message,
            });
        }

        Ok(CompletionResponse {
            id: gemini_resp.response_id.clone().unwrap_or_default(),
            content: gemini_resp.text(),
            model: gemini_resp
                .model_version
                .clone()
                .unwrap_or_else(|| request.model.clone()),
            stop_reason: gemini_resp.stop_reason().unwrap_or(StopReason::EndTurn),
            usage: gemini_resp.usage().unwrap_or_default(),
        })
    }

    fn stream(&self, request: CompletionRequest) -> LlmEventStream {
        let body = self.to_gemini_request(&request);
        let url = self.url(&request.model, "streamGenerateContent?alt=sse");

        create_gemini_stream(&self.client, &url, body, &self.api_key)
    }
}
