//! LLM provider implementations.
//!
//! Contains concrete implementations of the [`LlmProvider`] trait
//! defined in `streamchat-core`: Gemini over its native SSE endpoint and
//! OpenRouter through the OpenAI-compatible client.
//!
//! Also provides a provider factory ([`create_provider`]) that constructs
//! the right provider from [`ProviderSettings`], and a connection test
//! function ([`test_provider_connection`]) for verifying provider connectivity.
//!
//! [`LlmProvider`]: streamchat_core::llm::provider::LlmProvider

pub mod gemini;
pub mod openai_compat;

use secrecy::SecretString;

use streamchat_core::llm::box_provider::BoxLlmProvider;
use streamchat_types::config::ProviderSettings;
use streamchat_types::llm::{CompletionRequest, CompletionResponse, LlmError, Message, ProviderType};

use self::gemini::GeminiProvider;
use self::openai_compat::OpenAiCompatibleProvider;

/// Create a [`BoxLlmProvider`] from [`ProviderSettings`].
///
/// # Arguments
///
/// * `settings` - Provider section of the loaded configuration
/// * `api_key` - The resolved API key for `settings.kind`
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn create_provider(
    settings: &ProviderSettings,
    api_key: SecretString,
) -> Result<BoxLlmProvider, LlmError> {
    match settings.kind {
        ProviderType::Gemini => {
            let mut provider = GeminiProvider::new(api_key)?;
            if let Some(base_url) = settings.base_url.as_deref() {
                provider = provider.with_base_url(base_url);
            }
            Ok(BoxLlmProvider::new(provider))
        }
        ProviderType::OpenRouter => {
            let mut config = openai_compat::config::openrouter_defaults(api_key);
            if let Some(base_url) = settings.base_url.as_deref() {
                config.base_url = base_url.to_string();
            }
            Ok(BoxLlmProvider::new(OpenAiCompatibleProvider::new(config)?))
        }
    }
}

/// Test provider connectivity by sending a minimal completion request.
///
/// Used by `streamchat check` to verify the API key and endpoint before
/// serving. Sends a tiny "Hello" message with a minimal token budget.
///
/// # Errors
///
/// Returns the LLM error if the provider fails to respond.
pub async fn test_provider_connection(
    provider: &BoxLlmProvider,
    model: &str,
) -> Result<CompletionResponse, LlmError> {
    let request = CompletionRequest {
        model: model.to_string(),
        messages: vec![Message::user("Hello")],
        system: None,
        max_tokens: 16,
        temperature: Some(0.0),
        thinking_budget: provider.capabilities().thinking_budget.then_some(0),
        stream: false,
    };
    provider.complete(&request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(kind: ProviderType, base_url: Option<&str>) -> ProviderSettings {
        ProviderSettings {
            kind,
            base_url: base_url.map(str::to_string),
            ..ProviderSettings::default()
        }
    }

    #[test]
    fn test_create_provider_gemini() {
        let provider =
            create_provider(&settings(ProviderType::Gemini, None), SecretString::from("g-key"))
                .unwrap();
        assert_eq!(provider.name(), "gemini");
        assert!(provider.capabilities().thinking_budget);
    }

    #[test]
    fn test_create_provider_openrouter() {
        let provider = create_provider(
            &settings(ProviderType::OpenRouter, None),
            SecretString::from("or-key"),
        )
        .unwrap();
        assert_eq!(provider.name(), "openrouter");
    }

    #[test]
    fn test_create_provider_openrouter_with_base_url() {
        let provider = create_provider(
            &settings(ProviderType::OpenRouter, Some("http://localhost:4000/v1")),
            SecretString::from("local-key"),
        )
        .unwrap();
        assert_eq!(provider.name(), "openrouter");
    }
}
