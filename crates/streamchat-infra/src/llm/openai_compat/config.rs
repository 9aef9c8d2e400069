//! Configuration and defaults for OpenAI-compatible providers.
//!
//! The only preset is OpenRouter; any other endpoint that speaks the OpenAI
//! chat completions protocol can be reached by overriding `base_url`.

use secrecy::SecretString;

use streamchat_observe::genai_attrs;
use streamchat_types::llm::ProviderCapabilities;

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Configuration for an OpenAI-compatible LLM provider.
///
/// Used to construct an [`super::OpenAiCompatibleProvider`].
pub struct OpenAiCompatConfig {
    /// Human-readable provider name (e.g., "openrouter").
    pub provider_name: String,
    /// Base URL for the API (e.g., "https://openrouter.ai/api/v1").
    pub base_url: String,
    /// API key for authentication.
    pub api_key: SecretString,
    /// What this provider supports.
    pub capabilities: ProviderCapabilities,
}

/// OpenRouter default configuration.
///
/// Base URL: `https://openrouter.ai/api/v1`
/// Capabilities: streaming; 128K context, 16K output. Routed models vary,
/// so these are conservative.
pub fn openrouter_defaults(api_key: SecretString) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: genai_attrs::PROVIDER_OPENROUTER.into(),
        base_url: OPENROUTER_BASE_URL.into(),
        api_key,
        capabilities: ProviderCapabilities {
            streaming: true,
            thinking_budget: false,
            max_context_tokens: 128_000,
            max_output_tokens: 16_384,
        },
    }
}
