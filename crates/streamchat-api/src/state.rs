//! Application state shared by the HTTP server and the terminal chat.
//!
//! One [`ChatTurnController`] serves every session. Sessions themselves are
//! owned by their connection and never stored here.

use std::sync::Arc;

use streamchat_core::chat::ChatTurnController;
use streamchat_core::llm::box_provider::BoxLlmProvider;
use streamchat_infra::llm::create_provider;
use streamchat_infra::secret::{EnvSecretProvider, resolve_api_key};
use streamchat_types::config::StreamchatConfig;

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<ChatTurnController>,
    pub config: Arc<StreamchatConfig>,
}

impl AppState {
    pub fn new(config: StreamchatConfig, provider: BoxLlmProvider) -> Self {
        let controller = ChatTurnController::new(Arc::new(provider), config.generation.clone());
        Self {
            controller: Arc::new(controller),
            config: Arc::new(config),
        }
    }

    /// Resolve the API key from the environment and build the provider.
    ///
    /// Fails with `ConfigError::MissingApiKey` when the key is unset, so
    /// callers can refuse to start before binding a port.
    pub fn init(config: StreamchatConfig) -> anyhow::Result<Self> {
        let api_key = resolve_api_key(&EnvSecretProvider::new(), config.provider.kind)?;
        let provider = create_provider(&config.provider, api_key)?;
        tracing::info!(
            provider = provider.name(),
            default_model = %config.provider.default_model,
            models = config.provider.models.len(),
            "Completion provider ready"
        );
        Ok(Self::new(config, provider))
    }

    /// Models a session may pick. Empty means any identifier.
    pub fn models(&self) -> &[String] {
        &self.config.provider.models
    }

    pub fn default_model(&self) -> &str {
        &self.config.provider.default_model
    }
}
