//! Configuration types for streamchat.
//!
//! `StreamchatConfig` mirrors the optional `streamchat.toml` file. Every
//! field has a default, so an empty file (or no file) is a valid config.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::llm::ProviderType;

/// Gemini models offered when none are configured.
pub const GEMINI_MODELS: [&str; 3] = [
    "gemini-2.5-flash-lite-preview-06-17",
    "gemini-2.5-flash-preview-04-17",
    "gemini-2.5-pro-preview-05-06",
];

pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-04-17";

/// Free-tier OpenRouter models offered when none are configured.
pub const OPENROUTER_MODELS: [&str; 3] = [
    "deepseek/deepseek-chat:free",
    "deepseek/deepseek-r1:free",
    "meta-llama/llama-3.3-70b-instruct:free",
];

pub const OPENROUTER_DEFAULT_MODEL: &str = "deepseek/deepseek-chat:free";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamchatConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub generation: GenerationSettings,
}

impl StreamchatConfig {
    /// Defaults for `kind` with its built-in models filled in.
    pub fn for_provider(kind: ProviderType) -> Self {
        Self {
            provider: ProviderSettings::for_kind(kind),
            ..Self::default()
        }
    }

    /// Check the cross-field rules that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let provider = &self.provider;
        if provider.default_model.trim().is_empty() {
            return Err(ConfigError::EmptyModels);
        }
        // A custom base URL may serve any naming scheme.
        if provider.base_url.is_none() {
            let mismatch = provider
                .models
                .iter()
                .chain([&provider.default_model])
                .find(|m| !provider.kind.accepts_model_id(m));
            if let Some(model) = mismatch {
                return Err(ConfigError::ModelNotForProvider {
                    model: model.clone(),
                    provider: provider.kind.to_string(),
                });
            }
        }
        if !provider.models.is_empty() && !provider.is_model_allowed(&provider.default_model) {
            return Err(ConfigError::UnknownDefaultModel(
                provider.default_model.clone(),
            ));
        }
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort("0".to_string()));
        }
        Ok(())
    }
}

/// Where the HTTP server listens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Which completion API to call and which models it offers.
///
/// `models` and `default_model` start out blank and are filled from the
/// provider kind by [`ProviderSettings::fill_defaults`] once every layer has
/// been applied, so switching `kind` also switches the built-in models.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub kind: ProviderType,
    /// Override the provider's default base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Models a session may select. Empty together with an explicit
    /// `default_model` means any identifier is accepted.
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub default_model: String,
}

impl ProviderSettings {
    /// Settings for `kind` with its built-in models.
    pub fn for_kind(kind: ProviderType) -> Self {
        let mut settings = Self {
            kind,
            ..Self::default()
        };
        settings.fill_defaults();
        settings
    }

    /// Built-in model list and default for a provider kind.
    pub fn builtin_models(kind: ProviderType) -> (&'static [&'static str], &'static str) {
        match kind {
            ProviderType::Gemini => (&GEMINI_MODELS, GEMINI_DEFAULT_MODEL),
            ProviderType::OpenRouter => (&OPENROUTER_MODELS, OPENROUTER_DEFAULT_MODEL),
        }
    }

    /// Fill blank model settings.
    ///
    /// Neither set: the kind's built-in list and default. Only a list: its
    /// first entry becomes the default. Only a default: the list stays empty.
    pub fn fill_defaults(&mut self) {
        if self.default_model.trim().is_empty() {
            match self.models.first() {
                Some(first) => self.default_model = first.clone(),
                None => {
                    let (models, default) = Self::builtin_models(self.kind);
                    self.models = models.iter().map(|m| m.to_string()).collect();
                    self.default_model = default.to_string();
                }
            }
        }
    }

    pub fn is_model_allowed(&self, model: &str) -> bool {
        self.models.is_empty() || self.models.iter().any(|m| m == model)
    }
}

/// Knobs applied to every completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Reasoning token budget. `0` turns thinking off.
    #[serde(default)]
    pub thinking_budget: u32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: u32,
}

fn default_max_output_tokens() -> u32 {
    8192
}

fn default_max_context_tokens() -> u32 {
    1_000_000
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            system_prompt: None,
            temperature: None,
            thinking_budget: 0,
            max_output_tokens: default_max_output_tokens(),
            max_context_tokens: default_max_context_tokens(),
        }
    }
}
