//! Secret provider implementations.
//!
//! - `env`: Environment variable provider (read-only)
//!
//! [`resolve_api_key`] turns whatever a provider returns into the
//! [`SecretString`] handed to the completion provider.

pub mod env;

use secrecy::SecretString;

use streamchat_types::error::ConfigError;
use streamchat_types::llm::ProviderType;

pub use env::EnvSecretProvider;

/// A read-only source of named secrets.
pub trait SecretProvider {
    /// Look up `key`. `None` when the secret is not set.
    fn get(&self, key: &str) -> Option<String>;
}

/// Resolve the API key for `kind` from `secrets`.
///
/// A blank value counts as missing.
///
/// # Errors
///
/// Returns [`ConfigError::MissingApiKey`] naming the variable to set.
pub fn resolve_api_key(
    secrets: &impl SecretProvider,
    kind: ProviderType,
) -> Result<SecretString, ConfigError> {
    let var = kind.api_key_var();
    match secrets.get(var) {
        Some(value) if !value.trim().is_empty() => {
            tracing::debug!(var, provider = %kind, "API key resolved");
            Ok(SecretString::from(value.trim().to_string()))
        }
        _ => Err(ConfigError::MissingApiKey {
            var: var.to_string(),
        }),
    }
}
