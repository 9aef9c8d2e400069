//! Environment variable secret provider.
//!
//! Reads secrets straight from the process environment. Values from a
//! `.env` file are visible here once `dotenvy` has loaded it.

use super::SecretProvider;

/// Environment variable secret provider.
pub struct EnvSecretProvider;

impl EnvSecretProvider {
    /// Create a new environment variable secret provider.
    pub fn new() -> Self {
        Self
    }
}

impl Default for EnvSecretProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretProvider for EnvSecretProvider {
    fn get(&self, key: &str) -> Option<String> {
        match std::env::var(key) {
            Ok(val) => Some(val),
            Err(std::env::VarError::NotPresent) => None,
            Err(std::env::VarError::NotUnicode(_)) => {
                // Secrets must be valid strings
                tracing::warn!(key, "Ignoring non-UTF-8 environment variable");
                None
            }
        }
    }
}
