//! Configuration loader for streamchat.
//!
//! Layers, lowest to highest: built-in defaults, the TOML file, environment
//! variables. CLI flags are applied on top by the binary.
//!
//! The TOML file is `streamchat.toml` in the working directory unless a path
//! is given. An explicitly given file must exist; the default one may not.

use std::path::{Path, PathBuf};

use streamchat_types::config::StreamchatConfig;
use streamchat_types::error::ConfigError;
use streamchat_types::llm::ProviderType;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "streamchat.toml";

/// Load `.env` from the working directory (or a parent) into the process
/// environment. Variables already set are left alone.
///
/// Runs before tracing is installed, so the outcome is returned for the
/// caller to log: the file loaded, `None` when there is no `.env`, or the
/// error for a file that exists but could not be read.
pub fn load_dotenv() -> Result<Option<PathBuf>, dotenvy::Error> {
    dotenv_outcome(dotenvy::dotenv())
}

fn dotenv_outcome(
    result: Result<PathBuf, dotenvy::Error>,
) -> Result<Option<PathBuf>, dotenvy::Error> {
    match result {
        Ok(path) => Ok(Some(path)),
        Err(err) if err.not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

/// Load configuration from the file (if any) and the process environment,
/// then validate it.
pub async fn load_config(path: Option<&Path>) -> Result<StreamchatConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config_file(path, true).await?,
        None => read_config_file(Path::new(DEFAULT_CONFIG_FILE), false).await?,
    };
    resolve_config(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Apply the environment on top of `config`, fill model defaults for the
/// provider kind that results, and validate.
pub fn resolve_config(
    config: &mut StreamchatConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    apply_env_overrides(config, lookup)?;
    config.provider.fill_defaults();
    config.validate()
}

/// Read and parse a TOML config file.
///
/// A missing file yields the defaults unless `required` is set.
pub async fn read_config_file(
    path: &Path,
    required: bool,
) -> Result<StreamchatConfig, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound && !required => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(StreamchatConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            });
        }
    };

    let config = toml::from_str::<StreamchatConfig>(&content).map_err(|err| {
        ConfigError::Parse {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    })?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Apply environment overrides using `lookup` to read variables.
///
/// Unset and blank variables leave the current value in place.
///
/// | variable | field |
/// |---|---|
/// | `PORT` | `server.port` |
/// | `STREAMCHAT_HOST` | `server.host` |
/// | `STREAMCHAT_PROVIDER` | `provider.kind` |
/// | `STREAMCHAT_BASE_URL` | `provider.base_url` |
/// | `STREAMCHAT_MODELS` | `provider.models` (comma separated) |
/// | `STREAMCHAT_DEFAULT_MODEL` | `provider.default_model` |
/// | `STREAMCHAT_SYSTEM_PROMPT` | `generation.system_prompt` |
/// | `STREAMCHAT_TEMPERATURE` | `generation.temperature` |
/// | `STREAMCHAT_THINKING_BUDGET` | `generation.thinking_budget` |
pub fn apply_env_overrides(
    config: &mut StreamchatConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(port) = var("PORT") {
        config.server.port = port
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
    }
    if let Some(host) = var("STREAMCHAT_HOST") {
        config.server.host = host.trim().to_string();
    }
    if let Some(kind) = var("STREAMCHAT_PROVIDER") {
        config.provider.kind = kind
            .trim()
            .parse::<ProviderType>()
            .map_err(|_| ConfigError::InvalidProvider(kind.clone()))?;
    }
    if let Some(base_url) = var("STREAMCHAT_BASE_URL") {
        config.provider.base_url = Some(base_url.trim().to_string());
    }
    if let Some(models) = var("STREAMCHAT_MODELS") {
        config.provider.models = models
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(model) = var("STREAMCHAT_DEFAULT_MODEL") {
        config.provider.default_model = model.trim().to_string();
    }
    if let Some(prompt) = var("STREAMCHAT_SYSTEM_PROMPT") {
        config.generation.system_prompt = Some(prompt);
    }
    if let Some(temperature) = var("STREAMCHAT_TEMPERATURE") {
        let value = temperature
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|t| (0.0..=2.0).contains(t))
            .ok_or_else(|| ConfigError::InvalidValue {
                var: "STREAMCHAT_TEMPERATURE".to_string(),
                value: temperature.clone(),
            })?;
        config.generation.temperature = Some(value);
    }
    if let Some(budget) = var("STREAMCHAT_THINKING_BUDGET") {
        config.generation.thinking_budget =
            budget
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    var: "STREAMCHAT_THINKING_BUDGET".to_string(),
                    value: budget.clone(),
                })?;
    }
    Ok(())
}

/// Path shown to the user for the config in effect.
pub fn describe_config_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}
