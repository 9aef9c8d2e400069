//! `streamchat check`: validate the configuration and the API key.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use console::style;

use streamchat_infra::config::{describe_config_path, load_config};
use streamchat_infra::llm::test_provider_connection;

use crate::state::AppState;

/// Load the config, resolve the key, and send a one-word completion with
/// the default model. Any failure is returned so the process exits non-zero.
pub async fn run_check(config_path: Option<&Path>, json: bool) -> Result<()> {
    let shown_path = describe_config_path(config_path);
    let config = load_config(config_path).await?;
    let state = AppState::init(config)?;
    let provider = state.controller.provider();
    let model = state.default_model();

    if !json {
        println!();
        println!(
            "  {} streamchat v{}",
            style("⚡").bold(),
            env!("CARGO_PKG_VERSION")
        );
        println!();
        println!("  {}", style("── Config ──").dim());
        println!("  File:      {}", style(shown_path.display()).dim());
        println!("  Listen:    {}:{}", state.config.server.host, state.config.server.port);
        println!("  Provider:  {}", style(provider.name()).cyan());
        println!("  Model:     {}", style(model).cyan());
        println!("  Models:    {}", state.models().len());
        println!();
        print!("  Testing connection to {} ({})... ", style(provider.name()).cyan(), model);
        let _ = std::io::stdout().flush();
    }

    let result = test_provider_connection(provider, model).await;

    if json {
        let report = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "config_path": shown_path.display().to_string(),
            "provider": provider.name(),
            "default_model": model,
            "models": state.models(),
            "connection": match &result {
                Ok(_) => serde_json::json!({ "ok": true }),
                Err(e) => serde_json::json!({ "ok": false, "error": e.to_string() }),
            },
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    match result {
        Ok(response) => {
            if !json {
                println!("{}", style("connected").green().bold());
                println!(
                    "  {} {}",
                    style("Reply:").dim(),
                    style(response.content.trim()).dim()
                );
                println!();
            }
            Ok(())
        }
        Err(e) => {
            if !json {
                println!("{}", style("FAILED").red().bold());
                println!();
            }
            Err(anyhow::anyhow!("connection test failed: {e}"))
        }
    }
}
