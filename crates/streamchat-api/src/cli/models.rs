//! `streamchat models`: list the models a session may select.

use anyhow::Result;
use console::style;

use streamchat_types::config::StreamchatConfig;

pub fn print_models(config: &StreamchatConfig, json: bool) -> Result<()> {
    let provider = &config.provider;

    if json {
        let out = serde_json::json!({
            "provider": provider.kind.to_string(),
            "default_model": provider.default_model,
            "models": provider.models,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style("Models for").bold(),
        style(provider.kind.to_string()).cyan().bold()
    );
    println!();
    if provider.models.is_empty() {
        println!(
            "  {}",
            style("No list configured; any model identifier is accepted.").dim()
        );
        println!("  {} {} (default)", style("*").green().bold(), provider.default_model);
    }
    for model in &provider.models {
        if *model == provider.default_model {
            println!("  {} {} {}", style("*").green().bold(), model, style("(default)").dim());
        } else {
            println!("    {model}");
        }
    }
    println!();
    Ok(())
}
