//! streamchat entry point.
//!
//! Binary name: `streamchat`
//!
//! Loads `.env`, sets up tracing, loads configuration, then serves HTTP
//! (the default) or runs one of the CLI commands. Configuration and API-key
//! errors are reported before any port is bound.

mod cli;
mod http;
mod state;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use clap_complete::generate;

use streamchat_infra::config::{load_config, load_dotenv};
use streamchat_observe::tracing_setup::{
    TracingOptions, filter_for_verbosity, init_tracing, shutdown_tracing,
};
use streamchat_types::config::StreamchatConfig;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Before parsing, so `.env` can supply clap's env-backed flags.
    let dotenv = load_dotenv();
    let cli = Cli::parse();

    // Shell completions don't need tracing or config
    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        generate(*shell, &mut cmd, "streamchat", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(&TracingOptions {
        otel: cli.otel,
        json: cli.log_json,
        default_filter: filter_for_verbosity(cli.verbose, cli.quiet),
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    match dotenv {
        Ok(Some(path)) => tracing::debug!("Loaded environment from {}", path.display()),
        Ok(None) => {}
        Err(err) => tracing::warn!("Failed to load .env: {err}"),
    }

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        None => serve(load_config(config_path).await?).await,

        Some(Commands::Serve { port, host }) => {
            let mut config = load_config(config_path).await?;
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            config.validate()?;
            serve(config).await
        }

        Some(Commands::Chat { model }) => {
            let state = AppState::init(load_config(config_path).await?)?;
            cli::chat::loop_runner::run_chat_loop(&state, model.as_deref()).await
        }

        Some(Commands::Check) => cli::check::run_check(config_path, cli.json).await,

        Some(Commands::Models) => {
            cli::models::print_models(&load_config(config_path).await?, cli.json)
        }

        Some(Commands::Completions { .. }) => unreachable!("handled in main"),
    }
}

async fn serve(config: StreamchatConfig) -> anyhow::Result<()> {
    let state = AppState::init(config)?;

    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, "Listening");

    println!(
        "  {} streamchat listening on {}",
        console::style("⚡").bold(),
        console::style(format!("http://{local_addr}")).cyan()
    );
    println!("  {}", console::style("Press Ctrl+C to stop").dim());

    let router = http::router::build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
///
/// A signal handler that cannot be installed never fires; the other one
/// still can.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
