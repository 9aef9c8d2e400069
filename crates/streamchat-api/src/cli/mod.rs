//! CLI definitions for the `streamchat` binary.
//!
//! Uses clap derive macros. With no subcommand the binary serves HTTP,
//! which is what the container runs.

pub mod chat;
pub mod check;
pub mod models;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Streaming chat front-end for hosted LLM APIs.
#[derive(Parser)]
#[command(name = "streamchat", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to a TOML config file (default: ./streamchat.toml if present).
    #[arg(long, global = true, env = "STREAMCHAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, env = "STREAMCHAT_OTEL")]
    pub otel: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "STREAMCHAT_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server with the chat widget.
    Serve {
        /// Port to listen on (overrides PORT and the config file).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to.
        #[arg(long)]
        host: Option<String>,
    },

    /// Chat in the terminal.
    Chat {
        /// Model to start with (default from config).
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Validate the configuration and test the API key.
    Check,

    /// List selectable models.
    Models,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
