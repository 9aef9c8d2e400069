//! Terminal chat loop.
//!
//! Drives the same [`ChatTurnController`] as the WebSocket transport and
//! prints each fragment as it arrives. Ctrl+C while a reply streams
//! abandons it; lines typed meanwhile are refused.
//!
//! [`ChatTurnController`]: streamchat_core::chat::ChatTurnController

use std::io::Write;

use console::style;
use futures_util::StreamExt;
use rustyline_async::SharedWriter;

use streamchat_core::chat::{ChatSession, TurnSummary};
use streamchat_types::chat::{Fragment, ModelSelection, Role};
use streamchat_types::error::TurnError;

use crate::state::AppState;

use super::banner::print_welcome_banner;
use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent};

const HISTORY_PREVIEW_CHARS: usize = 100;

/// Run an interactive chat session until `/exit` or Ctrl+D.
pub async fn run_chat_loop(state: &AppState, model: Option<&str>) -> anyhow::Result<()> {
    let mut session = ChatSession::new(ModelSelection::new(state.default_model()));
    if let Some(model) = model {
        session.set_model(model, state.models())?;
    }

    print_welcome_banner(
        state.controller.provider().name(),
        session.model().as_str(),
        &session.id().to_string(),
    );

    let prompt = format!("{} ", style("You >").green().bold());
    let (mut input, mut out) =
        ChatInput::new(prompt).map_err(|e| anyhow::anyhow!("Failed to initialize input: {e}"))?;

    loop {
        let text = match input.read_line().await {
            InputEvent::Eof => break,
            InputEvent::Interrupted => {
                writeln!(
                    out,
                    "  {}",
                    style("Press Ctrl+D to exit, or keep chatting.").dim()
                )?;
                continue;
            }
            InputEvent::Message(text) if text.is_empty() => continue,
            InputEvent::Message(text) => text,
        };

        if let Some(cmd) = commands::parse(&text) {
            match cmd {
                ChatCommand::Exit => break,
                ChatCommand::Clear => input.clear(),
                other => run_command(state, &mut session, &mut out, other)?,
            }
            continue;
        }

        stream_reply(state, &mut session, &mut input, &mut out, &text).await?;
    }

    writeln!(out, "\n  {}", style("Session ended.").dim())?;
    tracing::info!(
        session_id = %session.id(),
        turns = session.log().len(),
        "Terminal chat ended"
    );
    Ok(())
}

fn run_command(
    state: &AppState,
    session: &mut ChatSession,
    out: &mut SharedWriter,
    cmd: ChatCommand,
) -> std::io::Result<()> {
    match cmd {
        ChatCommand::Help => commands::print_help(out),
        ChatCommand::Models => {
            writeln!(out)?;
            if state.models().is_empty() {
                writeln!(
                    out,
                    "  {}",
                    style("Any model identifier is accepted.").dim()
                )?;
            }
            for model in state.models() {
                let marker = if model == session.model().as_str() {
                    style("*").green().bold()
                } else {
                    style(" ")
                };
                writeln!(out, "  {marker} {model}")?;
            }
            writeln!(out)
        }
        ChatCommand::Model(None) => {
            writeln!(out, "\n  {}  {}\n", style("Model:").bold(), session.model())
        }
        ChatCommand::Model(Some(name)) => match session.set_model(&name, state.models()) {
            Ok(()) => writeln!(
                out,
                "\n  {} Switched to {}\n",
                style("*").cyan().bold(),
                style(session.model()).cyan()
            ),
            Err(err) => print_error(out, &err),
        },
        ChatCommand::Reset => match session.reset() {
            Ok(()) => writeln!(
                out,
                "\n  {} Conversation cleared.\n",
                style("*").cyan().bold()
            ),
            Err(err) => print_error(out, &err),
        },
        ChatCommand::History => {
            writeln!(out)?;
            if session.log().is_empty() {
                writeln!(out, "  {}", style("No messages yet.").dim())?;
            }
            for turn in session.log().iter() {
                let label = match turn.role {
                    Role::User => style("You").green().bold(),
                    Role::Assistant => style("Assistant").cyan().bold(),
                };
                writeln!(out, "  {label} {}", preview(&turn.content))?;
            }
            writeln!(out)
        }
        ChatCommand::Unknown(name) => writeln!(
            out,
            "\n  {} Unknown command: {}. Type /help for available commands.\n",
            style("?").yellow().bold(),
            style(name).dim()
        ),
        ChatCommand::Exit | ChatCommand::Clear => Ok(()),
    }
}

enum ReplyEvent {
    Fragment(Option<Fragment>),
    Input(InputEvent),
}

async fn stream_reply(
    state: &AppState,
    session: &mut ChatSession,
    input: &mut ChatInput,
    out: &mut SharedWriter,
    text: &str,
) -> anyhow::Result<()> {
    let mut stream = match state.controller.submit_message(session, text) {
        Ok(stream) => stream,
        Err(err) => return Ok(print_error(out, &err)?),
    };

    write!(out, "\n{} ", style("Assistant >").cyan().bold())?;
    out.flush()?;

    loop {
        let event = tokio::select! {
            fragment = stream.next() => ReplyEvent::Fragment(fragment),
            line = input.read_line() => ReplyEvent::Input(line),
        };

        match event {
            ReplyEvent::Fragment(Some(fragment)) => {
                write!(out, "{}", fragment.text)?;
                out.flush()?;
            }
            ReplyEvent::Fragment(None) => break,
            ReplyEvent::Input(InputEvent::Interrupted | InputEvent::Eof) => {
                drop(stream);
                writeln!(out, "\n  {}\n", style("Response interrupted.").dim())?;
                return Ok(());
            }
            ReplyEvent::Input(InputEvent::Message(_)) => {
                write!(
                    out,
                    "\n  {}\n",
                    style(TurnError::Busy.user_message()).dim()
                )?;
            }
        }
    }

    let summary = stream.finish().await;
    print_footer(out, &summary, session.model().as_str())?;
    Ok(())
}

/// End the reply line. Failed turns show the message recorded in the log.
fn print_footer(out: &mut SharedWriter, summary: &TurnSummary, model: &str) -> std::io::Result<()> {
    if summary.error.is_some() {
        writeln!(out, "{}", style(&summary.content).red())?;
    } else {
        writeln!(out)?;
    }

    let mut stats = format!("{model} · {:.1}s", summary.elapsed.as_secs_f64());
    if let Some(usage) = summary.usage {
        stats.push_str(&format!(" · {} tokens", usage.output_tokens));
    }
    writeln!(out, "  {}\n", style(stats).dim())
}

fn print_error(out: &mut SharedWriter, err: &TurnError) -> std::io::Result<()> {
    writeln!(
        out,
        "\n  {} {}\n",
        style("!").yellow().bold(),
        err.user_message()
    )
}

/// First line of `content`, cut to a preview length on a char boundary.
fn preview(content: &str) -> String {
    let line = content.lines().next().unwrap_or_default();
    if line.chars().count() > HISTORY_PREVIEW_CHARS || line.len() < content.trim_end().len() {
        let cut: String = line.chars().take(HISTORY_PREVIEW_CHARS - 3).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_short_line_unchanged() {
        assert_eq!(preview("Hello"), "Hello");
        assert_eq!(preview(""), "");
    }

    #[test]
    fn test_preview_long_line_cut_on_char_boundary() {
        let long = "é".repeat(150);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), HISTORY_PREVIEW_CHARS);
    }

    #[test]
    fn test_preview_multiline_marks_truncation() {
        assert_eq!(preview("first\nsecond"), "first...");
        assert_eq!(preview("only\n"), "only");
    }
}
