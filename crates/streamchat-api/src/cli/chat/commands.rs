//! Slash command parsing for the terminal chat.
//!
//! Commands start with `/` and control the session without sending
//! anything to the model.

use std::io::{self, Write};

use console::style;

/// Available slash commands in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    Help,
    /// Clear the terminal screen.
    Clear,
    Exit,
    /// Clear the conversation, keeping the model.
    Reset,
    History,
    /// List selectable models.
    Models,
    /// Show the current model, or switch to the named one.
    Model(Option<String>),
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (cmd, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, Some(arg.trim()).filter(|a| !a.is_empty())),
        None => (trimmed, None),
    };

    let command = match cmd.to_lowercase().as_str() {
        "/help" | "/h" | "/?" => ChatCommand::Help,
        "/clear" | "/cls" => ChatCommand::Clear,
        "/exit" | "/quit" | "/q" => ChatCommand::Exit,
        "/reset" | "/new" => ChatCommand::Reset,
        "/history" => ChatCommand::History,
        "/models" => ChatCommand::Models,
        "/model" | "/m" => ChatCommand::Model(arg.map(str::to_string)),
        other => ChatCommand::Unknown(other.to_string()),
    };
    Some(command)
}

/// Write the help text listing all available commands.
pub fn print_help(out: &mut impl Write) -> io::Result<()> {
    let rows = [
        ("/help", "Show this help message"),
        ("/model [name]", "Show or switch the model"),
        ("/models", "List available models"),
        ("/reset", "Clear the conversation"),
        ("/history", "Show conversation history"),
        ("/clear", "Clear the screen"),
        ("/exit", "End the chat session"),
    ];

    writeln!(out)?;
    writeln!(out, "  {}", style("Available commands:").bold())?;
    writeln!(out)?;
    for (cmd, help) in rows {
        writeln!(out, "  {}  {}", style(format!("{cmd:<14}")).cyan(), help)?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "  {}",
        style("Ctrl+C interrupts a reply, Ctrl+D exits").dim()
    )?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_help() {
        assert_eq!(parse("/help"), Some(ChatCommand::Help));
        assert_eq!(parse("/h"), Some(ChatCommand::Help));
        assert_eq!(parse("/?"), Some(ChatCommand::Help));
    }

    #[test]
    fn test_parse_exit() {
        assert_eq!(parse("/exit"), Some(ChatCommand::Exit));
        assert_eq!(parse("/quit"), Some(ChatCommand::Exit));
        assert_eq!(parse("  /Q  "), Some(ChatCommand::Exit));
    }

    #[test]
    fn test_parse_model() {
        assert_eq!(parse("/model"), Some(ChatCommand::Model(None)));
        assert_eq!(parse("/model   "), Some(ChatCommand::Model(None)));
        assert_eq!(
            parse("/model gemini-2.5-pro-preview-05-06"),
            Some(ChatCommand::Model(Some(
                "gemini-2.5-pro-preview-05-06".to_string()
            )))
        );
        assert_eq!(
            parse("/m  deepseek/deepseek-chat:free "),
            Some(ChatCommand::Model(Some(
                "deepseek/deepseek-chat:free".to_string()
            )))
        );
        assert_eq!(parse("/models"), Some(ChatCommand::Models));
    }

    #[test]
    fn test_parse_session_commands() {
        assert_eq!(parse("/reset"), Some(ChatCommand::Reset));
        assert_eq!(parse("/new"), Some(ChatCommand::Reset));
        assert_eq!(parse("/history"), Some(ChatCommand::History));
        assert_eq!(parse("/cls"), Some(ChatCommand::Clear));
    }

    #[test]
    fn test_parse_not_command() {
        assert_eq!(parse("hello world"), None);
        assert_eq!(parse("what does /help do?"), None);
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(
            parse("/remember this"),
            Some(ChatCommand::Unknown("/remember".to_string()))
        );
    }

    #[test]
    fn test_help_lists_every_command() {
        let mut buf = Vec::new();
        print_help(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        for cmd in ["/help", "/model", "/models", "/reset", "/history", "/exit"] {
            assert!(text.contains(cmd), "{cmd} missing from help");
        }
    }
}
