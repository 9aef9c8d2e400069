//! Welcome banner for terminal chat sessions.

use console::style;

/// Print the banner shown before the first prompt.
pub fn print_welcome_banner(provider: &str, model: &str, session_id: &str) {
    println!();
    println!("  {} {}", style("⚡").bold(), style("streamchat").cyan().bold());
    println!();
    println!("  {}  {}", style("Provider:").bold(), style(provider).dim());
    println!("  {}     {}", style("Model:").bold(), style(model).dim());
    println!(
        "  {}   {}",
        style("Session:").bold(),
        style(&session_id[..8.min(session_id.len())]).dim()
    );
    println!();
    println!(
        "  {}",
        style("Type /help for commands, Ctrl+D to exit").dim()
    );
    println!("  {}", style("---").dim());
    println!();
}
