//! DM command grammar
//!
//! Commands arrive as direct messages prefixed with `!`. Parsing is
//! separated from execution: the agent applies authorization, rate limiting
//! and sanitization before dispatching a parsed [`Command`].

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show agent status
    Status,
    /// Replace the system prompt
    SetPrompt(String),
    /// Force an immediate post
    PostNow,
    /// Change the posting interval (minutes)
    SetInterval(u64),
    /// Show the help message
    Help,
}

impl Command {
    /// Help and status are available to anyone; everything else requires
    /// authorization and consumes a rate-limit slot.
    pub fn requires_authorization(&self) -> bool {
        !matches!(self, Command::Help | Command::Status)
    }
}

/// Parse a command string (with or without the `!` prefix). Errors are
/// user-visible messages, ready to send back as a DM.
pub fn parse_command(input: &str) -> Result<Command, String> {
    let stripped = input.trim().trim_start_matches('!');
    let mut parts = stripped.splitn(2, ' ');
    let cmd = parts.next().unwrap_or("").to_lowercase();
    let args = parts.next().map(str::trim).unwrap_or("");

    match cmd.as_str() {
        "status" => Ok(Command::Status),
        "help" => Ok(Command::Help),
        "post-now" => Ok(Command::PostNow),
        "set-prompt" => {
            if args.is_empty() {
                Err("Usage: !set-prompt <new prompt text>".to_string())
            } else {
                Ok(Command::SetPrompt(args.to_string()))
            }
        }
        "set-interval" => {
            if args.is_empty() {
                return Err("Usage: !set-interval <minutes>".to_string());
            }
            args.parse::<u64>()
                .map(Command::SetInterval)
                .map_err(|_| "Invalid interval. Please provide a number.".to_string())
        }
        other => Err(format!(
            "Unknown command: {}. Use !help for available commands.",
            other
        )),
    }
}

pub fn help_text() -> String {
    [
        "Available commands:",
        "",
        "!status - Show agent status",
        "!set-prompt <text> - Update system prompt",
        "!post-now - Force immediate post",
        "!set-interval <minutes> - Change posting interval",
        "!help - Show this help message",
        "",
        "You can also send regular messages as guidance for the next post!",
    ]
    .join("\n")
}
