//! Input sanitization
//!
//! All user-supplied text (command arguments, guidance DMs) and generated
//! posts pass through here before use. Control characters are stripped,
//! structural failures (empty, oversized) are rejected rather than
//! silently truncated.

use crate::constants::{MAX_COMMAND_ARGS_LENGTH, MAX_GUIDANCE_LENGTH, MAX_NOTE_LENGTH};
use crate::error::AgentError;

/// Category of text being validated, each with its own length ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Arguments following a DM command
    CommandArgs,
    /// Free-text guidance for the next post
    Guidance,
    /// Generated post content
    Post,
}

impl InputKind {
    fn max_length(self) -> usize {
        match self {
            InputKind::CommandArgs => MAX_COMMAND_ARGS_LENGTH,
            InputKind::Guidance => MAX_GUIDANCE_LENGTH,
            InputKind::Post => MAX_NOTE_LENGTH,
        }
    }

    fn label(self) -> &'static str {
        match self {
            InputKind::CommandArgs => "command arguments",
            InputKind::Guidance => "guidance",
            InputKind::Post => "post",
        }
    }
}

/// Strip control characters (newlines and tabs survive), trim, and enforce
/// the per-kind length ceiling. Empty and oversized inputs are rejected.
pub fn sanitize(text: &str, kind: InputKind) -> Result<String, AgentError> {
    let cleaned: String = text
        .chars()
        .filter(|&c| c == '\n' || c == '\t' || !c.is_control())
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return Err(AgentError::InvalidInput(format!("{} is empty", kind.label())));
    }

    let len = cleaned.chars().count();
    let max = kind.max_length();
    if len > max {
        return Err(AgentError::InvalidInput(format!(
            "{} too long: {} chars (max {})",
            kind.label(),
            len,
            max
        )));
    }

    Ok(cleaned.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_control_characters() {
        let out = sanitize("hel\u{0000}lo\u{0007} wor\u{009f}ld", InputKind::Guidance).unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn keeps_newlines_and_tabs() {
        let out = sanitize("line one\n\tline two", InputKind::Post).unwrap();
        assert_eq!(out, "line one\n\tline two");
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(
            sanitize("", InputKind::Guidance),
            Err(AgentError::InvalidInput(_))
        ));
        assert!(matches!(
            sanitize("   \n  ", InputKind::Guidance),
            Err(AgentError::InvalidInput(_))
        ));
        // Input that is only control characters is empty after cleaning
        assert!(matches!(
            sanitize("\u{0001}\u{0002}", InputKind::CommandArgs),
            Err(AgentError::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_oversized_input_instead_of_truncating() {
        let long = "x".repeat(MAX_COMMAND_ARGS_LENGTH + 1);
        assert!(matches!(
            sanitize(&long, InputKind::CommandArgs),
            Err(AgentError::InvalidInput(_))
        ));

        let at_limit = "x".repeat(MAX_COMMAND_ARGS_LENGTH);
        assert_eq!(sanitize(&at_limit, InputKind::CommandArgs).unwrap(), at_limit);
    }

    #[test]
    fn limits_differ_by_kind() {
        let text = "x".repeat(MAX_NOTE_LENGTH + 1);
        assert!(sanitize(&text, InputKind::Post).is_err());
        assert!(sanitize(&text, InputKind::Guidance).is_ok());
    }
}
