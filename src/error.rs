//! Agent error types
//!
//! Every variant here is recoverable at the call site: the posting loop
//! logs and waits for the next cycle, the DM handler notifies the sender.

use std::time::Duration;

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Sliding-window rate limit denial, with a retry-after hint
    #[error("rate limit exceeded, retry in {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// Content matched a recently published post
    #[error("duplicate content")]
    DuplicateContent,

    /// The circuit breaker rejected the call without attempting it
    #[error("AI service unavailable (circuit open), retry in {}s", .retry_after.as_secs())]
    CircuitOpen { retry_after: Duration },

    /// The wrapped generation call itself failed
    #[error("content generation failed: {0}")]
    Generation(String),

    /// Publishing to relays failed
    #[error("publish failed: {0}")]
    Publish(String),

    /// Sanitization or structural validation rejected the input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration loading or validation failed
    #[error("config error: {0}")]
    Config(String),
}
