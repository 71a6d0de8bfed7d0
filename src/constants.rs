//! Application-wide constants and documented defaults

/// Practical ceiling for note length in characters (well below the protocol limit)
pub const MAX_NOTE_LENGTH: usize = 2000;

/// Nostr protocol limit for event content: 32KB
pub const MAX_NOTE_BYTES: usize = 32 * 1024;

/// Maximum tokens requested per LLM generation
pub const MAX_LLM_TOKENS: u32 = 500;

/// LLM API request timeout in seconds
pub const LLM_TIMEOUT_SECS: u64 = 30;

/// Creative temperature for post generation
pub const LLM_TEMPERATURE: f64 = 0.9;

/// Default posting interval in minutes
pub const DEFAULT_POSTING_INTERVAL_MINUTES: u64 = 60;

/// Maximum posting interval in minutes (24 hours)
pub const MAX_POSTING_INTERVAL_MINUTES: u64 = 1440;

/// Commands allowed per user per rate-limit window
pub const DEFAULT_COMMAND_RATE_LIMIT: u32 = 10;

/// Guidance messages allowed per user per rate-limit window
pub const DEFAULT_GUIDANCE_RATE_LIMIT: u32 = 5;

/// Rate-limit window in minutes
pub const RATE_LIMIT_WINDOW_MINUTES: u64 = 60;

/// Number of posts remembered for deduplication
pub const MAX_CONTENT_HISTORY: usize = 100;

/// Similarity threshold for the deduplicator (accepted but currently inert,
/// only exact normalized matches are detected)
pub const CONTENT_SIMILARITY_THRESHOLD: f32 = 0.9;

/// Maximum length for command arguments in characters
pub const MAX_COMMAND_ARGS_LENGTH: usize = 1000;

/// Maximum length for guidance messages in characters
pub const MAX_GUIDANCE_LENGTH: usize = 5000;

/// Consecutive failures before the circuit opens
pub const CIRCUIT_BREAKER_FAILURE_THRESHOLD: u32 = 5;

/// Seconds the circuit stays open before a half-open probe
pub const CIRCUIT_BREAKER_RESET_TIMEOUT_SECS: u64 = 60;
