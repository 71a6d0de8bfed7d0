//! herald - an autonomous Nostr posting agent
//!
//! Generates short posts with an LLM on a fixed schedule, publishes them as
//! Nostr text notes, and takes steering (guidance and commands) over
//! encrypted DMs. A safety layer wraps every side-effecting path: sliding
//! window rate limits per sender, exact-match deduplication of recent
//! posts, and a circuit breaker around the generation API.

pub mod agent;
pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod generator;
pub mod posting;
pub mod publisher;
pub mod safety;
pub mod sanitize;

pub use agent::Agent;
pub use config::Config;
pub use error::{AgentError, AgentResult};
pub use safety::{ActionKind, SafetyGate, SafetySettings};
