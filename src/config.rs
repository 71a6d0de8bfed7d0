//! TOML configuration with environment variable overrides
//!
//! Operational knobs live in a TOML file; secrets (keys) and deployment
//! details (relays, model) come from the environment so the config file can
//! be committed. Every field has a documented default, so a missing file is
//! fine for a first run.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{
    CIRCUIT_BREAKER_FAILURE_THRESHOLD, CIRCUIT_BREAKER_RESET_TIMEOUT_SECS,
    CONTENT_SIMILARITY_THRESHOLD, DEFAULT_COMMAND_RATE_LIMIT, DEFAULT_GUIDANCE_RATE_LIMIT,
    DEFAULT_POSTING_INTERVAL_MINUTES, MAX_CONTENT_HISTORY, MAX_POSTING_INTERVAL_MINUTES,
    RATE_LIMIT_WINDOW_MINUTES,
};
use crate::error::{AgentError, AgentResult};
use crate::safety::SafetySettings;
use tokio::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub posting: PostingConfig,
    #[serde(default)]
    pub guidance: GuidanceConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_name")]
    pub name: String,
    /// System prompt for generation
    #[serde(default = "default_personality")]
    pub personality: String,
}

fn default_agent_name() -> String {
    "Herald".to_string()
}
fn default_personality() -> String {
    "You are a witty Nostr poster.".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            personality: default_personality(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
}

fn default_interval_minutes() -> u64 {
    DEFAULT_POSTING_INTERVAL_MINUTES
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuidanceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub commands_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            commands_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    #[serde(default = "default_command_rate_limit")]
    pub command_rate_limit: u32,
    #[serde(default = "default_guidance_rate_limit")]
    pub guidance_rate_limit: u32,
    #[serde(default = "default_rate_limit_window_minutes")]
    pub rate_limit_window_minutes: u64,
    #[serde(default = "default_dedup_history")]
    pub dedup_history: usize,
    /// Accepted but inert: only exact normalized matches are detected
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_breaker_failure_threshold")]
    pub breaker_failure_threshold: u32,
    #[serde(default = "default_breaker_reset_timeout_secs")]
    pub breaker_reset_timeout_secs: u64,
}

fn default_command_rate_limit() -> u32 {
    DEFAULT_COMMAND_RATE_LIMIT
}
fn default_guidance_rate_limit() -> u32 {
    DEFAULT_GUIDANCE_RATE_LIMIT
}
fn default_rate_limit_window_minutes() -> u64 {
    RATE_LIMIT_WINDOW_MINUTES
}
fn default_dedup_history() -> usize {
    MAX_CONTENT_HISTORY
}
fn default_similarity_threshold() -> f32 {
    CONTENT_SIMILARITY_THRESHOLD
}
fn default_breaker_failure_threshold() -> u32 {
    CIRCUIT_BREAKER_FAILURE_THRESHOLD
}
fn default_breaker_reset_timeout_secs() -> u64 {
    CIRCUIT_BREAKER_RESET_TIMEOUT_SECS
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            command_rate_limit: default_command_rate_limit(),
            guidance_rate_limit: default_guidance_rate_limit(),
            rate_limit_window_minutes: default_rate_limit_window_minutes(),
            dedup_history: default_dedup_history(),
            similarity_threshold: default_similarity_threshold(),
            breaker_failure_threshold: default_breaker_failure_threshold(),
            breaker_reset_timeout_secs: default_breaker_reset_timeout_secs(),
        }
    }
}

impl Config {
    /// Load from a TOML file, falling back to defaults when it is missing.
    pub fn load(path: &Path) -> AgentResult<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| AgentError::Config(format!("failed to read {}: {}", path.display(), e)))?;
            toml::from_str(&content)
                .map_err(|e| AgentError::Config(format!("failed to parse {}: {}", path.display(), e)))?
        } else {
            tracing::warn!("Config file not found: {}, using defaults", path.display());
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> AgentResult<()> {
        let minutes = self.posting.interval_minutes;
        if minutes < 1 || minutes > MAX_POSTING_INTERVAL_MINUTES {
            return Err(AgentError::Config(format!(
                "posting interval must be between 1 and {} minutes, got {}",
                MAX_POSTING_INTERVAL_MINUTES, minutes
            )));
        }
        Ok(())
    }

    pub fn safety_settings(&self) -> SafetySettings {
        SafetySettings {
            command_rate_limit: self.safety.command_rate_limit,
            guidance_rate_limit: self.safety.guidance_rate_limit,
            rate_limit_window: Duration::from_secs(self.safety.rate_limit_window_minutes * 60),
            dedup_history: self.safety.dedup_history,
            similarity_threshold: self.safety.similarity_threshold,
            breaker_failure_threshold: self.safety.breaker_failure_threshold,
            breaker_reset_timeout: Duration::from_secs(self.safety.breaker_reset_timeout_secs),
        }
    }

    /// Nostr secret key (nsec or hex), required.
    pub fn secret_key() -> AgentResult<String> {
        std::env::var("NOSTR_NSEC")
            .map_err(|_| AgentError::Config("NOSTR_NSEC environment variable is required".to_string()))
    }

    /// OpenRouter API key, required.
    pub fn api_key() -> AgentResult<String> {
        std::env::var("OPENROUTER_API_KEY").map_err(|_| {
            AgentError::Config("OPENROUTER_API_KEY environment variable is required".to_string())
        })
    }

    pub fn relays() -> Vec<String> {
        match std::env::var("NOSTR_RELAYS") {
            Ok(relays) if !relays.trim().is_empty() => relays
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(String::from)
                .collect(),
            _ => vec![
                "wss://relay.damus.io".to_string(),
                "wss://nostr-pub.wellorder.net".to_string(),
            ],
        }
    }

    pub fn model_name() -> String {
        std::env::var("LLM_MODEL_NAME").unwrap_or_else(|_| "openai/gpt-4o-mini".to_string())
    }

    pub fn base_url() -> String {
        std::env::var("LLM_BASE_URL").unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string())
    }

    /// Public keys allowed to use privileged commands. Empty means anyone,
    /// which is logged loudly.
    pub fn authorized_pubkeys() -> Vec<String> {
        let users: Vec<String> = std::env::var("AUTHORIZED_PUBKEYS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(String::from)
            .collect();
        if users.is_empty() {
            tracing::warn!("No AUTHORIZED_PUBKEYS set - all users can use commands (security risk)");
        }
        users
    }
}
