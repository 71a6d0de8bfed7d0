//! Safety layer: rate limiting, content deduplication, circuit breaking
//!
//! `SafetyGate` is the per-action entry point the rest of the agent goes
//! through: incoming commands and guidance are rate limited per sender,
//! generated posts are checked against recent history before publishing,
//! and the LLM call itself runs behind a circuit breaker. Each component is
//! an owned instance behind a lock - no ambient state, so tests construct
//! isolated gates freely.

pub mod breaker;
pub mod dedup;
pub mod rate_limiter;

pub use breaker::{BreakerError, CircuitBreaker, CircuitState};
pub use dedup::ContentDeduplicator;
pub use rate_limiter::RateLimiter;

use crate::constants::{
    CIRCUIT_BREAKER_FAILURE_THRESHOLD, CIRCUIT_BREAKER_RESET_TIMEOUT_SECS,
    CONTENT_SIMILARITY_THRESHOLD, DEFAULT_COMMAND_RATE_LIMIT, DEFAULT_GUIDANCE_RATE_LIMIT,
    MAX_CONTENT_HISTORY, RATE_LIMIT_WINDOW_MINUTES,
};
use crate::error::{AgentError, AgentResult};
use std::fmt::Display;
use std::future::Future;
use tokio::sync::Mutex;
use tokio::time::Duration;

/// Category of rate-limited action, each with its own window/ceiling pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Command,
    Guidance,
}

/// Tunables for the safety layer, usually taken from [`crate::config::Config`].
#[derive(Debug, Clone)]
pub struct SafetySettings {
    pub command_rate_limit: u32,
    pub guidance_rate_limit: u32,
    pub rate_limit_window: Duration,
    pub dedup_history: usize,
    pub similarity_threshold: f32,
    pub breaker_failure_threshold: u32,
    pub breaker_reset_timeout: Duration,
}

impl Default for SafetySettings {
    fn default() -> Self {
        Self {
            command_rate_limit: DEFAULT_COMMAND_RATE_LIMIT,
            guidance_rate_limit: DEFAULT_GUIDANCE_RATE_LIMIT,
            rate_limit_window: Duration::from_secs(RATE_LIMIT_WINDOW_MINUTES * 60),
            dedup_history: MAX_CONTENT_HISTORY,
            similarity_threshold: CONTENT_SIMILARITY_THRESHOLD,
            breaker_failure_threshold: CIRCUIT_BREAKER_FAILURE_THRESHOLD,
            breaker_reset_timeout: Duration::from_secs(CIRCUIT_BREAKER_RESET_TIMEOUT_SECS),
        }
    }
}

pub struct SafetyGate {
    command_limiter: Mutex<RateLimiter>,
    guidance_limiter: Mutex<RateLimiter>,
    dedup: Mutex<ContentDeduplicator>,
    breaker: Mutex<CircuitBreaker>,
}

impl SafetyGate {
    pub fn new(settings: &SafetySettings) -> Self {
        Self {
            command_limiter: Mutex::new(RateLimiter::new(
                settings.command_rate_limit,
                settings.rate_limit_window,
            )),
            guidance_limiter: Mutex::new(RateLimiter::new(
                settings.guidance_rate_limit,
                settings.rate_limit_window,
            )),
            dedup: Mutex::new(ContentDeduplicator::new(
                settings.dedup_history,
                settings.similarity_threshold,
            )),
            breaker: Mutex::new(CircuitBreaker::new(
                settings.breaker_failure_threshold,
                settings.breaker_reset_timeout,
            )),
        }
    }

    /// Rate-limit check for a side-effecting action by `identity`. The
    /// action is recorded only when allowed.
    pub async fn check_action(&self, identity: &str, kind: ActionKind) -> AgentResult<()> {
        let limiter = match kind {
            ActionKind::Command => &self.command_limiter,
            ActionKind::Guidance => &self.guidance_limiter,
        };
        limiter
            .lock()
            .await
            .check_and_record(identity)
            .map_err(|retry_after| AgentError::RateLimited { retry_after })
    }

    /// Reject content that exactly matches a recently published post.
    pub async fn check_fresh(&self, content: &str) -> AgentResult<()> {
        if self.dedup.lock().await.is_duplicate(content) {
            return Err(AgentError::DuplicateContent);
        }
        Ok(())
    }

    /// Remember successfully published content for future duplicate checks.
    pub async fn record_published(&self, content: &str) {
        self.dedup.lock().await.record(content);
    }

    /// Run a generation call under circuit-breaker protection. The breaker
    /// lock is held for the duration of the call, which also serializes
    /// half-open probes.
    pub async fn generate<T, E, F, Fut>(&self, op: F) -> AgentResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut breaker = self.breaker.lock().await;
        breaker.call_async(op).await.map_err(|e| match e {
            BreakerError::Open { retry_after } => AgentError::CircuitOpen { retry_after },
            BreakerError::Operation(e) => AgentError::Generation(e.to_string()),
        })
    }

    pub async fn breaker_state(&self) -> CircuitState {
        self.breaker.lock().await.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_gate() -> SafetyGate {
        SafetyGate::new(&SafetySettings {
            command_rate_limit: 2,
            guidance_rate_limit: 1,
            rate_limit_window: Duration::from_secs(3600),
            dedup_history: 10,
            similarity_threshold: 0.9,
            breaker_failure_threshold: 2,
            breaker_reset_timeout: Duration::from_secs(60),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn command_and_guidance_limits_are_independent() {
        let gate = small_gate();

        assert!(gate.check_action("npub1a", ActionKind::Command).await.is_ok());
        assert!(gate.check_action("npub1a", ActionKind::Command).await.is_ok());
        assert!(matches!(
            gate.check_action("npub1a", ActionKind::Command).await,
            Err(AgentError::RateLimited { .. })
        ));

        // Guidance bucket is untouched by command traffic
        assert!(gate.check_action("npub1a", ActionKind::Guidance).await.is_ok());
        assert!(matches!(
            gate.check_action("npub1a", ActionKind::Guidance).await,
            Err(AgentError::RateLimited { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn published_content_becomes_stale() {
        let gate = small_gate();

        assert!(gate.check_fresh("gm nostr").await.is_ok());
        gate.record_published("gm nostr").await;
        assert!(matches!(
            gate.check_fresh("GM   Nostr").await,
            Err(AgentError::DuplicateContent)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn generation_failures_trip_the_breaker() {
        let gate = small_gate();

        for _ in 0..2 {
            let result = gate
                .generate(|| async { Err::<String, _>("api down") })
                .await;
            assert!(matches!(result, Err(AgentError::Generation(_))));
        }

        // Circuit is now open: rejected with the distinct error kind
        let result = gate
            .generate(|| async { Ok::<_, &'static str>("text".to_string()) })
            .await;
        assert!(matches!(result, Err(AgentError::CircuitOpen { .. })));
        assert_eq!(gate.breaker_state().await, CircuitState::Open);

        // After the reset timeout the probe goes through and closes it
        tokio::time::advance(Duration::from_secs(61)).await;
        let result = gate
            .generate(|| async { Ok::<_, &'static str>("text".to_string()) })
            .await;
        assert_eq!(result.unwrap(), "text");
        assert_eq!(gate.breaker_state().await, CircuitState::Closed);
    }
}
