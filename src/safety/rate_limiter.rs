//! Sliding-window rate limiter
//!
//! Tracks timestamps of permitted actions per identity (sender public key,
//! or a constant bucket when limits are global). Old entries are purged
//! lazily on each check; denials record nothing.

use std::collections::{HashMap, VecDeque};
use tokio::time::{Duration, Instant};

pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    history: HashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        tracing::info!(
            "Rate limiter initialized: {} requests per {}s",
            max_requests,
            window.as_secs()
        );
        Self {
            max_requests,
            window,
            history: HashMap::new(),
        }
    }

    /// Check whether `identity` may act now, recording the action if allowed.
    ///
    /// Returns `Err(retry_after)` on denial. A zero window or zero ceiling
    /// always denies.
    pub fn check_and_record(&mut self, identity: &str) -> Result<(), Duration> {
        if self.max_requests == 0 || self.window.is_zero() {
            return Err(self.window);
        }

        let now = Instant::now();
        let entries = self.history.entry(identity.to_string()).or_default();

        // Purge timestamps that have fallen out of the window
        while let Some(&oldest) = entries.front() {
            if now.duration_since(oldest) >= self.window {
                entries.pop_front();
            } else {
                break;
            }
        }

        if entries.len() >= self.max_requests as usize {
            // Oldest surviving entry determines when a slot frees up
            let retry_after = entries
                .front()
                .map(|&oldest| self.window.saturating_sub(now.duration_since(oldest)))
                .unwrap_or(self.window);
            tracing::warn!(
                "Rate limit exceeded for {} ({}/{})",
                abbrev(identity),
                entries.len(),
                self.max_requests
            );
            return Err(retry_after);
        }

        entries.push_back(now);
        Ok(())
    }

    /// Reset history for one identity, or all identities.
    pub fn reset(&mut self, identity: Option<&str>) {
        match identity {
            Some(id) => {
                self.history.remove(id);
                tracing::info!("Rate limit reset for {}", abbrev(id));
            }
            None => {
                self.history.clear();
                tracing::info!("Rate limit reset for all identities");
            }
        }
    }
}

/// Shorten a pubkey for log lines. Identities are arbitrary strings, so
/// truncation must respect char boundaries.
fn abbrev(identity: &str) -> String {
    identity.chars().take(10).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn allows_up_to_limit_then_denies() {
        let mut limiter = RateLimiter::new(5, Duration::from_secs(3600));

        for _ in 0..5 {
            assert!(limiter.check_and_record("npub1alice").is_ok());
        }
        // Sixth call within the same second is denied
        assert!(limiter.check_and_record("npub1alice").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn denial_does_not_consume_a_slot() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(60));

        assert!(limiter.check_and_record("a").is_ok());
        assert!(limiter.check_and_record("a").is_err());

        // The denied call must not have pushed the recovery point forward
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.check_and_record("a").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn window_rolls_over() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(100));

        assert!(limiter.check_and_record("a").is_ok());
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(limiter.check_and_record("a").is_ok());
        assert!(limiter.check_and_record("a").is_err());

        // First entry expires at t=100; one slot frees up
        tokio::time::advance(Duration::from_secs(41)).await;
        assert!(limiter.check_and_record("a").is_ok());
        assert!(limiter.check_and_record("a").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_hint_tracks_oldest_entry() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(100));

        assert!(limiter.check_and_record("a").is_ok());
        tokio::time::advance(Duration::from_secs(30)).await;

        let retry_after = limiter.check_and_record("a").unwrap_err();
        assert_eq!(retry_after, Duration::from_secs(70));
    }

    #[tokio::test(start_paused = true)]
    async fn identities_are_independent() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(3600));

        assert!(limiter.check_and_record("npub1alice").is_ok());
        assert!(limiter.check_and_record("npub1bob").is_ok());
        assert!(limiter.check_and_record("npub1alice").is_err());
        assert!(limiter.check_and_record("npub1bob").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_limit_always_denies() {
        let mut limiter = RateLimiter::new(0, Duration::from_secs(3600));
        assert!(limiter.check_and_record("a").is_err());

        let mut limiter = RateLimiter::new(10, Duration::ZERO);
        assert!(limiter.check_and_record("a").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn multibyte_identities_are_denied_without_panicking() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(3600));

        assert!(limiter.check_and_record("€€€€").is_ok());
        assert!(limiter.check_and_record("€€€€").is_err());
        limiter.reset(Some("€€€€"));
        assert!(limiter.check_and_record("€€€€").is_ok());
    }

    #[test]
    fn abbrev_respects_char_boundaries() {
        assert_eq!(abbrev("€€€€"), "€€€€");
        assert_eq!(abbrev(&"€".repeat(20)), "€".repeat(10));
        assert_eq!(abbrev("npub1alicebobcarol"), "npub1alice");
    }

    #[tokio::test(start_paused = true)]
    async fn reset_clears_history() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(3600));

        assert!(limiter.check_and_record("a").is_ok());
        assert!(limiter.check_and_record("a").is_err());

        limiter.reset(Some("a"));
        assert!(limiter.check_and_record("a").is_ok());

        limiter.reset(None);
        assert!(limiter.check_and_record("a").is_ok());
    }
}
