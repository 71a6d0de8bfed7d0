//! Circuit breaker for the LLM call
//!
//! Classic CLOSED / OPEN / HALF_OPEN state machine around a single fallible
//! operation. While OPEN, calls are rejected without invoking the operation;
//! once the reset timeout elapses the next call becomes a probe. The breaker
//! imposes no timeout of its own - the wrapped client enforces one, and that
//! timeout surfaces here as an ordinary failure.

use std::future::Future;
use tokio::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, calls pass through
    Closed,
    /// Failure threshold reached, calls are rejected fast
    Open,
    /// Single probe call in flight to test recovery
    HalfOpen,
}

/// Distinguishes "breaker tripped" from "operation itself failed" so callers
/// can report a service outage separately from a bad response.
#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    #[error("circuit open, retry in {}s", .retry_after.as_secs())]
    Open { retry_after: Duration },
    #[error("{0}")]
    Operation(E),
}

pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_timeout: Duration,
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        tracing::info!(
            "Circuit breaker initialized: threshold={}, timeout={}s",
            failure_threshold,
            reset_timeout.as_secs()
        );
        Self {
            failure_threshold,
            reset_timeout,
            state: CircuitState::Closed,
            failure_count: 0,
            opened_at: None,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Execute a synchronous operation under breaker protection.
    pub fn call<T, E>(&mut self, op: impl FnOnce() -> Result<T, E>) -> Result<T, BreakerError<E>> {
        self.try_acquire()?;
        match op() {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure();
                Err(BreakerError::Operation(e))
            }
        }
    }

    /// Execute an async operation under breaker protection.
    pub async fn call_async<T, E, F, Fut>(&mut self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.try_acquire()?;
        match op().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure();
                Err(BreakerError::Operation(e))
            }
        }
    }

    /// Manually reset to CLOSED.
    pub fn reset(&mut self) {
        tracing::info!("Circuit breaker manually reset");
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.opened_at = None;
    }

    /// Gate check before attempting the operation. Moves OPEN to HALF_OPEN
    /// once the reset timeout has elapsed.
    fn try_acquire<E>(&mut self) -> Result<(), BreakerError<E>> {
        if self.state != CircuitState::Open {
            return Ok(());
        }
        let elapsed = match self.opened_at {
            Some(opened_at) => Instant::now().duration_since(opened_at),
            None => self.reset_timeout,
        };
        if elapsed >= self.reset_timeout {
            tracing::info!("Circuit breaker moving to HALF_OPEN");
            self.state = CircuitState::HalfOpen;
            Ok(())
        } else {
            Err(BreakerError::Open {
                retry_after: self.reset_timeout - elapsed,
            })
        }
    }

    fn on_success(&mut self) {
        if self.state == CircuitState::HalfOpen {
            tracing::info!("Circuit breaker: service recovered, moving to CLOSED");
        }
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.opened_at = None;
    }

    fn on_failure(&mut self) {
        self.failure_count += 1;
        tracing::warn!(
            "Circuit breaker: failure {}/{}",
            self.failure_count,
            self.failure_threshold
        );
        if self.state == CircuitState::HalfOpen {
            tracing::warn!(
                "Circuit breaker: probe failed, reopening for {}s",
                self.reset_timeout.as_secs()
            );
            self.state = CircuitState::Open;
            self.opened_at = Some(Instant::now());
        } else if self.failure_count >= self.failure_threshold {
            tracing::error!(
                "Circuit breaker: threshold exceeded, opening circuit for {}s",
                self.reset_timeout.as_secs()
            );
            self.state = CircuitState::Open;
            self.opened_at = Some(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fail() -> Result<(), &'static str> {
        Err("boom")
    }

    fn succeed() -> Result<u32, &'static str> {
        Ok(42)
    }

    #[tokio::test(start_paused = true)]
    async fn opens_after_threshold_failures() {
        let mut breaker = CircuitBreaker::new(3, Duration::from_secs(60));

        for _ in 0..2 {
            assert!(matches!(breaker.call(fail), Err(BreakerError::Operation(_))));
            assert_eq!(breaker.state(), CircuitState::Closed);
        }
        assert!(matches!(breaker.call(fail), Err(BreakerError::Operation(_))));
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn open_rejects_without_invoking() {
        let mut breaker = CircuitBreaker::new(1, Duration::from_secs(60));
        let _ = breaker.call(fail);
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(1)).await;

        let mut invoked = false;
        let result = breaker.call(|| {
            invoked = true;
            succeed()
        });
        assert!(matches!(result, Err(BreakerError::Open { .. })));
        assert!(!invoked);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_success_closes_circuit() {
        let mut breaker = CircuitBreaker::new(3, Duration::from_secs(60));

        for _ in 0..3 {
            let _ = breaker.call(fail);
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        // t+1s: still rejected
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(matches!(breaker.call(succeed), Err(BreakerError::Open { .. })));

        // t+61s: probe is attempted and succeeds
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(breaker.call(succeed).unwrap(), 42);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_failure_reopens_and_restarts_timeout() {
        let mut breaker = CircuitBreaker::new(1, Duration::from_secs(60));
        let _ = breaker.call(fail);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(matches!(breaker.call(fail), Err(BreakerError::Operation(_))));
        assert_eq!(breaker.state(), CircuitState::Open);

        // Timeout restarted at the probe failure, not the original trip
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(matches!(breaker.call(succeed), Err(BreakerError::Open { .. })));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(breaker.call(succeed).unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_consecutive_failure_count() {
        let mut breaker = CircuitBreaker::new(3, Duration::from_secs(60));

        let _ = breaker.call(fail);
        let _ = breaker.call(fail);
        assert_eq!(breaker.failure_count(), 2);

        let _ = breaker.call(succeed);
        assert_eq!(breaker.failure_count(), 0);

        // Two more failures must not trip the breaker after the reset
        let _ = breaker.call(fail);
        let _ = breaker.call(fail);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn async_operations_are_supported() {
        let mut breaker = CircuitBreaker::new(1, Duration::from_secs(60));

        let ok = breaker
            .call_async(|| async { Ok::<_, &'static str>("generated") })
            .await;
        assert_eq!(ok.unwrap(), "generated");

        let err = breaker
            .call_async(|| async { Err::<(), _>("api down") })
            .await;
        assert!(matches!(err, Err(BreakerError::Operation("api down"))));
        assert_eq!(breaker.state(), CircuitState::Open);

        let rejected = breaker
            .call_async(|| async { Ok::<_, &'static str>("unreachable") })
            .await;
        assert!(matches!(rejected, Err(BreakerError::Open { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn manual_reset_closes_circuit() {
        let mut breaker = CircuitBreaker::new(1, Duration::from_secs(60));
        let _ = breaker.call(fail);
        assert_eq!(breaker.state(), CircuitState::Open);

        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.call(succeed).unwrap(), 42);
    }
}
