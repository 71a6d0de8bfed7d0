//! Autonomous posting loop
//!
//! A fixed-interval cycle that asks the agent for a fresh post. Every
//! failure mode is log-and-continue: a bad cycle never kills the loop, the
//! next tick simply tries again. The interval is re-read each cycle so DM
//! commands can retune a running agent.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::agent::Agent;
use crate::error::AgentError;

pub async fn run_posting_loop(agent: Arc<Agent>, cancel: CancellationToken) {
    tracing::info!("Posting loop started");

    loop {
        let interval = agent.posting_interval().await;
        tracing::debug!("Next post in {}s", interval.as_secs());

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Posting loop cancelled");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        match agent.generate_and_post(None).await {
            Ok(event_id) => tracing::info!("Scheduled post published: {}", event_id),
            Err(AgentError::DuplicateContent) => {
                tracing::info!("Generated content matched a recent post, skipping this cycle");
            }
            Err(AgentError::CircuitOpen { retry_after }) => {
                tracing::warn!(
                    "AI service circuit open, skipping cycle (retry in {}s)",
                    retry_after.as_secs()
                );
            }
            Err(e) => tracing::error!("Posting cycle failed: {}", e),
        }
    }
}
