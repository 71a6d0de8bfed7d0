//! Agent orchestration
//!
//! `Agent` ties the pieces together: it reacts to incoming DMs (commands
//! and guidance), runs the generate -> sanitize -> dedup -> publish
//! pipeline, and keeps the runtime-adjustable posting interval. Every
//! outward action passes through the [`SafetyGate`] first.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;

use crate::commands::{help_text, parse_command, Command};
use crate::constants::MAX_POSTING_INTERVAL_MINUTES;
use crate::error::{AgentError, AgentResult};
use crate::generator::Generator;
use crate::publisher::{IncomingMessage, Publisher};
use crate::safety::{ActionKind, SafetyGate, SafetySettings};
use crate::sanitize::{sanitize, InputKind};

#[derive(Debug, Default)]
struct AgentStats {
    started_at: Option<DateTime<Utc>>,
    last_post: Option<DateTime<Utc>>,
    posts_published: u64,
}

pub struct Agent {
    name: String,
    generator: Arc<dyn Generator>,
    publisher: Arc<dyn Publisher>,
    gate: SafetyGate,
    authorized_pubkeys: Vec<String>,
    guidance_enabled: bool,
    commands_enabled: bool,
    posting_interval: Mutex<Duration>,
    stats: Mutex<AgentStats>,
}

impl Agent {
    pub fn new(
        name: &str,
        generator: Arc<dyn Generator>,
        publisher: Arc<dyn Publisher>,
        settings: &SafetySettings,
        authorized_pubkeys: Vec<String>,
        guidance_enabled: bool,
        commands_enabled: bool,
        posting_interval_minutes: u64,
    ) -> Self {
        Self {
            name: name.to_string(),
            generator,
            publisher,
            gate: SafetyGate::new(settings),
            authorized_pubkeys,
            guidance_enabled,
            commands_enabled,
            posting_interval: Mutex::new(Duration::from_secs(posting_interval_minutes * 60)),
            stats: Mutex::new(AgentStats {
                started_at: Some(Utc::now()),
                ..Default::default()
            }),
        }
    }

    /// Current posting interval, re-read by the loop every cycle so
    /// `!set-interval` takes effect without a restart.
    pub async fn posting_interval(&self) -> Duration {
        *self.posting_interval.lock().await
    }

    /// Handle one decrypted DM. Replies (command output, confirmations,
    /// error messages) are sent back to the sender as DMs; failures to
    /// deliver the reply are logged and swallowed.
    pub async fn handle_message(&self, message: &IncomingMessage) {
        let content = message.content.trim();
        tracing::debug!(sender = %abbrev(&message.sender), "Received DM");

        let reply = if content.starts_with('!') {
            if self.commands_enabled {
                self.handle_command(&message.sender, content).await
            } else {
                "Commands are disabled.".to_string()
            }
        } else if self.guidance_enabled {
            self.handle_guidance(&message.sender, content).await
        } else {
            "Guidance is disabled. Use !help for available commands.".to_string()
        };

        if let Err(e) = self.publisher.send_dm(&message.sender, &reply).await {
            tracing::warn!("Failed to send DM reply: {}", e);
        }
    }

    /// Free-text guidance: rate limited per sender, then used to steer an
    /// immediate post.
    async fn handle_guidance(&self, sender: &str, content: &str) -> String {
        let guidance = match sanitize(content, InputKind::Guidance) {
            Ok(g) => g,
            Err(e) => return format!("Could not use that guidance: {}", e),
        };

        if let Err(AgentError::RateLimited { retry_after }) =
            self.gate.check_action(sender, ActionKind::Guidance).await
        {
            return format!(
                "Guidance rate limit exceeded. Try again in {}s.",
                retry_after.as_secs()
            );
        }

        tracing::info!(sender = %abbrev(sender), "Posting with guidance");
        match self.generate_and_post(Some(&guidance)).await {
            Ok(event_id) => format!("Posted with your guidance! Event: {}", event_id),
            Err(AgentError::DuplicateContent) => {
                "Generated content matched a recent post, skipped.".to_string()
            }
            Err(e) => format!("Could not post: {}", e),
        }
    }

    /// Parse and execute a `!` command, returning the user-visible reply.
    async fn handle_command(&self, sender: &str, input: &str) -> String {
        let command = match parse_command(input) {
            Ok(c) => c,
            Err(reply) => return reply,
        };

        // Help and status are read-only and exempt from both checks
        if command.requires_authorization() {
            if !self.is_authorized(sender) {
                tracing::warn!(sender = %abbrev(sender), "Unauthorized command attempt");
                return "You are not authorized to use this command.".to_string();
            }
            if let Err(AgentError::RateLimited { retry_after }) =
                self.gate.check_action(sender, ActionKind::Command).await
            {
                return format!(
                    "Command rate limit exceeded. Try again in {}s.",
                    retry_after.as_secs()
                );
            }
        }

        match command {
            Command::Help => help_text(),
            Command::Status => self.status_text().await,
            Command::SetPrompt(prompt) => match sanitize(&prompt, InputKind::CommandArgs) {
                Ok(prompt) => {
                    self.generator.set_system_prompt(&prompt);
                    tracing::info!(sender = %abbrev(sender), "System prompt updated via DM");
                    "System prompt updated.".to_string()
                }
                Err(e) => format!("Rejected prompt: {}", e),
            },
            Command::PostNow => match self.generate_and_post(None).await {
                Ok(event_id) => format!("Posted! Event: {}", event_id),
                Err(AgentError::DuplicateContent) => {
                    "Generated content matched a recent post, skipped.".to_string()
                }
                Err(e) => format!("Could not post: {}", e),
            },
            Command::SetInterval(minutes) => match self.set_posting_interval(minutes).await {
                Ok(()) => format!("Posting interval set to {} minutes.", minutes),
                Err(e) => format!("{}", e),
            },
        }
    }

    /// An empty allowlist means anyone may command the agent.
    fn is_authorized(&self, sender: &str) -> bool {
        self.authorized_pubkeys.is_empty()
            || self.authorized_pubkeys.iter().any(|pk| pk == sender)
    }

    pub async fn set_posting_interval(&self, minutes: u64) -> AgentResult<()> {
        if minutes < 1 || minutes > MAX_POSTING_INTERVAL_MINUTES {
            return Err(AgentError::InvalidInput(format!(
                "interval must be between 1 and {} minutes",
                MAX_POSTING_INTERVAL_MINUTES
            )));
        }
        *self.posting_interval.lock().await = Duration::from_secs(minutes * 60);
        tracing::info!("Posting interval changed to {} minutes", minutes);
        Ok(())
    }

    /// The full pipeline: generate (behind the breaker), sanitize, check
    /// freshness, publish, and only then record the content as seen.
    pub async fn generate_and_post(&self, guidance: Option<&str>) -> AgentResult<String> {
        let generator = Arc::clone(&self.generator);
        let content = self
            .gate
            .generate(|| async move { generator.generate(guidance).await })
            .await?;

        let content = sanitize(&content, InputKind::Post)?;
        self.gate.check_fresh(&content).await?;

        let event_id = self
            .publisher
            .publish_note(&content)
            .await
            .map_err(|e| AgentError::Publish(e.to_string()))?;

        self.gate.record_published(&content).await;
        let mut stats = self.stats.lock().await;
        stats.last_post = Some(Utc::now());
        stats.posts_published += 1;

        Ok(event_id)
    }

    async fn status_text(&self) -> String {
        let stats = self.stats.lock().await;
        let uptime = stats
            .started_at
            .map(|t| format_duration(Utc::now() - t))
            .unwrap_or_else(|| "unknown".to_string());
        let last_post = stats
            .last_post
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        let interval = *self.posting_interval.lock().await;

        format!(
            "{} status:\n\
             Model: {}\n\
             Circuit breaker: {:?}\n\
             Posting interval: {} minutes\n\
             Posts published: {}\n\
             Last post: {}\n\
             Uptime: {}",
            self.name,
            self.generator.model(),
            self.gate.breaker_state().await,
            interval.as_secs() / 60,
            stats.posts_published,
            last_post,
            uptime,
        )
    }
}

fn abbrev(pubkey: &str) -> String {
    let mut prefix: String = pubkey.chars().take(12).collect();
    if prefix.len() < pubkey.len() {
        prefix.push_str("...");
    }
    prefix
}

fn format_duration(delta: chrono::Duration) -> String {
    let secs = delta.num_seconds().max(0);
    let (h, m) = (secs / 3600, (secs % 3600) / 60);
    if h > 0 {
        format!("{}h {}m", h, m)
    } else {
        format!("{}m", m)
    }
}
