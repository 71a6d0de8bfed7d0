//! Nostr publishing
//!
//! The [`Publisher`] trait is the agent's only view of the network: publish
//! a signed note, send a DM. Relay management, signing and NIP-17 wrapping
//! are delegated to nostr-sdk; this module adds protocol-level validation
//! before anything leaves the process. A single attempt is made per
//! publish - relay reliability is the pool's concern.

use async_trait::async_trait;
use nostr_sdk::prelude::*;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::constants::MAX_NOTE_BYTES;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("invalid note: {0}")]
    InvalidNote(String),
    #[error("invalid key: {0}")]
    Key(String),
    #[error("relay error: {0}")]
    Relay(String),
}

/// A decrypted direct message received from a relay.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Sender public key, hex encoded
    pub sender: String,
    pub content: String,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish a public text note. Returns the event id (hex) on success.
    async fn publish_note(&self, content: &str) -> Result<String, PublishError>;

    /// Send an encrypted direct message to `recipient` (hex or bech32 key).
    async fn send_dm(&self, recipient: &str, message: &str) -> Result<(), PublishError>;
}

/// Validate note content against protocol limits before signing.
pub fn validate_note(content: &str) -> Result<(), PublishError> {
    if content.trim().is_empty() {
        return Err(PublishError::InvalidNote("content is empty".to_string()));
    }
    let bytes = content.len();
    if bytes > MAX_NOTE_BYTES {
        return Err(PublishError::InvalidNote(format!(
            "content too long: {} bytes (max {})",
            bytes, MAX_NOTE_BYTES
        )));
    }
    Ok(())
}

pub struct RelayPublisher {
    client: Client,
    keys: Keys,
}

impl RelayPublisher {
    /// Parse the secret key, register relays and open connections.
    pub async fn connect(relays: &[String], secret_key: &str) -> Result<Self, PublishError> {
        let keys = Keys::parse(secret_key).map_err(|e| PublishError::Key(e.to_string()))?;
        let client = Client::new(keys.clone());

        for relay in relays {
            client
                .add_relay(relay.as_str())
                .await
                .map_err(|e| PublishError::Relay(e.to_string()))?;
        }
        client.connect().await;

        tracing::info!("Nostr client connected with {} relays", relays.len());
        Ok(Self { client, keys })
    }

    pub fn public_key(&self) -> String {
        self.keys.public_key().to_hex()
    }

    /// Update the agent's profile metadata (kind 0).
    pub async fn set_metadata(&self, name: &str, about: &str) -> Result<(), PublishError> {
        let metadata = Metadata::new().name(name).about(about);
        self.client
            .set_metadata(&metadata)
            .await
            .map_err(|e| PublishError::Relay(e.to_string()))?;
        tracing::info!("Profile metadata updated");
        Ok(())
    }

    /// Listen for incoming gift-wrapped DMs and forward the decrypted
    /// rumors over `tx` until cancelled or the channel closes.
    pub async fn listen(
        &self,
        tx: mpsc::Sender<IncomingMessage>,
        cancel: CancellationToken,
    ) -> Result<(), PublishError> {
        let filter = Filter::new()
            .pubkey(self.keys.public_key())
            .kind(Kind::GiftWrap)
            .limit(0);
        self.client
            .subscribe(vec![filter], None)
            .await
            .map_err(|e| PublishError::Relay(e.to_string()))?;

        tracing::info!("Listening for direct messages...");
        let mut notifications = self.client.notifications();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("DM listener cancelled");
                    return Ok(());
                }
                notification = notifications.recv() => {
                    use tokio::sync::broadcast::error::RecvError;
                    let notification = match notification {
                        Ok(n) => n,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!("DM listener lagged, {} notifications dropped", skipped);
                            continue;
                        }
                        Err(RecvError::Closed) => return Ok(()),
                    };
                    let RelayPoolNotification::Event { event, .. } = notification else {
                        continue;
                    };
                    if event.kind != Kind::GiftWrap {
                        continue;
                    }
                    match self.client.unwrap_gift_wrap(&event).await {
                        Ok(UnwrappedGift { rumor, sender }) => {
                            if rumor.kind != Kind::PrivateDirectMessage {
                                continue;
                            }
                            let message = IncomingMessage {
                                sender: sender.to_hex(),
                                content: rumor.content,
                            };
                            if tx.send(message).await.is_err() {
                                return Ok(());
                            }
                        }
                        Err(e) => tracing::debug!("Failed to unwrap gift wrap: {}", e),
                    }
                }
            }
        }
    }

    pub async fn disconnect(&self) {
        self.client.disconnect().await;
    }
}

#[async_trait]
impl Publisher for RelayPublisher {
    async fn publish_note(&self, content: &str) -> Result<String, PublishError> {
        validate_note(content)?;
        let output = self
            .client
            .publish_text_note(content, [])
            .await
            .map_err(|e| PublishError::Relay(e.to_string()))?;
        let event_id: EventId = *output;
        tracing::info!("Published note: {}", event_id.to_hex());
        Ok(event_id.to_hex())
    }

    async fn send_dm(&self, recipient: &str, message: &str) -> Result<(), PublishError> {
        let receiver = PublicKey::parse(recipient).map_err(|e| PublishError::Key(e.to_string()))?;
        self.client
            .send_private_msg(receiver, message, None)
            .await
            .map_err(|e| PublishError::Relay(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_content() {
        assert!(validate_note("").is_err());
        assert!(validate_note("   \n").is_err());
    }

    #[test]
    fn validate_enforces_protocol_byte_limit() {
        let ok = "x".repeat(MAX_NOTE_BYTES);
        assert!(validate_note(&ok).is_ok());

        let too_long = "x".repeat(MAX_NOTE_BYTES + 1);
        assert!(matches!(
            validate_note(&too_long),
            Err(PublishError::InvalidNote(_))
        ));
    }

    #[test]
    fn validate_counts_bytes_not_chars() {
        // Multi-byte characters hit the byte ceiling earlier
        let emoji = "🦀".repeat(MAX_NOTE_BYTES / 4 + 1);
        assert!(validate_note(&emoji).is_err());
    }
}
