//! Delivery channel: paced, rate-limit-aware sends to one recipient.

use std::sync::Arc;

use crate::config::DeliveryConfig;
use crate::render::Artifact;
use crate::transport::{ChatId, Transport, TransportError};

/// Sends notifications and artifacts to a single chat.
///
/// A rate-limited send is retried after the transport-reported backoff, up to
/// `max_rate_limit_retries` times. Any other transport error abandons the send
/// immediately. Every successful send is followed by `message_delay`.
pub struct DeliveryChannel<T: Transport> {
    transport: Arc<T>,
    recipient: ChatId,
    config: DeliveryConfig,
}

impl<T: Transport> Clone for DeliveryChannel<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            recipient: self.recipient,
            config: self.config.clone(),
        }
    }
}

/// Which kind of send a retry loop is driving, for logs.
#[derive(Debug, Clone, Copy)]
enum SendKind {
    Text,
    Document,
}

impl<T: Transport> DeliveryChannel<T> {
    pub fn new(transport: Arc<T>, recipient: ChatId, config: DeliveryConfig) -> Self {
        Self {
            transport,
            recipient,
            config,
        }
    }

    /// Same transport and pacing, different recipient. Used to reply within
    /// the conversation a message came from.
    pub fn for_chat(&self, recipient: ChatId) -> Self {
        Self {
            recipient,
            ..self.clone()
        }
    }

    pub fn recipient(&self) -> ChatId {
        self.recipient
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Best-effort text notification. Returns whether it was sent; callers
    /// never treat a dropped notification as fatal.
    pub async fn notify(&self, text: &str) -> bool {
        let result = self
            .with_retry(SendKind::Text, || self.transport.send_text(self.recipient, text))
            .await;
        match result {
            Ok(()) => {
                tracing::info!(chat = %self.recipient, "Notification sent");
                true
            }
            Err(e) => {
                tracing::error!(
                    chat = %self.recipient,
                    phase = "notify",
                    error = %e,
                    "Dropped notification"
                );
                false
            }
        }
    }

    /// Upload `artifact` with `caption`. A failure here is the terminal
    /// failure of the identifier the artifact belongs to.
    pub async fn deliver(&self, artifact: &Artifact, caption: &str) -> crate::error::Result<()> {
        let bytes = artifact.read().await?;
        let result = self
            .with_retry(SendKind::Document, || {
                self.transport.send_document(
                    self.recipient,
                    artifact.file_name(),
                    bytes.clone(),
                    caption,
                )
            })
            .await;

        match result {
            Ok(()) => {
                tracing::info!(
                    chat = %self.recipient,
                    identifier = %artifact.identifier(),
                    "Delivered result document"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    chat = %self.recipient,
                    identifier = %artifact.identifier(),
                    phase = "deliver",
                    error = %e,
                    "Failed to deliver result document"
                );
                Err(e.into())
            }
        }
    }

    async fn with_retry<F, Fut>(&self, kind: SendKind, mut send: F) -> Result<(), TransportError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<(), TransportError>>,
    {
        let mut retries = 0;
        loop {
            match send().await {
                Ok(()) => {
                    tokio::time::sleep(self.config.message_delay()).await;
                    return Ok(());
                }
                Err(TransportError::RateLimited { retry_after }) => {
                    if retries >= self.config.max_rate_limit_retries {
                        tracing::error!(
                            kind = ?kind,
                            retries,
                            "Max retries reached while rate limited"
                        );
                        return Err(TransportError::RateLimited { retry_after });
                    }
                    retries += 1;
                    tracing::warn!(
                        kind = ?kind,
                        retry = retries,
                        retry_after_secs = retry_after.as_secs(),
                        "Rate limited by transport, backing off"
                    );
                    tokio::time::sleep(retry_after).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
