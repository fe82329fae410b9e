//! Chat transport abstraction.
//!
//! The delivery channel and the interactive session only depend on the
//! [`Transport`] trait. Production uses the Telegram Bot API over reqwest;
//! tests use [`MockTransport`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod mock;
pub mod telegram;

pub use mock::{MockTransport, SentItem};
pub use telegram::TelegramTransport;

/// Conversation a message is sent to or received from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors surfaced by a transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport asked us to slow down for `retry_after`.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// The API rejected the call.
    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },

    /// The call never got a usable answer.
    #[error("network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Network(e.to_string())
    }
}

/// One update received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingUpdate {
    /// Monotonic sequence number used to acknowledge receipt.
    pub update_id: i64,
    /// `None` for updates that carry no text message (stickers, edits, ...).
    pub message: Option<IncomingMessage>,
}

/// A text message received from a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat: ChatId,
    pub text: String,
}

/// Capabilities the courier needs from a chat transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Check that the transport is usable (credentials accepted, API reachable).
    /// Returns a display name for logs.
    async fn verify(&self) -> Result<String, TransportError>;

    async fn send_text(&self, chat: ChatId, text: &str) -> Result<(), TransportError>;

    async fn send_document(
        &self,
        chat: ChatId,
        file_name: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<(), TransportError>;

    /// Long-poll for updates with `update_id >= offset`. Passing an offset
    /// acknowledges every earlier update.
    async fn poll_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<IncomingUpdate>, TransportError>;
}
