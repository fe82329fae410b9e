//! In-memory transport for tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ChatId, IncomingMessage, IncomingUpdate, Transport, TransportError};

/// Something the mock transport accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentItem {
    Text {
        chat: ChatId,
        text: String,
    },
    Document {
        chat: ChatId,
        file_name: String,
        caption: String,
        size: usize,
    },
}

impl SentItem {
    pub fn text(&self) -> Option<&str> {
        match self {
            SentItem::Text { text, .. } => Some(text),
            SentItem::Document { .. } => None,
        }
    }

    pub fn chat(&self) -> ChatId {
        match self {
            SentItem::Text { chat, .. } | SentItem::Document { chat, .. } => *chat,
        }
    }
}

/// Mock transport for testing.
///
/// Records every successful send, and lets tests script failures for the next
/// send calls and the updates returned by long-polling.
///
/// # Example
/// ```ignore
/// let transport = MockTransport::new();
/// transport.fail_next_send(TransportError::RateLimited { retry_after: Duration::from_secs(1) });
/// transport.push_message(ChatId(42), "22156148011");
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<SentItem>>>,
    send_failures: Arc<Mutex<VecDeque<TransportError>>>,
    send_attempts: Arc<Mutex<usize>>,
    updates: Arc<Mutex<VecDeque<Result<IncomingUpdate, TransportError>>>>,
    next_update_id: Arc<Mutex<i64>>,
    offsets: Arc<Mutex<Vec<Option<i64>>>>,
    verify_error: Arc<Mutex<Option<TransportError>>>,
    document_failures: Arc<Mutex<VecDeque<TransportError>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next send (text or document) with `error`. Queued failures
    /// are consumed in order before any send succeeds.
    pub fn fail_next_send(&self, error: TransportError) {
        self.send_failures.lock().push_back(error);
    }

    /// Fail the next document upload with `error`. Text sends are unaffected
    /// and do not consume these failures.
    pub fn fail_next_document(&self, error: TransportError) {
        self.document_failures.lock().push_back(error);
    }

    pub fn fail_verify(&self, error: TransportError) {
        *self.verify_error.lock() = Some(error);
    }

    /// Queue a text message to be returned by the next poll.
    pub fn push_message(&self, chat: ChatId, text: &str) {
        let mut next = self.next_update_id.lock();
        *next += 1;
        self.updates.lock().push_back(Ok(IncomingUpdate {
            update_id: *next,
            message: Some(IncomingMessage {
                chat,
                text: text.to_string(),
            }),
        }));
    }

    /// Queue an update that carries no text message.
    pub fn push_non_text_update(&self) {
        let mut next = self.next_update_id.lock();
        *next += 1;
        self.updates.lock().push_back(Ok(IncomingUpdate {
            update_id: *next,
            message: None,
        }));
    }

    /// Make the next poll fail.
    pub fn push_poll_error(&self, error: TransportError) {
        self.updates.lock().push_back(Err(error));
    }

    pub fn sent(&self) -> Vec<SentItem> {
        self.sent.lock().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|item| item.text().map(str::to_string))
            .collect()
    }

    pub fn documents(&self) -> Vec<SentItem> {
        self.sent
            .lock()
            .iter()
            .filter(|item| matches!(item, SentItem::Document { .. }))
            .cloned()
            .collect()
    }

    /// Every send call, including the ones that failed.
    pub fn send_attempts(&self) -> usize {
        *self.send_attempts.lock()
    }

    /// Offsets passed to each poll, in order.
    pub fn poll_offsets(&self) -> Vec<Option<i64>> {
        self.offsets.lock().clone()
    }

    fn record(&self, item: SentItem) -> Result<(), TransportError> {
        *self.send_attempts.lock() += 1;
        if let Some(error) = self.send_failures.lock().pop_front() {
            return Err(error);
        }
        self.sent.lock().push(item);
        Ok(())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn verify(&self) -> Result<String, TransportError> {
        match self.verify_error.lock().clone() {
            Some(error) => Err(error),
            None => Ok("mock_bot".to_string()),
        }
    }

    async fn send_text(&self, chat: ChatId, text: &str) -> Result<(), TransportError> {
        self.record(SentItem::Text {
            chat,
            text: text.to_string(),
        })
    }

    async fn send_document(
        &self,
        chat: ChatId,
        file_name: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<(), TransportError> {
        let failure = self.document_failures.lock().pop_front();
        if let Some(error) = failure {
            *self.send_attempts.lock() += 1;
            return Err(error);
        }
        self.record(SentItem::Document {
            chat,
            file_name: file_name.to_string(),
            caption: caption.to_string(),
            size: bytes.len(),
        })
    }

    async fn poll_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<IncomingUpdate>, TransportError> {
        self.offsets.lock().push(offset);

        let next = {
            let mut updates = self.updates.lock();
            if let Some(offset) = offset {
                updates.retain(|u| !matches!(u, Ok(update) if update.update_id < offset));
            }
            updates.pop_front()
        };

        match next {
            Some(Ok(update)) => Ok(vec![update]),
            Some(Err(error)) => Err(error),
            None => {
                // Nothing queued: behave like an idle long poll.
                tokio::time::sleep(timeout.min(Duration::from_millis(20))).await;
                Ok(Vec::new())
            }
        }
    }
}
