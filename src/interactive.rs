//! Interactive mode: answer registration numbers sent over chat.
//!
//! Messages are taken one at a time from a long poll and handled to
//! completion before the next poll, so chat-submitted work never overlaps.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::InteractiveConfig;
use crate::delivery::DeliveryChannel;
use crate::error::Result;
use crate::http::HttpClient;
use crate::pipeline::BatchProcessor;
use crate::render::Renderer;
use crate::transport::{IncomingMessage, Transport};

pub const START_TEXT: &str = "Welcome to the Results Bot!\n\n\
Enter up to 10 registration numbers, one per line.\n\
Format: 11 digits (e.g., 22156148011)\n\
Example:\n\
22156148011\n\
22156148012\n\
22156148013\n\n\
Use /help for more information.";

pub const HELP_TEXT: &str = "Results Bot Help:\n\n\
1. Enter up to 10 registration numbers, one per line.\n\
2. Format: 11 digits (e.g., 22156148011).\n\
3. The bot will fetch results and send PDFs for each valid number.\n\
4. Use /start to begin or retry.\n\n\
For issues, contact the bot administrator.";

pub const UNAUTHORIZED_TEXT: &str = "Unauthorized access. This bot is private.";

pub const ERROR_TEXT: &str = "An error occurred. Please try again or use /help.";

/// What a received message asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Start,
    Help,
    /// Any other `/command`; ignored.
    UnknownCommand(String),
    /// Non-blank lines of a plain text message, trimmed.
    Identifiers(Vec<String>),
}

impl Request {
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if let Some(command) = trimmed.strip_prefix('/') {
            // "/start@result_bot extra" -> "start"
            let name = command
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .split('@')
                .next()
                .unwrap_or_default();
            return match name {
                "start" => Request::Start,
                "help" => Request::Help,
                other => Request::UnknownCommand(other.to_string()),
            };
        }

        Request::Identifiers(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

/// Long-polls the transport and runs submitted identifiers through the
/// shared batch processor, replying in the chat the request came from.
///
/// Only the configured owner chat may submit identifiers; `/start` and
/// `/help` are answered for anyone.
pub struct InteractiveSession<H: HttpClient, R: Renderer, T: Transport> {
    processor: Arc<BatchProcessor<H, R>>,
    channel: DeliveryChannel<T>,
    config: InteractiveConfig,
}

impl<H: HttpClient, R: Renderer, T: Transport> InteractiveSession<H, R, T> {
    /// `channel` addresses the owner chat.
    pub fn new(
        processor: Arc<BatchProcessor<H, R>>,
        channel: DeliveryChannel<T>,
        config: InteractiveConfig,
    ) -> Self {
        Self {
            processor,
            channel,
            config,
        }
    }

    /// Poll and handle messages until `shutdown` is cancelled.
    ///
    /// Fails only if the transport cannot be verified up front; poll errors
    /// are logged and retried after `error_backoff`.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let transport = self.channel.transport();
        let bot = transport.verify().await?;
        tracing::info!(bot = %bot, "Interactive mode started");

        let mut offset: Option<i64> = None;
        loop {
            let polled = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                polled = transport.poll_updates(offset, self.config.poll_timeout()) => polled,
            };

            match polled {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        match update.message {
                            Some(message) => self.handle_message(message).await,
                            None => tracing::debug!(
                                update_id = update.update_id,
                                "Ignoring update without text"
                            ),
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Polling for updates failed");
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.error_backoff()) => {}
                    }
                }
            }
        }

        tracing::info!("Interactive mode stopped");
        Ok(())
    }

    /// Handle one message to completion.
    #[tracing::instrument(skip_all, fields(chat = %message.chat))]
    pub async fn handle_message(&self, message: IncomingMessage) {
        let reply = self.channel.for_chat(message.chat);

        let tokens = match Request::parse(&message.text) {
            Request::Start => {
                reply.notify(START_TEXT).await;
                return;
            }
            Request::Help => {
                reply.notify(HELP_TEXT).await;
                return;
            }
            Request::UnknownCommand(command) => {
                tracing::debug!(command = %command, "Ignoring unknown command");
                return;
            }
            Request::Identifiers(tokens) => tokens,
        };

        if message.chat != self.channel.recipient() {
            tracing::warn!(chat = %message.chat, "Unauthorized access attempt");
            reply.notify(UNAUTHORIZED_TEXT).await;
            return;
        }

        if tokens.len() > self.config.max_tokens {
            reply
                .notify(&format!(
                    "Too many registration numbers. Please send up to {} at a time.",
                    self.config.max_tokens
                ))
                .await;
            return;
        }

        let outcome = self.processor.process_batch(&tokens, &reply).await;
        if !reply.notify(&outcome.interactive_summary()).await {
            reply.notify(ERROR_TEXT).await;
        }
    }
}
