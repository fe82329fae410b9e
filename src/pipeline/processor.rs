//! Batch processor: validate, fetch, render and deliver, one token at a time.
//!
//! The same per-token pipeline serves the file-driven run and interactive
//! requests; only the delivery channel differs.

use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::delivery::DeliveryChannel;
use crate::domain::{
    BatchOutcome, FetchResult, IDENTIFIER_EXAMPLE, Identifier, IdentifierOutcome, OutcomeStatus,
    TransientKind, Validation, validate,
};
use crate::fetcher::ResultFetcher;
use crate::http::HttpClient;
use crate::render::Renderer;
use crate::transport::Transport;

/// Drives tokens through Validator -> Fetcher -> Renderer -> Delivery Channel.
///
/// Tokens are processed strictly in order; nothing runs concurrently.
pub struct BatchProcessor<H: HttpClient, R: Renderer> {
    fetcher: ResultFetcher<H>,
    renderer: Arc<R>,
    config: PipelineConfig,
}

impl<H: HttpClient, R: Renderer> BatchProcessor<H, R> {
    pub fn new(fetcher: ResultFetcher<H>, renderer: Arc<R>, config: PipelineConfig) -> Self {
        Self {
            fetcher,
            renderer,
            config,
        }
    }

    /// Process every token in order, pausing `identifier_delay` after each.
    /// Produces exactly one outcome per token, in input order.
    #[tracing::instrument(skip_all, fields(batch_len = tokens.len(), chat = %channel.recipient()))]
    pub async fn process_batch<T: Transport>(
        &self,
        tokens: &[String],
        channel: &DeliveryChannel<T>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::new();
        for token in tokens {
            let result = self.process_token(token, channel).await;
            tracing::debug!(
                token = %result.token,
                status = ?result.status,
                "Token processed"
            );
            outcome.record(result);
            tokio::time::sleep(self.config.identifier_delay()).await;
        }
        outcome
    }

    /// Run the full pipeline for one raw token.
    pub async fn process_token<T: Transport>(
        &self,
        raw: &str,
        channel: &DeliveryChannel<T>,
    ) -> IdentifierOutcome {
        let identifier = match validate(raw) {
            Validation::Valid(identifier) => identifier,
            Validation::Invalid(token) => {
                tracing::info!(token = %token, phase = "validate", "Rejected malformed token");
                channel
                    .notify(&format!(
                        "Invalid format: '{}'. Expected: {}",
                        token, IDENTIFIER_EXAMPLE
                    ))
                    .await;
                return IdentifierOutcome::new(token, OutcomeStatus::InvalidFormat);
            }
        };

        channel
            .notify(&format!("Processing {}...", identifier))
            .await;

        let status = self.fetch_and_deliver(&identifier, channel).await;
        if let Some(notice) = failure_notice(&identifier, status) {
            channel.notify(&notice).await;
        }
        IdentifierOutcome::for_identifier(&identifier, status)
    }

    async fn fetch_and_deliver<T: Transport>(
        &self,
        identifier: &Identifier,
        channel: &DeliveryChannel<T>,
    ) -> OutcomeStatus {
        let result = self
            .fetcher
            .fetch_observed(identifier, |_, kind| {
                let notice = retry_notice(identifier, kind);
                async move {
                    channel.notify(&notice).await;
                }
            })
            .await;

        let document = match result {
            FetchResult::Success(document) => document,
            other => {
                return other
                    .terminal_status()
                    .unwrap_or(OutcomeStatus::UnexpectedError);
            }
        };

        // The artifact is released when it goes out of scope, whether or not
        // delivery succeeded.
        let artifact = match self.renderer.render(&document, identifier).await {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::error!(
                    identifier = %identifier,
                    phase = "render",
                    error = %e,
                    "PDF generation failed"
                );
                return OutcomeStatus::UnexpectedError;
            }
        };

        match channel
            .deliver(&artifact, &format!("Result for {}", identifier))
            .await
        {
            Ok(()) => OutcomeStatus::Delivered,
            Err(e) => {
                tracing::error!(
                    identifier = %identifier,
                    phase = "deliver",
                    error = %e,
                    "Result document was not delivered"
                );
                OutcomeStatus::UnexpectedError
            }
        }
    }
}

fn retry_notice(identifier: &Identifier, kind: TransientKind) -> String {
    match kind {
        TransientKind::Timeout => format!("Timeout for {}. Retrying...", identifier),
        TransientKind::ConnectionFailed => {
            format!("Connection error for {}. Retrying...", identifier)
        }
    }
}

/// Message sent when a validated identifier ends in failure. Malformed
/// tokens are reported during validation and never get here.
fn failure_notice(identifier: &Identifier, status: OutcomeStatus) -> Option<String> {
    let notice = match status {
        OutcomeStatus::Delivered | OutcomeStatus::InvalidFormat => return None,
        OutcomeStatus::InvalidTarget => format!("Invalid registration number: {}", identifier),
        OutcomeStatus::TimedOut => format!(
            "Failed to fetch results for {}. Request timed out.",
            identifier
        ),
        OutcomeStatus::ConnectionFailed => format!(
            "Failed to fetch results for {}. Connection error.",
            identifier
        ),
        OutcomeStatus::ServerError(code) => {
            format!("Server error for {}. Status code: {}", identifier, code)
        }
        OutcomeStatus::UnexpectedError => format!(
            "Failed to process {}. Please try again later.",
            identifier
        ),
    };
    Some(notice)
}
