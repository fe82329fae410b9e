//! Result fetching with bounded retry on transient network failures.

use std::future::Future;
use std::sync::Arc;

use crate::config::{FetchConfig, SiteConfig};
use crate::domain::{FatalKind, FetchResult, Identifier, TransientKind};
use crate::http::{HttpClient, HttpError, HttpResponse};

/// Retrieves the raw result document for one identifier.
///
/// Timeouts and connection failures are retried up to `max_attempts` total
/// attempts with a fixed pause between them. Everything else is classified on
/// the first attempt. Retries never outlive the identifier they belong to.
pub struct ResultFetcher<H: HttpClient> {
    http: Arc<H>,
    site: SiteConfig,
    config: FetchConfig,
}

impl<H: HttpClient> ResultFetcher<H> {
    pub fn new(http: Arc<H>, site: SiteConfig, config: FetchConfig) -> Self {
        Self { http, site, config }
    }

    pub fn result_url(&self, identifier: &Identifier) -> String {
        self.site.result_url(identifier.as_str())
    }

    /// Fetch without observing retries.
    pub async fn fetch(&self, identifier: &Identifier) -> FetchResult {
        self.fetch_observed(identifier, |_, _| async {}).await
    }

    /// Fetch, calling `on_retry(attempt, kind)` before sleeping ahead of
    /// another attempt. It is not called after the final attempt.
    #[tracing::instrument(skip(self, on_retry), fields(identifier = %identifier))]
    pub async fn fetch_observed<F, Fut>(&self, identifier: &Identifier, mut on_retry: F) -> FetchResult
    where
        F: FnMut(u32, TransientKind) -> Fut,
        Fut: Future<Output = ()>,
    {
        let url = self.result_url(identifier);
        let max_attempts = self.config.max_attempts.max(1);

        let mut attempt = 1;
        loop {
            let kind = match self.http.get(&url, self.config.timeout()).await {
                Ok(response) => return self.classify(identifier, response),
                Err(HttpError::Timeout) => TransientKind::Timeout,
                Err(HttpError::Connect(e)) => {
                    tracing::debug!(attempt, error = %e, "Connection failed");
                    TransientKind::ConnectionFailed
                }
                Err(HttpError::Other(e)) => {
                    tracing::error!(
                        phase = "fetch",
                        attempt,
                        error = %e,
                        "Unexpected error fetching result"
                    );
                    return FetchResult::FatalFailure(FatalKind::Unexpected(e));
                }
            };

            if attempt >= max_attempts {
                tracing::error!(
                    phase = "fetch",
                    attempts = attempt,
                    kind = ?kind,
                    "Giving up after transient failures"
                );
                return FetchResult::TransientFailure(kind);
            }

            tracing::warn!(
                phase = "fetch",
                attempt,
                max_attempts,
                kind = ?kind,
                "Transient failure, retrying"
            );
            on_retry(attempt, kind).await;
            tokio::time::sleep(self.config.retry_delay()).await;
            attempt += 1;
        }
    }

    fn classify(&self, identifier: &Identifier, response: HttpResponse) -> FetchResult {
        if !response.is_success() {
            tracing::error!(
                phase = "fetch",
                identifier = %identifier,
                status = response.status,
                "Result site returned an error status"
            );
            return FetchResult::FatalFailure(FatalKind::ServerError(response.status));
        }

        if response.body.contains(&self.config.invalid_marker) {
            tracing::info!(identifier = %identifier, "Registration number rejected by result site");
            return FetchResult::InvalidTarget;
        }

        tracing::info!(
            identifier = %identifier,
            body_len = response.body.len(),
            "Fetched result document"
        );
        FetchResult::Success(response.body)
    }
}
