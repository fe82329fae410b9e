//! HTTP client abstraction for talking to the result site.
//!
//! This module defines the `HttpClient` trait to abstract HTTP GET execution,
//! enabling testability with mock implementations. Both the result fetcher and
//! the availability monitor go through it.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Response from an HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as a string
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Classified transport-level failure of a GET.
///
/// Timeouts and connection failures are kept apart because the fetcher
/// retries them and reports them differently.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Other(String),
}

impl From<reqwest::Error> for HttpError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            HttpError::Timeout
        } else if e.is_connect() {
            HttpError::Connect(e.to_string())
        } else {
            HttpError::Other(e.to_string())
        }
    }
}

/// Trait for executing HTTP GET requests.
///
/// # Example
/// ```ignore
/// let client = ReqwestHttpClient::new()?;
/// let response = client.get("https://example.com", Duration::from_secs(10)).await?;
/// println!("Status: {}, Body: {}", response.status, response.body);
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute a GET against `url`, giving up after `timeout`.
    ///
    /// A response with an error status is still `Ok`; only transport-level
    /// failures are returned as `HttpError`.
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, HttpError>;
}

// ============================================================================
// Production Implementation using reqwest
// ============================================================================

/// Production HTTP client using reqwest.
#[derive(Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> crate::error::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    #[tracing::instrument(skip(self), fields(timeout_ms = timeout.as_millis() as u64))]
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, HttpError> {
        tracing::debug!("Executing HTTP GET");

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "HTTP request failed");
                HttpError::from(e)
            })?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        tracing::debug!(
            status = status,
            response_len = body.len(),
            "HTTP request completed"
        );

        Ok(HttpResponse { status, body })
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Mock HTTP client for testing.
///
/// Responses are queued per URL and returned in FIFO order. When a URL's queue
/// holds a single entry, that entry is repeated for every later call.
///
/// # Example
/// ```ignore
/// let mock = MockHttpClient::new();
/// mock.add_response("https://site/result?RegNo=1", Ok(HttpResponse::ok("<html/>")));
/// ```
#[derive(Clone, Default)]
pub struct MockHttpClient {
    responses: Arc<Mutex<HashMap<String, Vec<Result<HttpResponse, HttpError>>>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

/// Record of a call made to the mock HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub url: String,
    pub timeout: Duration,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `url`.
    pub fn add_response(&self, url: &str, response: Result<HttpResponse, HttpError>) {
        self.responses
            .lock()
            .entry(url.to_string())
            .or_default()
            .push(response);
    }

    /// Get all calls that have been made to this mock client.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Number of calls made for one URL.
    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.url == url).count()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, HttpError> {
        self.calls.lock().push(MockCall {
            url: url.to_string(),
            timeout,
        });

        let mut responses = self.responses.lock();
        match responses.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.remove(0),
            Some(queue) if queue.len() == 1 => queue[0].clone(),
            _ => Err(HttpError::Other(format!(
                "No mock response configured for GET {}",
                url
            ))),
        }
    }
}
