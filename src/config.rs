//! Configuration for the result courier.
//!
//! Sources, lowest precedence first:
//! 1. Defaults (the constants the service has always run with)
//! 2. An optional configuration file (TOML or YAML, picked by extension)
//! 3. Environment variables prefixed with `COURIER`, using `__` between
//!    section and key, e.g. `COURIER_TELEGRAM__BOT_TOKEN`
//!
//! Each component receives its own section by value when it is built.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{CourierError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CourierConfig {
    pub telegram: TelegramConfig,
    pub site: SiteConfig,
    pub fetch: FetchConfig,
    pub delivery: DeliveryConfig,
    pub pipeline: PipelineConfig,
    pub monitor: MonitorConfig,
    pub interactive: InteractiveConfig,
    pub liveness: LivenessConfig,
    pub renderer: RendererConfig,
    pub logging: LoggingConfig,
}

/// Bot credentials and the single authorized recipient.
#[derive(Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Chat that receives file-run notifications and the only chat allowed
    /// to submit identifiers interactively.
    pub chat_id: i64,
    pub api_base: String,
    /// Per-call timeout for Bot API requests. Must exceed the long-poll timeout.
    pub request_timeout_ms: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: 0,
            api_base: "https://api.telegram.org".to_string(),
            request_timeout_ms: 60_000,
        }
    }
}

// Keep the token out of logs.
impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

/// The result-publishing site.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SiteConfig {
    /// Page polled by the availability monitor.
    pub status_url: String,
    /// Base of the per-identifier result URL.
    pub result_base_url: String,
    pub semester: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            status_url: "https://results.beup.ac.in/BTech4thSem2024_B2022Results.aspx".to_string(),
            result_base_url: "https://results.beup.ac.in/ResultsBTech4thSem2024_B2022Pub.aspx"
                .to_string(),
            semester: "IV".to_string(),
        }
    }
}

impl SiteConfig {
    /// Deterministic result URL for one registration number.
    pub fn result_url(&self, identifier: &str) -> String {
        format!(
            "{}?Sem={}&RegNo={}",
            self.result_base_url, self.semester, identifier
        )
    }
}

/// Result fetching and its retry policy.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_ms: u64,
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub retry_delay_ms: u64,
    /// Body text that marks an unknown registration number.
    pub invalid_marker: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_attempts: 3,
            retry_delay_ms: 5_000,
            invalid_marker: "Invalid Registration Number".to_string(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Delivery channel pacing and rate-limit handling.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Retries after a rate-limited send before the send is abandoned.
    pub max_rate_limit_retries: u32,
    /// Pause after every successful send.
    pub message_delay_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_rate_limit_retries: 3,
            message_delay_ms: 2_000,
        }
    }
}

impl DeliveryConfig {
    pub fn message_delay(&self) -> Duration {
        Duration::from_millis(self.message_delay_ms)
    }
}

/// File-driven run and batch processing.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub identifier_file: PathBuf,
    pub batch_size: usize,
    /// Pause between batches; none after the last batch.
    pub batch_delay_ms: u64,
    /// Pause after every identifier, whatever its outcome.
    pub identifier_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            identifier_file: PathBuf::from("registration_numbers.txt"),
            batch_size: 5,
            batch_delay_ms: 10_000,
            identifier_delay_ms: 1_000,
        }
    }
}

impl PipelineConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn identifier_delay(&self) -> Duration {
        Duration::from_millis(self.identifier_delay_ms)
    }
}

/// Availability monitor cadence.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    pub check_interval_ms: u64,
    pub probe_timeout_ms: u64,
    /// Minimum time between two down notices.
    pub down_notification_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 30_000,
            probe_timeout_ms: 10_000,
            down_notification_interval_ms: 7_200_000,
        }
    }
}

impl MonitorConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn down_notification_interval(&self) -> Duration {
        Duration::from_millis(self.down_notification_interval_ms)
    }
}

/// Chat-driven mode.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct InteractiveConfig {
    /// Maximum identifiers accepted in one message.
    pub max_tokens: usize,
    /// Long-poll timeout passed to the transport.
    pub poll_timeout_secs: u64,
    /// Pause after a failed poll before polling again.
    pub error_backoff_ms: u64,
}

impl Default for InteractiveConfig {
    fn default() -> Self {
        Self {
            max_tokens: 10,
            poll_timeout_secs: 30,
            error_backoff_ms: 5_000,
        }
    }
}

impl InteractiveConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

/// Keep-alive endpoint.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LivenessConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// External HTML-to-PDF converter.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RendererConfig {
    pub command: String,
    /// Arguments; `{output}` is replaced with the artifact path. HTML is
    /// written to the command's stdin.
    pub args: Vec<String>,
    /// Where transient artifacts are created. System temp dir when unset.
    pub artifact_dir: Option<PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            command: "weasyprint".to_string(),
            args: vec!["-".to_string(), "{output}".to_string()],
            artifact_dir: None,
        }
    }
}

/// Log output.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when RUST_LOG is not set
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl CourierConfig {
    /// Load defaults, then `path` if given, then `COURIER_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config: CourierConfig = builder
            .add_source(
                Environment::with_prefix("COURIER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("renderer.args"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(CourierError::Config("telegram.bot_token is not set".into()));
        }
        if self.telegram.chat_id == 0 {
            return Err(CourierError::Config("telegram.chat_id is not set".into()));
        }
        if self.pipeline.batch_size == 0 {
            return Err(CourierError::Config(
                "pipeline.batch_size must be at least 1".into(),
            ));
        }
        if self.fetch.max_attempts == 0 {
            return Err(CourierError::Config(
                "fetch.max_attempts must be at least 1".into(),
            ));
        }
        if self.interactive.max_tokens == 0 {
            return Err(CourierError::Config(
                "interactive.max_tokens must be at least 1".into(),
            ));
        }
        if self.telegram.request_timeout_ms <= self.interactive.poll_timeout_secs * 1000 {
            return Err(CourierError::Config(
                "telegram.request_timeout_ms must exceed interactive.poll_timeout_secs".into(),
            ));
        }
        Ok(())
    }
}
