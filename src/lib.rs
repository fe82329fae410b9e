//! Result courier: waits for a result-publishing site to come up, then turns
//! registration numbers into delivered result documents over a chat bot.
//!
//! The core is a sequential pipeline shared by two entry points. A file-driven
//! run reads registration numbers from disk and processes them in batches;
//! afterwards an interactive session answers numbers sent over chat. Each
//! identifier is validated, fetched with bounded retry, rendered to a
//! temporary PDF and delivered with rate-limit-aware pacing.

pub mod app;
pub mod config;
pub mod delivery;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod interactive;
pub mod liveness;
pub mod logging;
pub mod monitor;
pub mod pipeline;
pub mod render;
pub mod transport;

// Re-export commonly used types
pub use app::{Courier, RunOptions};
pub use config::CourierConfig;
pub use delivery::DeliveryChannel;
pub use domain::*;
pub use error::{CourierError, Result};
pub use fetcher::ResultFetcher;
pub use http::{HttpClient, HttpResponse, MockHttpClient, ReqwestHttpClient};
pub use interactive::InteractiveSession;
pub use monitor::{AvailabilityMonitor, MonitorState};
pub use pipeline::{BatchProcessor, NoRunReason, Orchestrator, RunReport};
pub use render::{Artifact, CommandRenderer, MockRenderer, Renderer};
pub use transport::{ChatId, MockTransport, TelegramTransport, Transport, TransportError};
