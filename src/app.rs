//! Composition root: wait for the site, run the identifier file, then serve
//! chat requests.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::CourierConfig;
use crate::delivery::DeliveryChannel;
use crate::fetcher::ResultFetcher;
use crate::http::HttpClient;
use crate::interactive::InteractiveSession;
use crate::monitor::AvailabilityMonitor;
use crate::pipeline::{BatchProcessor, Orchestrator, RunReport};
use crate::render::Renderer;
use crate::transport::{ChatId, Transport};

/// Which phases to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub skip_monitor: bool,
    pub interactive: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            skip_monitor: false,
            interactive: true,
        }
    }
}

/// Wires the collaborators together and drives the three phases in order.
pub struct Courier<H: HttpClient, R: Renderer, T: Transport> {
    config: CourierConfig,
    http: Arc<H>,
    processor: Arc<BatchProcessor<H, R>>,
    channel: DeliveryChannel<T>,
}

impl<H: HttpClient, R: Renderer, T: Transport> Courier<H, R, T> {
    pub fn new(config: CourierConfig, http: Arc<H>, renderer: Arc<R>, transport: Arc<T>) -> Self {
        let fetcher = ResultFetcher::new(http.clone(), config.site.clone(), config.fetch.clone());
        let processor = Arc::new(BatchProcessor::new(
            fetcher,
            renderer,
            config.pipeline.clone(),
        ));
        let channel = DeliveryChannel::new(
            transport,
            ChatId(config.telegram.chat_id),
            config.delivery.clone(),
        );
        Self {
            config,
            http,
            processor,
            channel,
        }
    }

    /// Channel to the owner chat.
    pub fn channel(&self) -> &DeliveryChannel<T> {
        &self.channel
    }

    /// Run every enabled phase. Returns once interactive mode stops, or right
    /// after the file run when interactive mode is disabled.
    ///
    /// A failure inside interactive mode (for example the bot token being
    /// rejected) is reported to the owner and ends that phase only.
    pub async fn run(&self, options: RunOptions, shutdown: CancellationToken) -> RunReport {
        if options.skip_monitor {
            tracing::info!("Skipping availability monitor");
        } else {
            let mut monitor = AvailabilityMonitor::new(
                self.http.clone(),
                self.channel.clone(),
                self.config.site.status_url.clone(),
                self.config.monitor.clone(),
            );
            monitor.await_up().await;
        }

        let orchestrator = Orchestrator::new(
            self.processor.clone(),
            self.channel.clone(),
            self.config.pipeline.clone(),
        );
        let report = orchestrator
            .run(&self.config.pipeline.identifier_file)
            .await;
        if !report.is_completed() {
            tracing::info!("File processing failed or empty, proceeding to interactive mode");
        }

        if options.interactive {
            let session = InteractiveSession::new(
                self.processor.clone(),
                self.channel.clone(),
                self.config.interactive.clone(),
            );
            if let Err(e) = session.run(shutdown).await {
                tracing::error!(error = %e, "Interactive mode failed");
                self.channel
                    .notify(&format!("❌ Interactive mode stopped due to error: {}", e))
                    .await;
            }
        }

        report
    }
}
