//! Availability monitor: wait until the result site answers.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::MonitorConfig;
use crate::delivery::DeliveryChannel;
use crate::http::HttpClient;
use crate::transport::Transport;

/// Down-notice bookkeeping. Lives as long as the monitor's polling loop.
#[derive(Debug, Clone, Default)]
pub struct MonitorState {
    last_down_notification: Option<Instant>,
}

impl MonitorState {
    /// Whether a down notice is due at `now`. The first one always is.
    pub fn down_notice_due(&self, now: Instant, interval: Duration) -> bool {
        match self.last_down_notification {
            None => true,
            Some(last) => now.duration_since(last) >= interval,
        }
    }

    pub fn mark_down_notified(&mut self, now: Instant) {
        self.last_down_notification = Some(now);
    }
}

/// Polls the status URL on a fixed interval until it returns 200.
pub struct AvailabilityMonitor<H: HttpClient, T: Transport> {
    http: Arc<H>,
    channel: DeliveryChannel<T>,
    status_url: String,
    config: MonitorConfig,
    state: MonitorState,
}

impl<H: HttpClient, T: Transport> AvailabilityMonitor<H, T> {
    pub fn new(
        http: Arc<H>,
        channel: DeliveryChannel<T>,
        status_url: impl Into<String>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            http,
            channel,
            status_url: status_url.into(),
            config,
            state: MonitorState::default(),
        }
    }

    /// One probe. Any non-200 answer or transport failure counts as down.
    pub async fn is_up(&self) -> bool {
        match self
            .http
            .get(&self.status_url, self.config.probe_timeout())
            .await
        {
            Ok(response) => response.status == 200,
            Err(e) => {
                tracing::debug!(error = %e, "Status probe failed");
                false
            }
        }
    }

    /// Block until the site is up.
    ///
    /// Sends a start notice, at most one down notice per
    /// `down_notification_interval`, and exactly one up notice before
    /// returning.
    #[tracing::instrument(skip(self), fields(url = %self.status_url))]
    pub async fn await_up(&mut self) {
        tracing::info!("Starting website monitor");
        self.channel.notify("🔔 Result monitor started").await;

        loop {
            let now = Instant::now();
            if self.is_up().await {
                tracing::info!("Website is UP");
                self.channel
                    .notify(&format!("🎉 Website is LIVE!\n{}", self.status_url))
                    .await;
                return;
            }

            tracing::info!("Website is DOWN");
            if self
                .state
                .down_notice_due(now, self.config.down_notification_interval())
            {
                self.channel
                    .notify(&format!("⚠️ Website is still DOWN\n{}", self.status_url))
                    .await;
                self.state.mark_down_notified(now);
            }

            tokio::time::sleep(self.config.check_interval()).await;
        }
    }
}
