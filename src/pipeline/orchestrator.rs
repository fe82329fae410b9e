//! File-driven run: read identifiers, process them in batches, report.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use super::processor::BatchProcessor;
use crate::config::PipelineConfig;
use crate::delivery::DeliveryChannel;
use crate::domain::{RunId, RunSummary};
use crate::http::HttpClient;
use crate::render::Renderer;
use crate::transport::Transport;

/// Sent after a completed run, before interactive mode starts.
pub const TRANSITION_NOTICE: &str = "✅ Automated processing complete. Now accepting custom registration numbers. Use /start for instructions.";

/// Why a run never reached the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoRunReason {
    FileMissing(PathBuf),
    Unreadable { path: PathBuf, error: String },
    Empty,
}

/// Result of [`Orchestrator::run`].
#[derive(Debug, Clone)]
pub enum RunReport {
    NoRun(NoRunReason),
    Completed(RunSummary),
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunReport::Completed(_))
    }
}

/// Splits the identifier file into batches and drives the processor over
/// them, strictly one batch after another.
pub struct Orchestrator<H: HttpClient, R: Renderer, T: Transport> {
    processor: Arc<BatchProcessor<H, R>>,
    channel: DeliveryChannel<T>,
    config: PipelineConfig,
}

impl<H: HttpClient, R: Renderer, T: Transport> Orchestrator<H, R, T> {
    pub fn new(
        processor: Arc<BatchProcessor<H, R>>,
        channel: DeliveryChannel<T>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            processor,
            channel,
            config,
        }
    }

    /// Run over the identifiers in `path`.
    ///
    /// A missing, unreadable or empty file produces a single error notice
    /// and [`RunReport::NoRun`]; nothing is fetched.
    #[tracing::instrument(skip(self), fields(path = %path.display()))]
    pub async fn run(&self, path: &Path) -> RunReport {
        let tokens = match read_tokens(path).await {
            Ok(tokens) => tokens,
            Err(reason) => {
                self.channel.notify(&no_run_notice(&reason)).await;
                tracing::warn!(reason = ?reason, "File-driven run skipped");
                return RunReport::NoRun(reason);
            }
        };

        let run_id = RunId::new();
        let started_at = Utc::now();
        let batch_size = self.config.batch_size.max(1);
        let batch_count = tokens.len().div_ceil(batch_size);
        tracing::info!(
            run_id = %run_id,
            total = tokens.len(),
            batch_size,
            batch_count,
            "Starting file-driven run"
        );

        self.channel
            .notify(&format!(
                "Starting to process {} registration numbers...",
                tokens.len()
            ))
            .await;

        let mut batches = Vec::with_capacity(batch_count);
        for (index, batch) in tokens.chunks(batch_size).enumerate() {
            self.channel
                .notify(&format!(
                    "Processing batch {} ({} numbers)...",
                    index + 1,
                    batch.len()
                ))
                .await;

            let outcome = self.processor.process_batch(batch, &self.channel).await;
            tracing::info!(
                run_id = %run_id,
                batch = index + 1,
                delivered = outcome.successful().len(),
                failed = outcome.failed().len(),
                "Batch finished"
            );
            batches.push(outcome);

            if index + 1 < batch_count {
                tokio::time::sleep(self.config.batch_delay()).await;
            }
        }

        let summary = RunSummary {
            run_id,
            total: tokens.len(),
            batches,
            started_at,
            finished_at: Utc::now(),
        };

        self.channel.notify(&summary.message()).await;
        self.channel.notify(TRANSITION_NOTICE).await;
        tracing::info!(
            run_id = %run_id,
            delivered = summary.successful().len(),
            failed = summary.failed().len(),
            elapsed_ms = summary.elapsed().num_milliseconds(),
            "File-driven run complete"
        );

        RunReport::Completed(summary)
    }
}

/// Non-blank lines of the identifier file, trimmed, in file order.
async fn read_tokens(path: &Path) -> Result<Vec<String>, NoRunReason> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(NoRunReason::FileMissing(path.to_path_buf()));
        }
        Err(e) => {
            return Err(NoRunReason::Unreadable {
                path: path.to_path_buf(),
                error: e.to_string(),
            });
        }
    };

    let tokens: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if tokens.is_empty() {
        return Err(NoRunReason::Empty);
    }
    Ok(tokens)
}

fn no_run_notice(reason: &NoRunReason) -> String {
    match reason {
        NoRunReason::FileMissing(path) => format!("❌ Error: {} not found", path.display()),
        NoRunReason::Unreadable { path, error } => {
            format!("❌ Error reading {}: {}", path.display(), error)
        }
        NoRunReason::Empty => "⚠️ No registration numbers found in file".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeliveryConfig, FetchConfig, SiteConfig};
    use crate::domain::OutcomeStatus;
    use crate::fetcher::ResultFetcher;
    use crate::http::{HttpResponse, MockHttpClient};
    use crate::render::MockRenderer;
    use crate::transport::{ChatId, MockTransport};
    use std::io::Write;
    use std::time::Duration;

    const BASE: &str = "https://results.test/Pub.aspx";

    struct Harness {
        http: Arc<MockHttpClient>,
        transport: Arc<MockTransport>,
        orchestrator: Orchestrator<MockHttpClient, MockRenderer, MockTransport>,
        _artifacts: tempfile::TempDir,
    }

    fn harness(batch_delay_ms: u64) -> Harness {
        let artifacts = tempfile::tempdir().unwrap();
        let http = Arc::new(MockHttpClient::new());
        let transport = Arc::new(MockTransport::new());
        let pipeline = PipelineConfig {
            batch_size: 5,
            batch_delay_ms,
            identifier_delay_ms: 0,
            ..Default::default()
        };
        let fetcher = ResultFetcher::new(
            http.clone(),
            SiteConfig {
                result_base_url: BASE.to_string(),
                ..Default::default()
            },
            FetchConfig {
                retry_delay_ms: 0,
                ..Default::default()
            },
        );
        let processor = Arc::new(BatchProcessor::new(
            fetcher,
            Arc::new(MockRenderer::new(artifacts.path())),
            pipeline.clone(),
        ));
        let channel = DeliveryChannel::new(
            transport.clone(),
            ChatId(42),
            DeliveryConfig {
                message_delay_ms: 0,
                ..Default::default()
            },
        );
        Harness {
            http,
            transport,
            orchestrator: Orchestrator::new(processor, channel, pipeline),
            _artifacts: artifacts,
        }
    }

    fn identifier_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    fn serve_all(http: &MockHttpClient, ids: impl IntoIterator<Item = String>) {
        for id in ids {
            http.add_response(
                &format!("{}?Sem=IV&RegNo={}", BASE, id),
                Ok(HttpResponse::ok("<html/>")),
            );
        }
    }

    #[tokio::test]
    async fn test_missing_file_sends_single_notice() {
        let h = harness(0);
        let report = h
            .orchestrator
            .run(Path::new("/nonexistent/registration_numbers.txt"))
            .await;

        assert!(matches!(
            report,
            RunReport::NoRun(NoRunReason::FileMissing(_))
        ));
        assert_eq!(
            h.transport.sent_texts(),
            vec!["❌ Error: /nonexistent/registration_numbers.txt not found".to_string()]
        );
        assert_eq!(h.http.call_count(), 0);
    }

    #[tokio::test]
    async fn test_blank_file_is_empty() {
        let h = harness(0);
        let file = identifier_file(&["", "   ", ""]);
        let report = h.orchestrator.run(file.path()).await;

        assert!(matches!(report, RunReport::NoRun(NoRunReason::Empty)));
        assert_eq!(
            h.transport.sent_texts(),
            vec!["⚠️ No registration numbers found in file".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unreadable_path_reports_error() {
        let h = harness(0);
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be read as a file.
        let report = h.orchestrator.run(dir.path()).await;

        assert!(matches!(
            report,
            RunReport::NoRun(NoRunReason::Unreadable { .. })
        ));
        assert!(h.transport.sent_texts()[0].starts_with("❌ Error reading "));
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped_and_order_kept() {
        let h = harness(0);
        serve_all(&h.http, ["22156148011".to_string(), "22156148012".to_string()]);
        let file = identifier_file(&["  22156148011  ", "", "bad", "22156148012"]);

        let report = h.orchestrator.run(file.path()).await;
        let RunReport::Completed(summary) = report else {
            panic!("expected a completed run");
        };

        assert_eq!(summary.total, 3);
        let tokens: Vec<_> = summary
            .outcomes()
            .map(|o| (o.token.as_str(), o.status))
            .collect();
        assert_eq!(
            tokens,
            vec![
                ("22156148011", OutcomeStatus::Delivered),
                ("bad", OutcomeStatus::InvalidFormat),
                ("22156148012", OutcomeStatus::Delivered),
            ]
        );

        let texts = h.transport.sent_texts();
        assert_eq!(texts[0], "Starting to process 3 registration numbers...");
        assert_eq!(texts[1], "Processing batch 1 (3 numbers)...");
        assert_eq!(texts[texts.len() - 1], TRANSITION_NOTICE);
        assert_eq!(
            texts[texts.len() - 2],
            "Processing complete for 3 registration numbers:\n\
             - Successful (2): 22156148011, 22156148012\n\
             - Failed (1):\n  bad: Invalid format"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_are_split_and_spaced() {
        let h = harness(10_000);
        let ids: Vec<String> = (11..18).map(|n| format!("221561480{}", n)).collect();
        serve_all(&h.http, ids.clone());
        let lines: Vec<&str> = ids.iter().map(String::as_str).collect();
        let file = identifier_file(&lines);

        let start = tokio::time::Instant::now();
        let report = h.orchestrator.run(file.path()).await;
        let elapsed = start.elapsed();

        let RunReport::Completed(summary) = report else {
            panic!("expected a completed run");
        };
        assert_eq!(summary.batches.len(), 2);
        assert_eq!(summary.batches[0].len(), 5);
        assert_eq!(summary.batches[1].len(), 2);

        // One pause between the two batches, none after the last.
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(20));

        let texts = h.transport.sent_texts();
        assert!(texts.contains(&"Processing batch 1 (5 numbers)...".to_string()));
        assert!(texts.contains(&"Processing batch 2 (2 numbers)...".to_string()));
    }
}
