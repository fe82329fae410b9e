//! Fetch results and per-identifier outcomes.
//!
//! A batch produces one [`IdentifierOutcome`] per input token, in input order.
//! Outcomes are aggregated into a [`RunSummary`] that only lives for one run.

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::identifier::Identifier;

/// Transient network failures that the fetcher retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    Timeout,
    ConnectionFailed,
}

/// Failures that end processing of an identifier without retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatalKind {
    /// The site answered with a non-success HTTP status.
    ServerError(u16),
    /// Anything else (unreadable body, malformed URL, ...).
    Unexpected(String),
}

/// Result of fetching the raw result document for one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// The raw HTML of the result page.
    Success(String),
    /// The site does not know this registration number.
    InvalidTarget,
    /// Retries exhausted on a timeout or connection failure.
    TransientFailure(TransientKind),
    FatalFailure(FatalKind),
}

/// Terminal status of one identifier within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Delivered,
    InvalidFormat,
    InvalidTarget,
    TimedOut,
    ConnectionFailed,
    ServerError(u16),
    UnexpectedError,
}

impl OutcomeStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeStatus::Delivered)
    }

    /// Human-readable failure reason used in summaries.
    pub fn reason(&self) -> String {
        match self {
            OutcomeStatus::Delivered => "Delivered".to_string(),
            OutcomeStatus::InvalidFormat => "Invalid format".to_string(),
            OutcomeStatus::InvalidTarget => "Invalid registration number".to_string(),
            OutcomeStatus::TimedOut => "Request timed out".to_string(),
            OutcomeStatus::ConnectionFailed => "Connection error".to_string(),
            OutcomeStatus::ServerError(code) => format!("Server error (status code: {})", code),
            OutcomeStatus::UnexpectedError => "Unexpected error".to_string(),
        }
    }
}

impl FetchResult {
    /// Terminal status implied by this result, or `None` when the document
    /// still has to be rendered and delivered.
    pub fn terminal_status(&self) -> Option<OutcomeStatus> {
        match self {
            FetchResult::Success(_) => None,
            FetchResult::InvalidTarget => Some(OutcomeStatus::InvalidTarget),
            FetchResult::TransientFailure(TransientKind::Timeout) => Some(OutcomeStatus::TimedOut),
            FetchResult::TransientFailure(TransientKind::ConnectionFailed) => {
                Some(OutcomeStatus::ConnectionFailed)
            }
            FetchResult::FatalFailure(FatalKind::ServerError(code)) => {
                Some(OutcomeStatus::ServerError(*code))
            }
            FetchResult::FatalFailure(FatalKind::Unexpected(_)) => {
                Some(OutcomeStatus::UnexpectedError)
            }
        }
    }
}

/// Outcome for one submitted token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierOutcome {
    /// The validated identifier, or the trimmed raw token when validation failed.
    pub token: String,
    pub status: OutcomeStatus,
}

impl IdentifierOutcome {
    pub fn new(token: impl Into<String>, status: OutcomeStatus) -> Self {
        Self {
            token: token.into(),
            status,
        }
    }

    pub fn for_identifier(identifier: &Identifier, status: OutcomeStatus) -> Self {
        Self::new(identifier.as_str(), status)
    }
}

/// Ordered outcomes of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    outcomes: Vec<IdentifierOutcome>,
}

impl BatchOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, outcome: IdentifierOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[IdentifierOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Tokens that were delivered, in input order.
    pub fn successful(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.status.is_success())
            .map(|o| o.token.as_str())
            .collect()
    }

    /// Failed tokens with their reasons, in input order.
    pub fn failed(&self) -> Vec<(&str, String)> {
        self.outcomes
            .iter()
            .filter(|o| !o.status.is_success())
            .map(|o| (o.token.as_str(), o.status.reason()))
            .collect()
    }

    /// Reply sent at the end of an interactive request.
    pub fn interactive_summary(&self) -> String {
        if self.is_empty() {
            return "No valid registration numbers processed. Use /start to try again.".to_string();
        }

        let mut summary = String::from("Processing complete:\n");
        let successful = self.successful();
        if !successful.is_empty() {
            summary.push_str(&format!("- Successful: {}\n", successful.join(", ")));
        }
        let failed = self.failed();
        if !failed.is_empty() {
            summary.push_str("- Failed:\n");
            summary.push_str(&format_failures(&failed));
        }
        summary.trim_end().to_string()
    }
}

/// Unique identifier for one orchestrator run, used to correlate logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        RunId(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Display only first 8 characters for readability in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Aggregation of every batch of one file-driven run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: RunId,
    /// Number of non-blank tokens read from the identifier file.
    pub total: usize,
    pub batches: Vec<BatchOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// Wall-clock time the run took.
    pub fn elapsed(&self) -> chrono::TimeDelta {
        self.finished_at - self.started_at
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &IdentifierOutcome> {
        self.batches.iter().flat_map(|b| b.outcomes().iter())
    }

    pub fn successful(&self) -> Vec<&str> {
        self.batches.iter().flat_map(|b| b.successful()).collect()
    }

    pub fn failed(&self) -> Vec<(&str, String)> {
        self.batches.iter().flat_map(|b| b.failed()).collect()
    }

    /// The summary message sent once a file-driven run finishes.
    pub fn message(&self) -> String {
        let successful = self.successful();
        let failed = self.failed();
        if successful.is_empty() && failed.is_empty() {
            return "No valid registration numbers processed.".to_string();
        }

        let mut summary = format!(
            "Processing complete for {} registration numbers:\n",
            self.total
        );
        if !successful.is_empty() {
            summary.push_str(&format!(
                "- Successful ({}): {}\n",
                successful.len(),
                successful.join(", ")
            ));
        }
        if !failed.is_empty() {
            summary.push_str(&format!("- Failed ({}):\n", failed.len()));
            summary.push_str(&format_failures(&failed));
        }
        summary.trim_end().to_string()
    }
}

fn format_failures(failed: &[(&str, String)]) -> String {
    failed
        .iter()
        .map(|(token, reason)| format!("  {}: {}", token, reason))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(outcomes: Vec<(&str, OutcomeStatus)>) -> BatchOutcome {
        let mut batch = BatchOutcome::new();
        for (token, status) in outcomes {
            batch.record(IdentifierOutcome::new(token, status));
        }
        batch
    }

    #[test]
    fn partitions_cover_every_outcome_in_order() {
        let outcomes = batch(vec![
            ("22156148011", OutcomeStatus::Delivered),
            ("bad", OutcomeStatus::InvalidFormat),
            ("22156148012", OutcomeStatus::ServerError(503)),
            ("22156148013", OutcomeStatus::Delivered),
        ]);

        assert_eq!(outcomes.successful(), vec!["22156148011", "22156148013"]);
        assert_eq!(
            outcomes.failed(),
            vec![
                ("bad", "Invalid format".to_string()),
                ("22156148012", "Server error (status code: 503)".to_string()),
            ]
        );
        assert_eq!(
            outcomes.successful().len() + outcomes.failed().len(),
            outcomes.len()
        );
    }

    #[test]
    fn fetch_results_map_to_terminal_statuses() {
        let cases = [
            (FetchResult::Success("<html/>".into()), None),
            (FetchResult::InvalidTarget, Some(OutcomeStatus::InvalidTarget)),
            (
                FetchResult::TransientFailure(TransientKind::Timeout),
                Some(OutcomeStatus::TimedOut),
            ),
            (
                FetchResult::TransientFailure(TransientKind::ConnectionFailed),
                Some(OutcomeStatus::ConnectionFailed),
            ),
            (
                FetchResult::FatalFailure(FatalKind::ServerError(500)),
                Some(OutcomeStatus::ServerError(500)),
            ),
            (
                FetchResult::FatalFailure(FatalKind::Unexpected("boom".into())),
                Some(OutcomeStatus::UnexpectedError),
            ),
        ];
        for (result, expected) in cases {
            assert_eq!(result.terminal_status(), expected);
        }
    }

    #[test]
    fn run_summary_message_lists_successes_and_failures() {
        let now = Utc::now();
        let summary = RunSummary {
            run_id: RunId::new(),
            total: 3,
            batches: vec![batch(vec![
                ("22156148011", OutcomeStatus::Delivered),
                ("bad", OutcomeStatus::InvalidFormat),
                ("22156148013", OutcomeStatus::Delivered),
            ])],
            started_at: now,
            finished_at: now,
        };

        assert_eq!(
            summary.message(),
            "Processing complete for 3 registration numbers:\n\
             - Successful (2): 22156148011, 22156148013\n\
             - Failed (1):\n  bad: Invalid format"
        );
    }

    #[test]
    fn run_summary_elapsed_spans_start_to_finish() {
        let started_at = Utc::now();
        let summary = RunSummary {
            run_id: RunId::new(),
            total: 0,
            batches: Vec::new(),
            started_at,
            finished_at: started_at + chrono::TimeDelta::seconds(42),
        };
        assert_eq!(summary.elapsed().num_seconds(), 42);
        assert_eq!(summary.message(), "No valid registration numbers processed.");
    }

    #[test]
    fn interactive_summary_formats() {
        let outcomes = batch(vec![
            ("22156148011", OutcomeStatus::TimedOut),
            ("22156148012", OutcomeStatus::Delivered),
        ]);
        assert_eq!(
            outcomes.interactive_summary(),
            "Processing complete:\n- Successful: 22156148012\n- Failed:\n  22156148011: Request timed out"
        );
        assert!(
            BatchOutcome::new()
                .interactive_summary()
                .starts_with("No valid registration numbers processed.")
        );
    }
}
