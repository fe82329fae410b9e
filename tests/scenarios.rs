use result_courier::config::{
    DeliveryConfig, FetchConfig, InteractiveConfig, PipelineConfig, SiteConfig,
};
use result_courier::http::HttpError;
use result_courier::interactive::InteractiveSession;
use result_courier::transport::IncomingMessage;
use result_courier::{
    BatchProcessor, ChatId, DeliveryChannel, HttpResponse, MockHttpClient, MockRenderer,
    MockTransport, Orchestrator, OutcomeStatus, ResultFetcher, RunReport,
};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

const OWNER: ChatId = ChatId(42);
const BASE: &str = "https://results.test/Pub.aspx";

fn result_url(id: &str) -> String {
    format!("{}?Sem=IV&RegNo={}", BASE, id)
}

struct World {
    http: Arc<MockHttpClient>,
    renderer: Arc<MockRenderer>,
    transport: Arc<MockTransport>,
    processor: Arc<BatchProcessor<MockHttpClient, MockRenderer>>,
    channel: DeliveryChannel<MockTransport>,
    pipeline: PipelineConfig,
    artifacts: tempfile::TempDir,
}

impl World {
    fn new() -> Self {
        let artifacts = tempfile::tempdir().unwrap();
        let http = Arc::new(MockHttpClient::new());
        let renderer = Arc::new(MockRenderer::new(artifacts.path()));
        let transport = Arc::new(MockTransport::new());
        let pipeline = PipelineConfig {
            batch_size: 5,
            batch_delay_ms: 0,
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
            renderer.clone(),
            pipeline.clone(),
        ));
        let channel = DeliveryChannel::new(
            transport.clone(),
            OWNER,
            DeliveryConfig {
                message_delay_ms: 0,
                ..Default::default()
            },
        );
        Self {
            http,
            renderer,
            transport,
            processor,
            channel,
            pipeline,
            artifacts,
        }
    }

    fn orchestrator(&self) -> Orchestrator<MockHttpClient, MockRenderer, MockTransport> {
        Orchestrator::new(
            self.processor.clone(),
            self.channel.clone(),
            self.pipeline.clone(),
        )
    }

    fn live_artifacts(&self) -> usize {
        count_files(self.artifacts.path())
    }
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

fn identifier_file(lines: &[&str]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file
}

#[test_log::test(tokio::test)]
async fn file_run_with_one_malformed_token() {
    let world = World::new();
    world
        .http
        .add_response(&result_url("22156148011"), Ok(HttpResponse::ok("<html>1</html>")));
    world
        .http
        .add_response(&result_url("22156148013"), Ok(HttpResponse::ok("<html>3</html>")));
    let file = identifier_file(&["22156148011", "bad", "22156148013"]);

    let RunReport::Completed(summary) = world.orchestrator().run(file.path()).await else {
        panic!("expected a completed run");
    };

    assert_eq!(summary.batches.len(), 1);
    let statuses: Vec<_> = summary.outcomes().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![
            OutcomeStatus::Delivered,
            OutcomeStatus::InvalidFormat,
            OutcomeStatus::Delivered,
        ]
    );
    assert_eq!(summary.successful(), vec!["22156148011", "22156148013"]);
    assert_eq!(
        summary.failed(),
        vec![("bad", "Invalid format".to_string())]
    );

    assert_eq!(world.transport.documents().len(), 2);
    assert!(
        world
            .transport
            .sent_texts()
            .contains(&"Invalid format: 'bad'. Expected: 22156148011".to_string())
    );
    assert_eq!(world.live_artifacts(), 0);
}

#[test_log::test(tokio::test)]
async fn repeated_timeouts_end_in_single_failure_notice() {
    let world = World::new();
    world
        .http
        .add_response(&result_url("22156148011"), Err(HttpError::Timeout));

    let outcome = world
        .processor
        .process_batch(&["22156148011".to_string()], &world.channel)
        .await;

    assert_eq!(outcome.outcomes()[0].status, OutcomeStatus::TimedOut);
    assert_eq!(world.http.calls_to(&result_url("22156148011")), 3);
    assert!(world.renderer.rendered().is_empty());
    assert_eq!(world.live_artifacts(), 0);

    let failures = world
        .transport
        .sent_texts()
        .into_iter()
        .filter(|t| t == "Failed to fetch results for 22156148011. Request timed out.")
        .count();
    assert_eq!(failures, 1);
}

#[test_log::test(tokio::test)]
async fn success_on_second_attempt_stops_retrying() {
    let world = World::new();
    let url = result_url("22156148011");
    world
        .http
        .add_response(&url, Err(HttpError::Connect("connection refused".into())));
    world.http.add_response(&url, Ok(HttpResponse::ok("<html/>")));

    let outcome = world
        .processor
        .process_batch(&["22156148011".to_string()], &world.channel)
        .await;

    assert_eq!(outcome.outcomes()[0].status, OutcomeStatus::Delivered);
    assert_eq!(world.http.calls_to(&url), 2);
    assert!(
        world
            .transport
            .sent_texts()
            .contains(&"Connection error for 22156148011. Retrying...".to_string())
    );
}

#[test_log::test(tokio::test)]
async fn interactive_message_with_too_many_tokens_is_rejected() {
    let world = World::new();
    let session = InteractiveSession::new(
        world.processor.clone(),
        world.channel.clone(),
        InteractiveConfig::default(),
    );
    let text: Vec<String> = (11..22).map(|n| format!("221561480{}", n)).collect();

    session
        .handle_message(IncomingMessage {
            chat: OWNER,
            text: text.join("\n"),
        })
        .await;

    assert_eq!(world.http.call_count(), 0);
    assert_eq!(
        world.transport.sent_texts(),
        vec!["Too many registration numbers. Please send up to 10 at a time.".to_string()]
    );
}

#[test_log::test(tokio::test)]
async fn every_outcome_is_reported_once_in_order() {
    let world = World::new();
    let ids: Vec<String> = (11..19).map(|n| format!("221561480{}", n)).collect();
    for (i, id) in ids.iter().enumerate() {
        let response = match i % 4 {
            0 => Ok(HttpResponse::ok("<html/>")),
            1 => Ok(HttpResponse::ok("Invalid Registration Number")),
            2 => Ok(HttpResponse {
                status: 502,
                body: String::new(),
            }),
            _ => Err(HttpError::Other("tls handshake failed".into())),
        };
        world.http.add_response(&result_url(id), response);
    }
    let lines: Vec<&str> = ids.iter().map(String::as_str).collect();
    let file = identifier_file(&lines);

    let RunReport::Completed(summary) = world.orchestrator().run(file.path()).await else {
        panic!("expected a completed run");
    };

    let tokens: Vec<&str> = summary.outcomes().map(|o| o.token.as_str()).collect();
    assert_eq!(tokens, lines);
    assert_eq!(summary.successful().len() + summary.failed().len(), ids.len());

    let statuses: Vec<_> = summary.outcomes().map(|o| o.status).take(4).collect();
    assert_eq!(
        statuses,
        vec![
            OutcomeStatus::Delivered,
            OutcomeStatus::InvalidTarget,
            OutcomeStatus::ServerError(502),
            OutcomeStatus::UnexpectedError,
        ]
    );
    assert_eq!(world.live_artifacts(), 0);
}
