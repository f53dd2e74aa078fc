//! End-to-end chain runs over an in-memory site and a mock submission server.

mod common;

use common::{FakePage, FakeSite, ScriptedSolver};
use quizchain_runtime::acquisition::http_client::HttpClient;
use quizchain_runtime::chain::session::{ChainOutcome, TerminalStatus};
use quizchain_runtime::chain::{ChainRequest, ChainRunner};
use quizchain_runtime::config::Config;
use quizchain_runtime::snapshot;
use quizchain_runtime::submit::SubmissionClient;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const Q1: &str = "https://x.test/q1";
const Q2: &str = "https://x.test/q2";

fn runner(config: &Config, solver: Arc<ScriptedSolver>) -> ChainRunner {
    let timeout = Duration::from_secs(5);
    let submitter = SubmissionClient::new(HttpClient::new("quizchain-test", timeout), timeout);
    ChainRunner::new(config, solver, submitter)
}

fn request(url: &str) -> ChainRequest {
    ChainRequest {
        email: "student@example.test".into(),
        secret: "s3cret".into(),
        url: url.into(),
    }
}

#[tokio::test]
async fn test_submit_then_follow_next_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .and(body_partial_json(json!({
            "email": "student@example.test",
            "secret": "s3cret",
            "url": Q1,
            "answer": 42.0
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "correct": true,
            "next_url": Q2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let site = Arc::new(
        FakeSite::new()
            .page(
                Q1,
                FakePage::text(&format!("Post your answer to {}/submit", server.uri())),
            )
            .page(Q2, FakePage::text("All done, thanks.")),
    );
    let solver = Arc::new(ScriptedSolver::new().answer(Q1, 42.0));
    let runner = runner(&Config::default(), Arc::clone(&solver));

    let mut ctx = site.context();
    let report = runner.run(&mut ctx, &request(Q1)).await;

    assert_eq!(report.outcome, ChainOutcome::NoNext);
    assert_eq!(report.start_url, Q1);
    assert_eq!(report.chain.len(), 2);

    let first = report.chain[0].as_step().unwrap();
    assert_eq!(first.computed_answer, Some(42.0));
    assert_eq!(first.submit_url.as_deref(), Some(format!("{}/submit", server.uri()).as_str()));
    assert_eq!(first.submit_status, Some(200));
    assert_eq!(first.submit_response.as_ref().unwrap()["next_url"], Q2);
    assert!(first.debug.is_none());

    let second = report.chain[1].as_step().unwrap();
    assert_eq!(second.url, Q2);
    assert_eq!(second.computed_answer, None);
    let debug = second.debug.as_ref().unwrap();
    assert_eq!(debug.url, Q2);
    assert!(debug.submit_url.is_none());

    assert_eq!(site.navigations(), vec![Q1.to_string(), Q2.to_string()]);
    assert_eq!(solver.seen().len(), 2);
}

#[tokio::test]
async fn test_accepted_without_next_is_done() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"correct": true})))
        .mount(&server)
        .await;

    let site = Arc::new(FakeSite::new().page(
        Q1,
        FakePage::text(&format!("Submit to {}/submit", server.uri())),
    ));
    let solver = Arc::new(ScriptedSolver::new().answer(Q1, 7.0));
    let runner = runner(&Config::default(), solver);

    let report = runner.run(&mut site.context(), &request(Q1)).await;

    assert_eq!(report.outcome, ChainOutcome::Done);
    assert_eq!(report.chain.len(), 1);
    assert_eq!(report.chain[0].as_step().unwrap().submit_status, Some(200));
}

#[tokio::test]
async fn test_relative_next_url_resolved_against_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"url": "/q2"})))
        .mount(&server)
        .await;

    let site = Arc::new(
        FakeSite::new()
            .page(Q1, FakePage::text(&format!("{}/submit", server.uri())))
            .page(Q2, FakePage::text("end")),
    );
    let solver = Arc::new(ScriptedSolver::new().answer(Q1, 1.0));
    let runner = runner(&Config::default(), solver);

    let report = runner.run(&mut site.context(), &request(Q1)).await;

    assert_eq!(site.navigations(), vec![Q1.to_string(), Q2.to_string()]);
    assert_eq!(report.outcome, ChainOutcome::NoNext);
}

#[tokio::test]
async fn test_error_status_still_recorded_and_followed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .respond_with(ResponseTemplate::new(400).set_body_string("wrong answer"))
        .mount(&server)
        .await;

    let site = Arc::new(FakeSite::new().page(
        Q1,
        FakePage::text(&format!("{}/submit", server.uri())),
    ));
    let solver = Arc::new(ScriptedSolver::new().answer(Q1, 3.5));
    let runner = runner(&Config::default(), solver);

    let report = runner.run(&mut site.context(), &request(Q1)).await;

    let step = report.chain[0].as_step().unwrap();
    assert_eq!(step.submit_status, Some(400));
    assert_eq!(step.submit_response, Some(json!({"text": "wrong answer"})));
    assert_eq!(report.outcome, ChainOutcome::Done);
}

#[tokio::test]
async fn test_submit_transport_failure_stops_chain() {
    // Nothing listens on the discard port.
    let site = Arc::new(FakeSite::new().page(
        Q1,
        FakePage::text("Answer at http://127.0.0.1:9/submit then see https://x.test/quiz-2"),
    ));
    let solver = Arc::new(ScriptedSolver::new().answer(Q1, 5.0));
    let runner = runner(&Config::default(), solver);

    let report = runner.run(&mut site.context(), &request(Q1)).await;

    assert_eq!(report.outcome, ChainOutcome::SubmitError);
    assert_eq!(report.chain.len(), 1);
    let step = report.chain[0].as_step().unwrap();
    assert_eq!(step.submit_url.as_deref(), Some("http://127.0.0.1:9/submit"));
    assert!(step.submit_error.as_deref().unwrap().contains("127.0.0.1:9"));
    assert!(step.submit_status.is_none());
    assert_eq!(site.navigations().len(), 1);
}

#[tokio::test]
async fn test_self_link_is_loop_detected() {
    let url = "https://x.test/quiz-1";
    let site = Arc::new(FakeSite::new().page(url, FakePage::text(&format!("Try again: {url}"))));
    let runner = runner(&Config::default(), Arc::new(ScriptedSolver::new()));

    let report = runner.run(&mut site.context(), &request(url)).await;

    assert_eq!(report.outcome, ChainOutcome::LoopDetected);
    assert_eq!(report.chain.len(), 2);
    let terminal = report.chain[1].as_terminal().unwrap();
    assert_eq!(terminal.status, TerminalStatus::LoopDetected);
    assert_eq!(terminal.url, url);
    assert_eq!(site.navigations().len(), 1);
}

#[tokio::test]
async fn test_submission_pointing_back_is_loop_detected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"url": Q1})))
        .expect(1)
        .mount(&server)
        .await;

    let site = Arc::new(FakeSite::new().page(
        Q1,
        FakePage::text(&format!("{}/submit", server.uri())),
    ));
    let solver = Arc::new(ScriptedSolver::new().answer(Q1, 2.0));
    let runner = runner(&Config::default(), solver);

    let report = runner.run(&mut site.context(), &request(Q1)).await;

    assert_eq!(report.outcome, ChainOutcome::LoopDetected);
    assert_eq!(site.navigations().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_budget_exhausted_between_pages() {
    let mut slow = FakePage::text("Next up: https://x.test/quiz-2");
    slow.delay = Duration::from_secs(10);
    let site = Arc::new(FakeSite::new().page("https://x.test/quiz-1", slow));

    let config = Config {
        time_budget: Duration::from_secs(5),
        ..Config::default()
    };
    let runner = runner(&config, Arc::new(ScriptedSolver::new()));

    let report = runner
        .run(&mut site.context(), &request("https://x.test/quiz-1"))
        .await;

    assert_eq!(report.outcome, ChainOutcome::Timeout);
    assert_eq!(report.chain.len(), 2);
    let terminal = report.chain[1].as_terminal().unwrap();
    assert_eq!(terminal.status, TerminalStatus::Timeout);
    assert_eq!(terminal.url, "https://x.test/quiz-2");
    assert!(terminal.elapsed_seconds.unwrap() >= 10.0);
    assert_eq!(site.navigations(), vec!["https://x.test/quiz-1".to_string()]);
}

#[tokio::test]
async fn test_unreachable_page_degrades_to_debug_record() {
    let site = Arc::new(FakeSite::new());
    let solver = Arc::new(ScriptedSolver::new());
    let runner = runner(&Config::default(), Arc::clone(&solver));

    let report = runner.run(&mut site.context(), &request(Q1)).await;

    assert_eq!(report.outcome, ChainOutcome::NoNext);
    assert_eq!(report.chain.len(), 1);
    let debug = report.chain[0].as_step().unwrap().debug.clone().unwrap();
    assert!(debug.found_downloads.is_empty());
    assert!(debug.decoded_blocks_sample.is_empty());

    let seen = solver.seen();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].1.submit_url.is_none());
}

#[tokio::test]
async fn test_unanswered_page_records_mined_signals() {
    let page = FakePage {
        html: "<html><script>var d = atob('c2VjcmV0IGRhdGE=');</script></html>".into(),
        visible_text: "Download https://x.test/data.csv".into(),
        pre_texts: vec![" {\"a\": 1} ".into()],
        ..Default::default()
    };
    let site = Arc::new(FakeSite::new().page(Q1, page));
    let runner = runner(&Config::default(), Arc::new(ScriptedSolver::new()));

    let report = runner.run(&mut site.context(), &request(Q1)).await;

    let debug = report.chain[0].as_step().unwrap().debug.clone().unwrap();
    assert_eq!(debug.found_downloads, vec!["https://x.test/data.csv".to_string()]);
    assert_eq!(
        debug.decoded_blocks_sample,
        vec!["secret data".to_string(), "{\"a\":1}".to_string()]
    );
    assert_eq!(report.outcome, ChainOutcome::NoNext);
}

#[tokio::test]
async fn test_capture_reads_every_surface() {
    let page = FakePage {
        html: "<html>h</html>".into(),
        visible_text: "v".into(),
        scripts: vec!["s1".into(), "s2".into()],
        result_html: Some("<b>r</b>".into()),
        body_html: "b".into(),
        pre_texts: vec!["p".into()],
        delay: Duration::ZERO,
    };
    let site = Arc::new(FakeSite::new().page(Q1, page));
    let mut ctx = site.context();
    quizchain_runtime::renderer::RenderContext::navigate(&mut ctx, Q1, 1_000)
        .await
        .unwrap();

    let snap = snapshot::capture(&ctx, Q1, "#result").await;

    assert_eq!(snap.url, Q1);
    assert_eq!(snap.html, "<html>h</html>");
    assert_eq!(snap.visible_text, "v");
    assert_eq!(snap.scripts, vec!["s1", "s2"]);
    assert_eq!(snap.result_html, "<b>r</b>");
    assert_eq!(snap.body_html, "b");
    assert_eq!(snap.pre_texts, vec!["p"]);
}

#[tokio::test]
async fn test_capture_missing_surfaces_are_empty() {
    let site = Arc::new(FakeSite::new().page(Q1, FakePage::text("only text")));
    let mut ctx = site.context();
    quizchain_runtime::renderer::RenderContext::navigate(&mut ctx, Q1, 1_000)
        .await
        .unwrap();

    // No result element on the page.
    let snap = snapshot::capture(&ctx, Q1, "#result").await;
    assert_eq!(snap.result_html, "");
    assert!(snap.scripts.is_empty());

    // A selector the page never answers for yields nothing rather than an error.
    let snap = snapshot::capture(&ctx, Q1, "#missing").await;
    assert_eq!(snap.result_html, "");
    assert_eq!(snap.visible_text, "only text");
}
