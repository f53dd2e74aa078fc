//! The chain runner: render, mine, resolve, submit, advance.
//!
//! One run walks quiz pages sequentially on a single browser context. The
//! only hard stops are the wall-clock budget, a revisited URL, and a failed
//! submission request; everything else degrades into a debug record so the
//! caller always gets a usable trace.

pub mod session;

use crate::acquisition::http_client::HttpClient;
use crate::config::{Config, Timeouts};
use crate::renderer::{best_effort, RenderContext};
use crate::resolver::{AnswerResolver, AnswerSolver};
use crate::signals::{self, absolutize, find_fallback_next};
use crate::snapshot;
use crate::submit::{next_url_hint, SubmissionClient, SubmitPayload};
use anyhow::Result;
use session::{
    ChainEntry, ChainOutcome, ChainReport, DebugInfo, Session, StepRecord, TerminalRecord,
    TerminalStatus,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};

/// Decoded payloads kept in a step's debug record.
const DEBUG_DECODED_SAMPLE: usize = 3;

/// Who is solving and where to start.
#[derive(Debug, Clone)]
pub struct ChainRequest {
    pub email: String,
    pub secret: String,
    pub url: String,
}

/// Where the loop goes after a step.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Transition {
    Continue(String),
    Stop(ChainOutcome),
}

/// Drives one chain per call to [`ChainRunner::run`].
pub struct ChainRunner {
    solver: Arc<dyn AnswerSolver>,
    submitter: SubmissionClient,
    timeouts: Timeouts,
    result_selector: String,
    budget: Duration,
}

impl ChainRunner {
    pub fn new(config: &Config, solver: Arc<dyn AnswerSolver>, submitter: SubmissionClient) -> Self {
        Self {
            solver,
            submitter,
            timeouts: config.timeouts.clone(),
            result_selector: config.result_selector.clone(),
            budget: config.time_budget,
        }
    }

    /// Runner wired to the inference-backed resolver and a real HTTP submitter.
    pub fn from_config(config: &Config) -> Result<Self> {
        let solver = Arc::new(AnswerResolver::from_config(config)?);
        let submitter = SubmissionClient::new(
            HttpClient::new(&config.user_agent, config.timeouts.submit),
            config.timeouts.submit,
        );
        Ok(Self::new(config, solver, submitter))
    }

    /// Walk the chain starting at `request.url` until a terminal state.
    pub async fn run(&self, ctx: &mut dyn RenderContext, request: &ChainRequest) -> ChainReport {
        let mut session = Session::new(&request.email, &request.secret, &request.url, self.budget);
        let span = info_span!(
            "chain",
            run_id = %session.run_id,
            email = %request.email,
            start_url = %request.url,
        );

        async move {
            let mut current = request.url.clone();

            let outcome = loop {
                if session.is_expired() {
                    let elapsed = session.elapsed();
                    warn!(url = %current, elapsed_s = elapsed.as_secs_f64(), "time budget exhausted");
                    session.record(ChainEntry::Terminal(TerminalRecord {
                        status: TerminalStatus::Timeout,
                        url: current.clone(),
                        elapsed_seconds: Some(elapsed.as_secs_f64()),
                    }));
                    break ChainOutcome::Timeout;
                }

                if !session.visit(&current) {
                    warn!(url = %current, "loop detected");
                    session.record(ChainEntry::Terminal(TerminalRecord {
                        status: TerminalStatus::LoopDetected,
                        url: current.clone(),
                        elapsed_seconds: None,
                    }));
                    break ChainOutcome::LoopDetected;
                }

                match self.step(ctx, &mut session, &current).await {
                    Transition::Continue(next) => {
                        debug!(from = %current, to = %next, "advancing");
                        current = next;
                    }
                    Transition::Stop(outcome) => break outcome,
                }
            };

            info!(?outcome, steps = session.chain().len(), "chain finished");
            session.into_report(outcome)
        }
        .instrument(span)
        .await
    }

    /// Navigate and wait; every part is best-effort.
    async fn render(&self, ctx: &mut dyn RenderContext, url: &str) {
        let t = &self.timeouts;
        match ctx.navigate(url, as_ms(t.navigate)).await {
            Ok(nav) => debug!(
                url = %url,
                final_url = %nav.final_url,
                load_ms = nav.load_time_ms,
                "page loaded"
            ),
            Err(e) => debug!(url = %url, error = %e, "navigation incomplete"),
        }
        best_effort("wait_idle", ctx.wait_idle(as_ms(t.network_idle))).await;
        best_effort(
            "wait_result",
            ctx.wait_selector(&self.result_selector, as_ms(t.result_selector)),
        )
        .await;
    }

    async fn step(
        &self,
        ctx: &mut dyn RenderContext,
        session: &mut Session,
        url: &str,
    ) -> Transition {
        self.render(ctx, url).await;

        let snapshot = snapshot::capture(&*ctx, url, &self.result_selector).await;
        let signals = signals::mine(&snapshot);
        let answer = self.solver.solve(&snapshot, &signals).await;
        info!(
            url = %url,
            answer = ?answer,
            submit_url = ?signals.submit_url,
            downloads = signals.downloads.len(),
            decoded = signals.decoded.len(),
            "page processed"
        );

        let mut record = StepRecord::new(url, answer);

        if let (Some(answer), Some(submit_url)) = (answer, signals.submit_url.as_deref()) {
            let payload = SubmitPayload {
                email: &session.email,
                secret: &session.secret,
                url,
                answer,
            };
            record.submit_url = Some(submit_url.to_string());

            let outcome = match self.submitter.submit(submit_url, &payload).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(error = %e, "submission failed");
                    record.submit_error = Some(e.to_string());
                    session.record(ChainEntry::Step(record));
                    return Transition::Stop(ChainOutcome::SubmitError);
                }
            };

            info!(status = outcome.status, "answer submitted");
            let next = next_url_hint(&outcome.body);
            record.submit_status = Some(outcome.status);
            record.submit_response = Some(outcome.body);
            session.record(ChainEntry::Step(record));

            return match next {
                Some(next) => Transition::Continue(absolutize(url, &next)),
                None => Transition::Stop(ChainOutcome::Done),
            };
        }

        record.debug = Some(DebugInfo {
            url: url.to_string(),
            found_downloads: signals.downloads.as_slice().to_vec(),
            decoded_blocks_sample: signals
                .decoded
                .as_slice()
                .iter()
                .take(DEBUG_DECODED_SAMPLE)
                .cloned()
                .collect(),
            submit_url: signals.submit_url.clone(),
        });
        session.record(ChainEntry::Step(record));

        match find_fallback_next(&snapshot.visible_text, &snapshot.result_html) {
            Some(next) => Transition::Continue(next),
            None => Transition::Stop(ChainOutcome::NoNext),
        }
    }
}

fn as_ms(d: Duration) -> u64 {
    d.as_millis() as u64
}
