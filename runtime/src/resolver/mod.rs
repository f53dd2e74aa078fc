//! Answer resolution.
//!
//! Builds a bounded prompt from a page's content and mined signals (plus the
//! head of up to three successfully downloaded files) and asks the inference service for
//! a number. Every failure degrades to "no answer".

pub mod inference;

use crate::acquisition::download::download_file;
use crate::acquisition::http_client::HttpClient;
use crate::config::Config;
use crate::signals::MinedSignals;
use crate::snapshot::PageSnapshot;
use anyhow::Result;
use async_trait::async_trait;
use inference::{first_number, InferenceClient, ResponsesClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Scripts included in the prompt.
const MAX_SCRIPTS: usize = 5;

/// Decoded payloads included in the prompt.
const MAX_DECODED: usize = 5;

/// Downloaded file texts included per step.
const MAX_DOWNLOADS: usize = 3;

/// Candidate URLs tried per step before giving up on more file texts.
const MAX_DOWNLOAD_ATTEMPTS: usize = 12;

/// Characters kept from each downloaded file.
const MAX_DOWNLOAD_CHARS: usize = 5000;

const SECTION_RULE: &str = "\n\n============================\n\n";
const ITEM_RULE: &str = "\n-----\n";

/// Produces a numeric answer for a page, or nothing.
#[async_trait]
pub trait AnswerSolver: Send + Sync {
    async fn solve(&self, snapshot: &PageSnapshot, signals: &MinedSignals) -> Option<f64>;
}

/// Inference-backed solver.
pub struct AnswerResolver {
    http: HttpClient,
    inference: Arc<dyn InferenceClient>,
    model: String,
    download_timeout: Duration,
}

impl AnswerResolver {
    pub fn new(
        http: HttpClient,
        inference: Arc<dyn InferenceClient>,
        model: impl Into<String>,
        download_timeout: Duration,
    ) -> Self {
        Self {
            http,
            inference,
            model: model.into(),
            download_timeout,
        }
    }

    /// Resolver wired to the `/responses` API described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = HttpClient::new(&config.user_agent, config.timeouts.download);
        let inference = ResponsesClient::new(&config.llm, config.timeouts.inference)?;
        Ok(Self::new(
            http,
            Arc::new(inference),
            config.llm.model.clone(),
            config.timeouts.download,
        ))
    }

    /// Fetch the head of the first [`MAX_DOWNLOADS`] candidate files that download.
    ///
    /// Candidates are tried in discovery order; failures are skipped. The
    /// current page and the submission endpoint are not candidates. Each
    /// temporary file is gone by the time this returns.
    pub async fn download_texts(&self, snapshot: &PageSnapshot, signals: &MinedSignals) -> Vec<String> {
        let candidates = signals
            .downloads
            .as_slice()
            .iter()
            .filter(|u| **u != snapshot.url && Some(u.as_str()) != signals.submit_url.as_deref())
            .take(MAX_DOWNLOAD_ATTEMPTS);

        let mut texts = Vec::new();
        for url in candidates {
            if texts.len() == MAX_DOWNLOADS {
                break;
            }
            let text = download_file(&self.http, url, self.download_timeout)
                .await
                .and_then(|file| file.read_text(MAX_DOWNLOAD_CHARS));
            match text {
                Ok(text) => texts.push(format!("FILE {url}:\n{text}")),
                Err(e) => debug!(url = %url, error = %e, "download skipped"),
            }
        }
        texts
    }
}

#[async_trait]
impl AnswerSolver for AnswerResolver {
    async fn solve(&self, snapshot: &PageSnapshot, signals: &MinedSignals) -> Option<f64> {
        let downloads = self.download_texts(snapshot, signals).await;
        let prompt = build_prompt(snapshot, signals, &downloads);

        let text = match self.inference.infer(&prompt, &self.model).await {
            Ok(text) => text,
            Err(e) => {
                warn!(url = %snapshot.url, error = %e, "inference failed");
                return None;
            }
        };

        let answer = first_number(&text);
        if answer.is_none() {
            warn!(url = %snapshot.url, response = %text, "inference returned no number");
        }
        answer
    }
}

/// Assemble the inference prompt from page content.
pub fn build_prompt(snapshot: &PageSnapshot, signals: &MinedSignals, downloads: &[String]) -> String {
    let mut sections = vec![
        format!("VISIBLE TEXT:\n{}", snapshot.visible_text),
        format!("BODY HTML:\n{}", snapshot.body_html),
        format!("RESULT HTML:\n{}", snapshot.result_html),
    ];

    if !snapshot.scripts.is_empty() {
        let scripts: Vec<&str> = snapshot
            .scripts
            .iter()
            .take(MAX_SCRIPTS)
            .map(String::as_str)
            .collect();
        sections.push(format!("SCRIPTS:\n{}", scripts.join(ITEM_RULE)));
    }

    if !signals.decoded.is_empty() {
        let decoded: Vec<&str> = signals
            .decoded
            .as_slice()
            .iter()
            .take(MAX_DECODED)
            .map(String::as_str)
            .collect();
        sections.push(format!("DECODED BLOCKS:\n{}", decoded.join(ITEM_RULE)));
    }

    if !downloads.is_empty() {
        let files: Vec<&str> = downloads
            .iter()
            .take(MAX_DOWNLOADS)
            .map(String::as_str)
            .collect();
        sections.push(format!("DOWNLOADED FILE TEXTS:\n{}", files.join(ITEM_RULE)));
    }

    format!(
        "You solve quiz pages automatically.\n\
         Find the numeric answer the page asks for in the content below. It may be \
         in the HTML, JSON, JavaScript, tables, plain text or downloaded files.\n\n\
         RULES:\n\
         1. Reply with the answer only, as a raw number.\n\
         2. No words, labels or explanations.\n\
         3. No JSON.\n\n\
         PAGE CONTEXT:\n\n{}",
        sections.join(SECTION_RULE)
    )
}
