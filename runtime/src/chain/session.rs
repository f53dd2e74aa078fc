//! Per-run state for a chain traversal.
//!
//! A session holds the wall-clock budget, the visited-URL set and the
//! append-only chain log for one solve request. It is discarded when the run
//! ends.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

/// Why a chain stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainOutcome {
    /// A submission was accepted and named no further page.
    Done,
    /// No submission happened and no fallback page was found.
    NoNext,
    /// The wall-clock budget ran out.
    Timeout,
    /// A URL came round a second time.
    LoopDetected,
    /// The submission request itself failed.
    SubmitError,
}

/// Terminal marker written to the chain log by the structural guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalStatus {
    Timeout,
    LoopDetected,
}

/// A structural stop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminalRecord {
    pub status: TerminalStatus,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_seconds: Option<f64>,
}

/// Diagnostics kept when a step could not submit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugInfo {
    pub url: String,
    pub found_downloads: Vec<String>,
    pub decoded_blocks_sample: Vec<String>,
    pub submit_url: Option<String>,
}

/// One visited page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub url: String,
    pub computed_answer: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit_response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

impl StepRecord {
    pub fn new(url: &str, computed_answer: Option<f64>) -> Self {
        Self {
            url: url.to_string(),
            computed_answer,
            submit_url: None,
            submit_status: None,
            submit_response: None,
            submit_error: None,
            debug: None,
        }
    }
}

/// An entry in the chain log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChainEntry {
    Step(StepRecord),
    Terminal(TerminalRecord),
}

impl ChainEntry {
    pub fn as_step(&self) -> Option<&StepRecord> {
        match self {
            ChainEntry::Step(step) => Some(step),
            ChainEntry::Terminal(_) => None,
        }
    }

    pub fn as_terminal(&self) -> Option<&TerminalRecord> {
        match self {
            ChainEntry::Terminal(t) => Some(t),
            ChainEntry::Step(_) => None,
        }
    }
}

/// Result of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainReport {
    pub email: String,
    pub start_url: String,
    pub outcome: ChainOutcome,
    pub chain: Vec<ChainEntry>,
}

/// State for one traversal.
pub struct Session {
    /// Correlates log lines for this run.
    pub run_id: String,
    pub email: String,
    pub secret: String,
    pub start_url: String,
    started_at: Instant,
    budget: Duration,
    visited: HashSet<String>,
    chain: Vec<ChainEntry>,
}

impl Session {
    pub fn new(email: &str, secret: &str, start_url: &str, budget: Duration) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            secret: secret.to_string(),
            start_url: start_url.to_string(),
            started_at: Instant::now(),
            budget,
            visited: HashSet::new(),
            chain: Vec::new(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Whether the wall-clock budget has been exceeded.
    pub fn is_expired(&self) -> bool {
        self.elapsed() > self.budget
    }

    /// Mark `url` visited. Returns `false` if it already was.
    pub fn visit(&mut self, url: &str) -> bool {
        self.visited.insert(url.to_string())
    }

    pub fn record(&mut self, entry: ChainEntry) {
        self.chain.push(entry);
    }

    pub fn chain(&self) -> &[ChainEntry] {
        &self.chain
    }

    pub fn into_report(self, outcome: ChainOutcome) -> ChainReport {
        ChainReport {
            email: self.email,
            start_url: self.start_url,
            outcome,
            chain: self.chain,
        }
    }
}
