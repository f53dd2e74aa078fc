//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). The chain
//! runner only ever talks to these traits.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// DOM property read from each element matched by `eval_all` / `eval_one`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    /// `textContent`, includes script bodies and hidden text.
    TextContent,
    /// `innerText`, rendered text only.
    InnerText,
    /// `innerHTML`.
    InnerHtml,
}

impl Extractor {
    /// The JavaScript property name this extractor reads.
    pub fn property(self) -> &'static str {
        match self {
            Extractor::TextContent => "textContent",
            Extractor::InnerText => "innerText",
            Extractor::InnerHtml => "innerHTML",
        }
    }
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new, isolated browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab) for rendering pages.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Wait until the page stops loading resources.
    async fn wait_idle(&self, timeout_ms: u64) -> Result<()>;
    /// Wait until an element matching `selector` exists.
    async fn wait_selector(&self, selector: &str, timeout_ms: u64) -> Result<()>;
    /// Read `extractor` from every element matching `selector`.
    async fn eval_all(&self, selector: &str, extractor: Extractor) -> Result<Vec<String>>;
    /// Read `extractor` from the first element matching `selector`, if any.
    async fn eval_one(&self, selector: &str, extractor: Extractor) -> Result<Option<String>>;
    /// Get the full page HTML.
    async fn get_html(&self) -> Result<String>;
    /// Get the rendered text of the first element matching `selector`.
    async fn get_inner_text(&self, selector: &str) -> Result<String>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A no-op renderer used when Chromium is unavailable.
///
/// The index and health endpoints keep working; every solve request fails
/// at context creation.
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        Err(anyhow::anyhow!("Browser not available"))
    }
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
    fn active_contexts(&self) -> usize {
        0
    }
}

/// Await a fallible browser operation, substituting the default on failure.
///
/// Quiz pages are unpredictable, so waits and content reads never abort a
/// step. The failure is only visible at debug level.
pub async fn best_effort<T, F>(label: &str, op: F) -> T
where
    T: Default,
    F: Future<Output = Result<T>>,
{
    match op.await {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(step = label, error = %e, "best-effort operation failed");
            T::default()
        }
    }
}

/// Build the JavaScript that reads `extractor` from elements matching `selector`.
///
/// With `all`, evaluates to an array of strings (missing values become `""`);
/// otherwise to the first element's value or `null`.
pub fn element_query_js(selector: &str, extractor: Extractor, all: bool) -> String {
    let sel = serde_json::Value::String(selector.to_string()).to_string();
    let prop = extractor.property();
    if all {
        format!(
            "(() => Array.from(document.querySelectorAll({sel})).map(e => String(e.{prop} || '')))()"
        )
    } else {
        format!(
            "(() => {{ const e = document.querySelector({sel}); return e ? String(e.{prop} || '') : null; }})()"
        )
    }
}
