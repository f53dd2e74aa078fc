//! In-memory stand-ins for the browser and the answer solver.

#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use quizchain_runtime::renderer::{Extractor, NavigationResult, RenderContext, Renderer};
use quizchain_runtime::resolver::AnswerSolver;
use quizchain_runtime::signals::MinedSignals;
use quizchain_runtime::snapshot::PageSnapshot;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One page of a fake site.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub html: String,
    pub visible_text: String,
    pub scripts: Vec<String>,
    pub result_html: Option<String>,
    pub body_html: String,
    pub pre_texts: Vec<String>,
    /// Simulated load time.
    pub delay: Duration,
}

impl FakePage {
    /// A page whose only content is its visible text (mirrored into the HTML).
    pub fn text(visible: &str) -> Self {
        Self {
            html: format!("<html><body>{visible}</body></html>"),
            visible_text: visible.to_string(),
            body_html: visible.to_string(),
            ..Default::default()
        }
    }
}

/// A set of pages keyed by URL, plus a log of navigations.
#[derive(Default)]
pub struct FakeSite {
    pages: HashMap<String, FakePage>,
    navigations: Mutex<Vec<String>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn contexts_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn contexts_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn context(self: &Arc<Self>) -> FakeContext {
        self.opened.fetch_add(1, Ordering::SeqCst);
        FakeContext {
            site: Arc::clone(self),
            current: None,
        }
    }
}

/// A browser tab over a [`FakeSite`].
pub struct FakeContext {
    site: Arc<FakeSite>,
    current: Option<String>,
}

impl FakeContext {
    fn page(&self) -> Result<&FakePage> {
        let url = self.current.as_deref().ok_or_else(|| anyhow!("nothing loaded"))?;
        self.site
            .pages
            .get(url)
            .ok_or_else(|| anyhow!("page crashed: {url}"))
    }
}

#[async_trait]
impl RenderContext for FakeContext {
    async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
        self.site.navigations.lock().unwrap().push(url.to_string());
        self.current = Some(url.to_string());

        let Some(page) = self.site.pages.get(url) else {
            bail!("net::ERR_NAME_NOT_RESOLVED");
        };
        if !page.delay.is_zero() {
            tokio::time::sleep(page.delay).await;
        }
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: page.delay.as_millis() as u64,
        })
    }

    async fn wait_idle(&self, _timeout_ms: u64) -> Result<()> {
        self.page().map(|_| ())
    }

    async fn wait_selector(&self, selector: &str, _timeout_ms: u64) -> Result<()> {
        match self.eval_one(selector, Extractor::InnerHtml).await? {
            Some(_) => Ok(()),
            None => bail!("timeout waiting for {selector}"),
        }
    }

    async fn eval_all(&self, selector: &str, _extractor: Extractor) -> Result<Vec<String>> {
        let page = self.page()?;
        Ok(match selector {
            "script" => page.scripts.clone(),
            "pre" => page.pre_texts.clone(),
            _ => Vec::new(),
        })
    }

    async fn eval_one(&self, selector: &str, _extractor: Extractor) -> Result<Option<String>> {
        let page = self.page()?;
        Ok(match selector {
            "body" => Some(page.body_html.clone()),
            "#result" => page.result_html.clone(),
            _ => None,
        })
    }

    async fn get_html(&self) -> Result<String> {
        Ok(self.page()?.html.clone())
    }

    async fn get_inner_text(&self, selector: &str) -> Result<String> {
        let page = self.page()?;
        match selector {
            "body" => Ok(page.visible_text.clone()),
            _ => bail!("no element matches {selector:?}"),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.site.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Renderer handing out [`FakeContext`]s.
pub struct FakeRenderer {
    pub site: Arc<FakeSite>,
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        Ok(Box::new(self.site.context()))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.site.contexts_opened() - self.site.contexts_closed()
    }
}

/// Solver answering from a fixed URL → answer table.
#[derive(Default)]
pub struct ScriptedSolver {
    answers: HashMap<String, f64>,
    seen: Mutex<Vec<(String, MinedSignals)>>,
}

impl ScriptedSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, url: &str, answer: f64) -> Self {
        self.answers.insert(url.to_string(), answer);
        self
    }

    /// Every (url, signals) pair the solver was asked about.
    pub fn seen(&self) -> Vec<(String, MinedSignals)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnswerSolver for ScriptedSolver {
    async fn solve(&self, snapshot: &PageSnapshot, signals: &MinedSignals) -> Option<f64> {
        self.seen
            .lock()
            .unwrap()
            .push((snapshot.url.clone(), signals.clone()));
        self.answers.get(&snapshot.url).copied()
    }
}
