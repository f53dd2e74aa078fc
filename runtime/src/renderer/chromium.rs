//! Chromium-based renderer using chromiumoxide.

use super::{element_query_js, Extractor, NavigationResult, RenderContext, Renderer};
use crate::config::Config;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Interval between DOM polls while waiting for idle or a selector.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Evaluates to the document ready state and the number of fetched resources.
const IDLE_PROBE_JS: &str = "(() => ({ ready: document.readyState === 'complete', \
                             resources: performance.getEntriesByType('resource').length }))()";

#[derive(Debug, Deserialize)]
struct IdleProbe {
    ready: bool,
    resources: u64,
}

/// Find the Chromium binary path.
///
/// `explicit` is the configured path; the process environment is not read
/// here.
pub fn find_chromium(explicit: Option<&Path>) -> Option<PathBuf> {
    // 1. Configured path
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.to_path_buf());
        }
    }

    // 2. ~/.quizchain/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".quizchain/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".quizchain/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".quizchain/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".quizchain/chromium/chrome-linux64/chrome"),
                home.join(".quizchain/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Browser,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a headless Chromium instance configured with the runtime's user agent.
    pub async fn new(config: &Config) -> Result<Self> {
        let chrome_path = find_chromium(config.chromium_path.as_deref())
            .context("Chromium not found. Set QUIZCHAIN_CHROMIUM_PATH.")?;

        let browser_config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg(format!("--user-agent={}", config.user_agent))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("failed to launch Chromium")?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self {
            browser,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        // Browser is dropped when ChromiumRenderer is dropped
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumContext {
    async fn evaluate<T: serde::de::DeserializeOwned>(&self, script: &str) -> Result<T> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result =
            tokio::time::timeout(Duration::from_millis(timeout_ms), self.page.goto(url)).await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(_)) => {
                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    async fn wait_idle(&self, timeout_ms: u64) -> Result<()> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut last_resources = None;

        loop {
            let probe: IdleProbe = self.evaluate(IDLE_PROBE_JS).await?;
            if probe.ready && last_resources == Some(probe.resources) {
                return Ok(());
            }
            last_resources = Some(probe.resources);

            if Instant::now() >= deadline {
                bail!("network did not go idle within {timeout_ms}ms");
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_selector(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let probe = element_query_js(selector, Extractor::TextContent, false);

        loop {
            let found: Option<String> = self.evaluate(&probe).await?;
            if found.is_some() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                bail!("selector {selector:?} not found within {timeout_ms}ms");
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn eval_all(&self, selector: &str, extractor: Extractor) -> Result<Vec<String>> {
        self.evaluate(&element_query_js(selector, extractor, true))
            .await
    }

    async fn eval_one(&self, selector: &str, extractor: Extractor) -> Result<Option<String>> {
        self.evaluate(&element_query_js(selector, extractor, false))
            .await
    }

    async fn get_html(&self) -> Result<String> {
        self.evaluate("document.documentElement.outerHTML")
            .await
            .context("failed to get HTML")
    }

    async fn get_inner_text(&self, selector: &str) -> Result<String> {
        self.eval_one(selector, Extractor::InnerText)
            .await?
            .with_context(|| format!("no element matches {selector:?}"))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        let _ = self.page.close().await;
        Ok(())
    }
}
