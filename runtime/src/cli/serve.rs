//! `quizchain serve` — run the HTTP API.

use crate::chain::ChainRunner;
use crate::config::Config;
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::{NoopRenderer, Renderer};
use crate::rest::{self, AppState};
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Launch the browser, then serve requests until Ctrl-C.
pub async fn run(config: Config, addr: SocketAddr) -> Result<()> {
    config.require_secret()?;

    info!("starting Quizchain v{}", env!("CARGO_PKG_VERSION"));

    let renderer: Arc<dyn Renderer> = match ChromiumRenderer::new(&config).await {
        Ok(renderer) => {
            info!("Chromium renderer initialized");
            Arc::new(renderer)
        }
        Err(e) => {
            warn!("Failed to initialize Chromium: {e:#}");
            warn!("Solve requests will fail until a browser is available");
            Arc::new(NoopRenderer)
        }
    };

    if config.llm.token.is_none() {
        warn!("no inference token configured; pages will not be answered");
    }

    let runner = Arc::new(ChainRunner::from_config(&config)?);
    let state = Arc::new(AppState::new(
        Arc::new(config),
        Arc::clone(&renderer),
        runner,
    ));

    let result = rest::start(addr, state).await;

    let _ = renderer.shutdown().await;
    info!("Quizchain stopped");

    result
}
