//! `quizchain solve <url>` — run one chain locally and print the trace.

use crate::chain::{ChainRequest, ChainRunner};
use crate::config::Config;
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::Renderer;
use anyhow::{Context, Result};

/// Run the solve command.
pub async fn run(config: &Config, url: &str, email: &str) -> Result<()> {
    let secret = config.require_secret()?.to_string();

    let renderer = ChromiumRenderer::new(config).await?;
    let runner = ChainRunner::from_config(config)?;

    let mut ctx = renderer
        .new_context()
        .await
        .context("failed to open browser context")?;
    let report = runner
        .run(
            ctx.as_mut(),
            &ChainRequest {
                email: email.to_string(),
                secret,
                url: url.to_string(),
            },
        )
        .await;
    ctx.close().await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
