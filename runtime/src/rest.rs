// Copyright 2026 Quizchain Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP API for Quizchain.
//!
//! `POST /api/solve` runs one chain on its own browser context and returns
//! the full trace. `GET /` and `GET /health` carry no logic.

use crate::chain::{ChainRequest, ChainRunner};
use crate::config::{mask_secret, Config};
use crate::error::ApiError;
use crate::renderer::Renderer;
use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::FutureExt;
use serde::Deserialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const INDEX_HTML: &str = "<h3>Quizchain</h3><p>POST <code>{email, secret, url}</code> to \
                          <code>/api/solve</code></p>";

/// State shared by every request.
pub struct AppState {
    pub config: Arc<Config>,
    pub renderer: Arc<dyn Renderer>,
    pub runner: Arc<ChainRunner>,
    /// Bounds simultaneous chains; each holds a browser context.
    permits: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: Arc<Config>, renderer: Arc<dyn Renderer>, runner: Arc<ChainRunner>) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_runs.max(1)));
        Self {
            config,
            renderer,
            runner,
            permits,
        }
    }
}

/// Body of a solve request.
#[derive(Debug, Clone, Deserialize)]
pub struct SolveRequest {
    pub email: String,
    pub secret: String,
    pub url: String,
}

/// Build the axum Router with all endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/solve", post(solve))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API on `addr` until Ctrl-C.
pub async fn start(addr: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("received shutdown signal");
        })
        .await?;
    Ok(())
}

// ── Handlers ────────────────────────────────────────────────────

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> &'static str {
    "ok"
}

async fn solve(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SolveRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;

    info!(
        email = %req.email,
        secret = %mask_secret(&req.secret),
        url = %req.url,
        "incoming solve request"
    );

    if state.config.secret.as_deref() != Some(req.secret.as_str()) {
        return Err(ApiError::Unauthorized);
    }

    let _permit = Arc::clone(&state.permits)
        .acquire_owned()
        .await
        .context("run limiter closed")?;

    let mut ctx = state
        .renderer
        .new_context()
        .await
        .context("failed to open browser context")?;

    let runner = Arc::clone(&state.runner);
    let request = ChainRequest {
        email: req.email,
        secret: req.secret,
        url: req.url,
    };

    // The context is closed even when the run panics; the panic becomes a 500.
    let report = tokio::task::spawn(async move {
        let run = AssertUnwindSafe(runner.run(ctx.as_mut(), &request))
            .catch_unwind()
            .await;
        if let Err(e) = ctx.close().await {
            warn!(error = %e, "failed to close browser context");
        }
        run.map_err(|_| anyhow::anyhow!("chain run panicked"))
    })
    .await
    .context("chain task failed")??;

    Ok(Json(serde_json::json!({ "ok": true, "result": report })))
}
