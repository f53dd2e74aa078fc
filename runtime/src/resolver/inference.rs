//! Client for the external numeric-answer inference service.
//!
//! Speaks the OpenAI-compatible `/responses` API: `{model, input}` in,
//! free-form text out.

use crate::config::LlmConfig;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

/// Something that turns a prompt into free-form text.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn infer(&self, prompt: &str, model: &str) -> Result<String>;
}

/// `/responses` API client.
pub struct ResponsesClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ResponsesClient {
    pub fn new(config: &LlmConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            token: config.token.clone(),
        })
    }

    /// Resolve the responses endpoint from the base URL.
    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/responses") {
            base.to_string()
        } else {
            format!("{base}/responses")
        }
    }
}

#[async_trait]
impl InferenceClient for ResponsesClient {
    async fn infer(&self, prompt: &str, model: &str) -> Result<String> {
        let Some(token) = &self.token else {
            bail!("no inference token configured");
        };

        let body = serde_json::json!({
            "model": model,
            "input": prompt,
        });

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .context("inference request failed")?
            .error_for_status()
            .context("inference service returned an error")?;

        let json: serde_json::Value = resp
            .json()
            .await
            .context("Failed to parse inference JSON")?;

        Ok(output_text(&json))
    }
}

/// Text of a `/responses` payload: `output_text`, else every
/// `output[].content[].text` joined.
pub fn output_text(json: &serde_json::Value) -> String {
    if let Some(text) = json.get("output_text").and_then(|v| v.as_str()) {
        return text.trim().to_string();
    }

    let parts: Vec<&str> = json
        .get("output")
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
        .filter_map(|item| item.get("content").and_then(|c| c.as_array()))
        .flatten()
        .filter_map(|c| c.get("text").and_then(|t| t.as_str()))
        .collect();
    parts.join("\n").trim().to_string()
}

/// The first numeric token in `text`, if it is finite.
pub fn first_number(text: &str) -> Option<f64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"[-+]?\d*\.?\d+(?:[eE][-+]?\d+)?").expect("valid regex")
    });
    re.find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}
