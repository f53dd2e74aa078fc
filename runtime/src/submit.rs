//! Answer submission.

use crate::acquisition::http_client::HttpClient;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Body POSTed to a quiz's submission endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitPayload<'a> {
    pub email: &'a str,
    pub secret: &'a str,
    /// The quiz page the answer belongs to.
    pub url: &'a str,
    pub answer: f64,
}

/// A submission the endpoint answered, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub status: u16,
    /// Parsed JSON body, or `{"text": <raw body>}` when it is not JSON.
    pub body: Value,
}

/// Transport-level submission failure.
#[derive(thiserror::Error, Debug)]
#[error("submission to {url} failed: {message}")]
pub struct SubmitError {
    pub url: String,
    pub message: String,
}

/// Posts answers to quiz endpoints.
#[derive(Clone)]
pub struct SubmissionClient {
    http: HttpClient,
    timeout: Duration,
}

impl SubmissionClient {
    pub fn new(http: HttpClient, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    /// Submit once. Only transport failures are errors.
    pub async fn submit(
        &self,
        submit_url: &str,
        payload: &SubmitPayload<'_>,
    ) -> Result<SubmitOutcome, SubmitError> {
        let resp = self
            .http
            .post_json(submit_url, payload, self.timeout)
            .await
            .map_err(|e| SubmitError {
                url: submit_url.to_string(),
                message: format!("{e:#}"),
            })?;

        let body = serde_json::from_slice::<Value>(&resp.body)
            .unwrap_or_else(|_| serde_json::json!({ "text": resp.text() }));

        Ok(SubmitOutcome {
            status: resp.status,
            body,
        })
    }
}

/// The next quiz URL named by a submission response: `url`, else `next_url`.
pub fn next_url_hint(body: &Value) -> Option<String> {
    ["url", "next_url"]
        .iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}
