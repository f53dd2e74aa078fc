//! Scoped file downloads.
//!
//! A download lands in a temporary file that is removed when the returned
//! [`DownloadedFile`] is dropped, whichever way the caller exits.

use super::http_client::HttpClient;
use anyhow::{bail, Context, Result};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::TempPath;

/// A downloaded resource held in a temporary file.
#[derive(Debug)]
pub struct DownloadedFile {
    path: TempPath,
    /// The `Content-Type` header, or `""`.
    pub content_type: String,
}

impl DownloadedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read up to `max_chars` characters of the file as lossy UTF-8.
    pub fn read_text(&self, max_chars: usize) -> Result<String> {
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        Ok(String::from_utf8_lossy(&bytes).chars().take(max_chars).collect())
    }
}

/// File suffix for a download, from its content type or else its URL.
pub fn infer_suffix(content_type: &str, url: &str) -> &'static str {
    const KNOWN: &[&str] = &["pdf", "json", "csv"];

    let ct = content_type.to_ascii_lowercase();
    if let Some(kind) = KNOWN.iter().find(|k| ct.contains(*k)) {
        return suffix_for(kind);
    }

    let path = url::Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_else(|_| url.to_ascii_lowercase());
    KNOWN
        .iter()
        .find(|k| path.ends_with(&format!(".{k}")))
        .map(|k| suffix_for(k))
        .unwrap_or("")
}

fn suffix_for(kind: &str) -> &'static str {
    match kind {
        "pdf" => ".pdf",
        "json" => ".json",
        "csv" => ".csv",
        _ => "",
    }
}

/// Fetch `url` into a temporary file.
///
/// Non-2xx responses are errors; nothing is written for them.
pub async fn download_file(
    client: &HttpClient,
    url: &str,
    timeout: Duration,
) -> Result<DownloadedFile> {
    let resp = client.get(url, timeout).await?;
    if !(200..300).contains(&resp.status) {
        bail!("download of {url} failed with status {}", resp.status);
    }

    let content_type = resp.content_type().to_string();
    let suffix = infer_suffix(&content_type, url);

    let mut file = tempfile::Builder::new()
        .prefix("quizchain-")
        .suffix(suffix)
        .tempfile()
        .context("failed to create temporary file")?;
    file.write_all(&resp.body)
        .context("failed to write download")?;
    file.flush()?;

    Ok(DownloadedFile {
        path: file.into_temp_path(),
        content_type,
    })
}
