//! Signal mining over page content.
//!
//! Pure functions that pull candidate submission URLs, download links and
//! obfuscated payloads out of text and HTML, plus [`mine`] which runs them
//! across every surface of a [`PageSnapshot`] and merges the results.

use crate::snapshot::PageSnapshot;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::{alphabet, Engine};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Standard alphabet, padding optional.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s'"<>]+"#).expect("valid regex"))
}

fn submit_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)https?://[^\s'"<>]*submit[^\s'"<>]*"#).expect("valid regex")
    })
}

fn atob_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)atob\((?:`([^`]*)`|"([^"]*)"|'([^']*)')\)"#).expect("valid regex")
    })
}

/// Insertion-ordered set of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedSet {
    items: Vec<String>,
    seen: HashSet<String>,
}

impl OrderedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `item` unless already present. Returns whether it was new.
    pub fn insert(&mut self, item: String) -> bool {
        if self.seen.contains(&item) {
            return false;
        }
        self.seen.insert(item.clone());
        self.items.push(item);
        true
    }

    pub fn extend<I: IntoIterator<Item = String>>(&mut self, items: I) {
        for item in items {
            self.insert(item);
        }
    }

    pub fn contains(&self, item: &str) -> bool {
        self.seen.contains(item)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

}

impl Serialize for OrderedSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

/// Everything mined from one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MinedSignals {
    /// Absolute submission endpoint, if the page names one.
    pub submit_url: Option<String>,
    /// Every URL-shaped substring across all surfaces.
    pub downloads: OrderedSet,
    /// Decoded base64 payloads and preformatted blocks.
    pub decoded: OrderedSet,
}

/// Find the first URL containing "submit" (case-insensitive).
pub fn find_submit_url(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    if let Some(m) = submit_url_regex().find(text) {
        return Some(m.as_str().to_string());
    }
    url_regex()
        .find_iter(text)
        .map(|m| m.as_str())
        .find(|u| u.to_ascii_lowercase().contains("submit"))
        .map(str::to_string)
}

/// Every URL-shaped substring of `text`, in order of appearance.
pub fn find_urls(text: &str) -> Vec<String> {
    url_regex()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Decode every `atob(...)` string literal in `text`.
///
/// Whitespace inside the literal is stripped first; if that fails the raw
/// literal is tried. Undecodable literals are skipped.
pub fn decode_atob_payloads(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for caps in atob_regex().captures_iter(text) {
        let Some(literal) = caps.get(1).or(caps.get(2)).or(caps.get(3)) else {
            continue;
        };
        let raw = literal.as_str();
        if raw.is_empty() {
            continue;
        }
        let cleaned: String = raw.split_whitespace().collect();
        let decoded = BASE64
            .decode(cleaned.as_bytes())
            .or_else(|_| BASE64.decode(raw.as_bytes()));
        match decoded {
            Ok(bytes) => out.push(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) => tracing::debug!(error = %e, "skipping undecodable atob literal"),
        }
    }
    out
}

/// Normalise a preformatted block: compact JSON when it parses, else trimmed text.
///
/// Returns `None` for blank blocks.
pub fn normalize_pre_block(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<serde::de::IgnoredAny>(trimmed) {
        Ok(_) => Some(compact_json(trimmed)),
        Err(_) => Some(trimmed.to_string()),
    }
}

/// Strip insignificant whitespace from valid JSON text.
///
/// Number literals are copied verbatim, so integers wider than 64 bits and
/// long fractions survive unchanged.
fn compact_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;
    for c in json.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
            out.push(c);
        } else if !matches!(c, ' ' | '\t' | '\n' | '\r') {
            out.push(c);
        }
    }
    out
}

/// Resolve a possibly relative URL against the page it was found on.
pub fn absolutize(base: &str, candidate: &str) -> String {
    if candidate.starts_with("http://") || candidate.starts_with("https://") {
        return candidate.to_string();
    }
    url::Url::parse(base)
        .and_then(|b| b.join(candidate))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| candidate.to_string())
}

/// Run every miner across every surface of `snapshot`.
pub fn mine(snapshot: &PageSnapshot) -> MinedSignals {
    let submit_url = snapshot
        .text_surfaces()
        .into_iter()
        .find_map(find_submit_url)
        .map(|u| absolutize(&snapshot.url, &u));

    let mut downloads = OrderedSet::new();
    for surface in snapshot.text_surfaces() {
        downloads.extend(find_urls(surface));
    }
    for script in &snapshot.scripts {
        downloads.extend(find_urls(script));
    }

    let mut decoded = OrderedSet::new();
    let base64_sources = [snapshot.html.as_str(), snapshot.visible_text.as_str()]
        .into_iter()
        .chain(snapshot.scripts.iter().map(String::as_str))
        .chain([snapshot.result_html.as_str(), snapshot.body_html.as_str()]);
    for source in base64_sources {
        decoded.extend(
            decode_atob_payloads(source)
                .into_iter()
                .filter(|d| !d.is_empty()),
        );
    }
    decoded.extend(
        snapshot
            .pre_texts
            .iter()
            .filter_map(|t| normalize_pre_block(t)),
    );

    MinedSignals {
        submit_url,
        downloads,
        decoded,
    }
}

/// First URL in visible text then result HTML that looks like another quiz page.
///
/// Keyword sniffing over "quiz", "demo" and "submit"; a fallback when no
/// submission happened, not a guarantee.
pub fn find_fallback_next(visible_text: &str, result_html: &str) -> Option<String> {
    const KEYWORDS: &[&str] = &["quiz", "demo", "submit"];
    let haystack = format!("{visible_text}\n{result_html}");
    find_urls(&haystack)
        .into_iter()
        .find(|u| KEYWORDS.iter().any(|k| u.contains(k)))
}
