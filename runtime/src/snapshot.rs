//! Content extraction from a rendered page.
//!
//! Each surface is read independently through [`best_effort`]; a failed read
//! yields an empty value and never aborts the step.

use crate::renderer::{best_effort, Extractor, RenderContext};
use serde::Serialize;

/// Immutable capture of one visited page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageSnapshot {
    /// URL the page was navigated to.
    pub url: String,
    /// Full document HTML.
    pub html: String,
    /// Rendered text of `<body>`.
    pub visible_text: String,
    /// `textContent` of every `<script>`, in document order.
    pub scripts: Vec<String>,
    /// Inner HTML of the result region.
    pub result_html: String,
    /// Inner HTML of `<body>`.
    pub body_html: String,
    /// Rendered text of every `<pre>`, in document order.
    pub pre_texts: Vec<String>,
}

impl PageSnapshot {
    /// The single-string surfaces, in the order signal mining scans them.
    pub fn text_surfaces(&self) -> [&str; 4] {
        [
            &self.html,
            &self.visible_text,
            &self.result_html,
            &self.body_html,
        ]
    }
}

/// Collect every content surface from a page that has already been navigated.
pub async fn capture(ctx: &dyn RenderContext, url: &str, result_selector: &str) -> PageSnapshot {
    let html = best_effort("html", ctx.get_html()).await;
    let visible_text = best_effort("visible_text", ctx.get_inner_text("body")).await;
    let scripts = best_effort("scripts", ctx.eval_all("script", Extractor::TextContent)).await;
    let result_html: Option<String> = best_effort(
        "result_html",
        ctx.eval_one(result_selector, Extractor::InnerHtml),
    )
    .await;
    let body_html: Option<String> =
        best_effort("body_html", ctx.eval_one("body", Extractor::InnerHtml)).await;
    let pre_texts = best_effort("pre_texts", ctx.eval_all("pre", Extractor::InnerText)).await;

    PageSnapshot {
        url: url.to_string(),
        html,
        visible_text,
        scripts,
        result_html: result_html.unwrap_or_default(),
        body_html: body_html.unwrap_or_default(),
        pre_texts,
    }
}
