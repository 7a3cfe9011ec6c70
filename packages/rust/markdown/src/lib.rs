//! HTML-to-Markdown extraction and article text utilities.
//!
//! [`extract_article`] turns a fetched web page into clean Markdown prose for
//! the research loop. The [`text`] helpers (heading outline, word count,
//! long-dash lint, slugs) are used by the drafting and planning stages.

mod cleanup;
pub mod text;

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, instrument};

use newsroom_shared::{NewsroomError, Result};

pub use text::{
    LONG_DASHES, count_words, heading_outline, long_dash_paragraphs, same_outline, slugify,
    truncate_chars,
};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Result of extracting an article from an HTML page.
#[derive(Debug, Clone)]
pub struct ExtractedArticle {
    /// Cleaned Markdown body.
    pub text: String,
    /// `<title>`, first H1, or "Untitled".
    pub title: String,
    pub word_count: usize,
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract the readable article from a full HTML document.
///
/// Picks the most specific content container, converts it with `htmd`
/// (dropping scripts, navigation and media) and runs the cleanup passes.
#[instrument(skip(html), fields(url = %source_url))]
pub fn extract_article(html: &str, source_url: &str) -> Result<ExtractedArticle> {
    let doc = Html::parse_document(html);
    let content_html = content_container(&doc).unwrap_or_else(|| html.to_string());

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec![
            "script", "style", "nav", "iframe", "noscript", "svg", "form", "button", "video",
            "audio", "header", "footer", "aside",
        ])
        .build();

    let raw_markdown = converter
        .convert(&content_html)
        .map_err(|e| NewsroomError::Conversion(format!("htmd conversion failed: {e}")))?;

    debug!(raw_len = raw_markdown.len(), "htmd conversion complete");

    let text = cleanup::run_pipeline(&raw_markdown);
    let title = document_title(&doc)
        .or_else(|| first_h1(&text))
        .unwrap_or_else(|| "Untitled".to_string());
    let word_count = count_words(&text);

    debug!(title = %title, word_count, "extraction complete");

    Ok(ExtractedArticle {
        text,
        title,
        word_count,
    })
}

/// Plain text of an HTML fragment, e.g. a search snippet with highlight spans.
pub fn strip_tags(fragment: &str) -> String {
    let doc = Html::parse_fragment(fragment);
    doc.root_element()
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Inner HTML of the first matching content container, most specific first.
fn content_container(doc: &Html) -> Option<String> {
    const SELECTORS: [&str; 8] = [
        "article [itemprop=\"articleBody\"]",
        ".article-body",
        ".entry-content",
        ".post-content",
        "article",
        "[role=\"main\"]",
        "main",
        "body",
    ];

    SELECTORS.iter().find_map(|sel| {
        let selector = Selector::parse(sel).ok()?;
        doc.select(&selector).next().map(|el| el.inner_html())
    })
}

fn document_title(doc: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    doc.select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

fn first_h1(md: &str) -> Option<String> {
    static H1_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^# (.+)$").expect("valid regex"));

    H1_RE.captures(md).map(|c| c[1].trim().to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
