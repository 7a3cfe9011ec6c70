//! Cleanup pipeline for extracted article text.
//!
//! Each pass is a function `&str -> String` applied in sequence. Output is
//! plain Markdown prose suitable for evidence extraction: no images, no link
//! targets, no leftover layout tags, no share/subscribe chrome.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline on raw Markdown text.
pub(crate) fn run_pipeline(md: &str) -> String {
    let mut result = md.to_string();

    result = drop_images(&result);
    result = unlink(&result);
    result = strip_leftover_html(&result);
    result = drop_boilerplate_lines(&result);
    result = normalize_whitespace(&result);
    result = clean_blank_lines(&result);
    result = ensure_trailing_newline(&result);

    result
}

// ---------------------------------------------------------------------------
// Pass 1: Images
// ---------------------------------------------------------------------------

fn drop_images(md: &str) -> String {
    static IMAGE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("valid regex"));

    IMAGE_RE.replace_all(md, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 2: Links
// ---------------------------------------------------------------------------

/// Replace `[text](url)` with `text`. Source attribution is carried by the
/// evidence item, not by inline links.
fn unlink(md: &str) -> String {
    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid regex"));

    LINK_RE.replace_all(md, "$1").to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: Leftover HTML
// ---------------------------------------------------------------------------

/// Remove layout tags that survived conversion, keeping their text.
fn strip_leftover_html(md: &str) -> String {
    static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"</?(?:div|span|section|article|aside|header|footer|figure|figcaption|details|summary|time|picture|source)(?:\s[^>]*)?/?>",
        )
        .expect("valid regex")
    });

    let mut out = Vec::new();
    let mut in_code_block = false;

    for line in md.lines() {
        if line.trim_start().starts_with("```") {
            in_code_block = !in_code_block;
            out.push(line.to_string());
            continue;
        }
        if in_code_block {
            out.push(line.to_string());
        } else {
            out.push(HTML_TAG_RE.replace_all(line, "").to_string());
        }
    }

    out.join("\n")
}

// ---------------------------------------------------------------------------
// Pass 4: Boilerplate
// ---------------------------------------------------------------------------

/// Drop short standalone lines that are page chrome rather than content.
fn drop_boilerplate_lines(md: &str) -> String {
    static CHROME_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)^\s*(?:[*_]*)(?:advertisement|share(?: this)?(?: article)?|subscribe(?: now)?|sign up|sign in|log in|read more|related articles?|skip to (?:main )?content|cookie settings|accept cookies)(?:[*_]*)\s*$",
        )
        .expect("valid regex")
    });

    md.lines()
        .filter(|line| !CHROME_RE.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 5: Whitespace
// ---------------------------------------------------------------------------

fn normalize_whitespace(md: &str) -> String {
    md.lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 6: Blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of blank lines into a single blank line.
fn clean_blank_lines(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    MULTI_BLANK_RE
        .replace_all(md.trim_start_matches('\n'), "\n\n")
        .to_string()
}

// ---------------------------------------------------------------------------
// Pass 7: Trailing newline
// ---------------------------------------------------------------------------

fn ensure_trailing_newline(md: &str) -> String {
    let trimmed = md.trim_end_matches('\n');
    format!("{trimmed}\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
