//! Text checks over article Markdown: heading outline, word count, long-dash
//! lint, slugs, and safe truncation.

use std::sync::LazyLock;

use regex::Regex;

/// Level-2 (`## `) section headings, in order. Lines inside code fences are ignored.
pub fn heading_outline(md: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut in_code_block = false;

    for line in md.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("## ") {
            out.push(rest.trim().to_string());
        }
    }

    out
}

/// True when both bodies have the same number of section headings in the same order.
///
/// Heading text is compared case-insensitively with surrounding punctuation
/// ignored, so a copy edit may retitle casing without counting as a
/// structural change.
pub fn same_outline(before: &str, after: &str) -> bool {
    let a = heading_outline(before);
    let b = heading_outline(after);
    a.len() == b.len() && a.iter().zip(&b).all(|(x, y)| heading_key(x) == heading_key(y))
}

fn heading_key(heading: &str) -> String {
    heading
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Count prose words, ignoring link targets, heading markers and list bullets.
pub fn count_words(md: &str) -> usize {
    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("valid regex"));
    static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#+").expect("valid regex"));
    static BULLET_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[-*]\s").expect("valid regex"));
    static SYMBOL_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));

    let text = LINK_RE.replace_all(md, "$1");
    let text = HEADING_RE.replace_all(&text, "");
    let text = BULLET_RE.replace_all(&text, "");
    let text = SYMBOL_RE.replace_all(&text, "");
    text.split_whitespace().count()
}

/// Characters treated as long dashes used for punctuation.
pub const LONG_DASHES: [char; 2] = ['\u{2014}', '\u{2015}'];

/// 1-based indices of prose paragraphs that contain a long dash.
///
/// Headings and code fences are skipped; spaced en dashes (` – `) count too.
pub fn long_dash_paragraphs(md: &str) -> Vec<usize> {
    let mut hits = Vec::new();
    let mut paragraph = 0;
    let mut in_code_block = false;

    for block in md.split("\n\n") {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }
        if block.starts_with("```") {
            in_code_block = !(block.ends_with("```") && block.len() > 3);
            continue;
        }
        if in_code_block {
            if block.ends_with("```") {
                in_code_block = false;
            }
            continue;
        }
        if block.starts_with('#') {
            continue;
        }
        paragraph += 1;
        if block.contains(LONG_DASHES) || block.contains(" \u{2013} ") {
            hits.push(paragraph);
        }
    }

    hits
}

/// Filesystem-safe identifier from the first `max_words` words.
///
/// Lowercased, joined with `_`, and restricted to `[a-z0-9_]`.
pub fn slugify(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}

/// Truncate to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
