//! Candidate curation: deterministic prefilter plus validated model selection.

use std::collections::HashSet;

use tracing::{debug, warn};
use url::Url;

use newsroom_providers::SearchHit;

use crate::contracts::UrlSelection;

/// Hosts that rarely carry extractable article text.
const LOW_SIGNAL_HOSTS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "vimeo.com",
    "tiktok.com",
    "facebook.com",
    "instagram.com",
    "twitter.com",
    "x.com",
    "pinterest.com",
    "reddit.com",
    "quora.com",
    "linkedin.com",
    "flickr.com",
    "imgur.com",
    "gettyimages.com",
    "shutterstock.com",
    "soundcloud.com",
    "spotify.com",
    "podcasts.apple.com",
    "news.google.com",
    "msn.com",
];

/// Path extensions for non-text media.
const MEDIA_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".mp3", ".mp4", ".mov", ".webm", ".zip",
];

/// True when the URL points at an aggregator, social site or media file.
pub fn is_low_signal(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return true;
    };
    let host = host.trim_start_matches("www.").trim_start_matches("m.");
    if LOW_SIGNAL_HOSTS
        .iter()
        .any(|h| host == *h || host.ends_with(&format!(".{h}")))
    {
        return true;
    }
    let path = url.path().to_ascii_lowercase();
    path.contains("/podcast") || MEDIA_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Drop unparseable, already-extracted, duplicate and low-signal candidates.
///
/// Keeps first-seen order.
pub fn prefilter(hits: Vec<SearchHit>, already_extracted: &HashSet<String>) -> Vec<SearchHit> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(hits.len());

    for hit in hits {
        let Ok(url) = Url::parse(&hit.url) else {
            debug!(url = %hit.url, "dropping unparseable candidate");
            continue;
        };
        if already_extracted.contains(&hit.url) || !seen.insert(hit.url.clone()) {
            continue;
        }
        if is_low_signal(&url) {
            debug!(url = %hit.url, "dropping low-signal candidate");
            continue;
        }
        kept.push(hit);
    }
    kept
}

/// Apply a model selection to the candidates.
///
/// URLs not among the candidates are discarded. Falls back to the top
/// candidates when nothing valid remains.
pub fn apply_selection(
    selection: &UrlSelection,
    candidates: &[SearchHit],
    max_curated: usize,
) -> Vec<SearchHit> {
    let mut chosen: Vec<SearchHit> = Vec::new();
    for url in &selection.urls {
        let url = url.trim();
        match candidates.iter().find(|c| c.url == url) {
            Some(hit) if !chosen.iter().any(|c| c.url == hit.url) => chosen.push(hit.clone()),
            Some(_) => {}
            None => warn!(%url, "selection named a URL that was not a candidate"),
        }
        if chosen.len() == max_curated {
            break;
        }
    }

    if chosen.is_empty() {
        return fallback(candidates, max_curated);
    }
    chosen
}

/// The first `max_curated` candidates.
pub fn fallback(candidates: &[SearchHit], max_curated: usize) -> Vec<SearchHit> {
    candidates.iter().take(max_curated).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(url: &str) -> SearchHit {
        SearchHit {
            url: url.into(),
            title: "t".into(),
            snippet: "s".into(),
        }
    }

    #[test]
    fn prefilter_drops_seen_duplicate_and_media() {
        let seen = HashSet::from(["https://old.test/a".to_string()]);
        let kept = prefilter(
            vec![
                hit("https://old.test/a"),
                hit("https://www.nature.com/x"),
                hit("https://www.nature.com/x"),
                hit("https://www.youtube.com/watch?v=1"),
                hit("https://cdn.test/photo.JPG"),
                hit("https://radio.test/podcasts/ep1"),
                hit("not a url"),
                hit("https://noaa.gov/vents"),
            ],
            &seen,
        );
        let urls: Vec<&str> = kept.iter().map(|h| h.url.as_str()).collect();
        assert_eq!(urls, vec!["https://www.nature.com/x", "https://noaa.gov/vents"]);
    }

    #[test]
    fn selection_ignores_invented_urls_and_truncates() {
        let candidates = vec![hit("https://a.test"), hit("https://b.test"), hit("https://c.test")];
        let selection = UrlSelection {
            urls: vec![
                "https://made-up.test".into(),
                "https://c.test".into(),
                "https://a.test".into(),
                "https://b.test".into(),
            ],
            reasoning: String::new(),
        };
        let chosen = apply_selection(&selection, &candidates, 2);
        let urls: Vec<&str> = chosen.iter().map(|h| h.url.as_str()).collect();
        assert_eq!(urls, vec!["https://c.test", "https://a.test"]);
    }

    #[test]
    fn empty_selection_falls_back_to_top_candidates() {
        let candidates = vec![hit("https://a.test"), hit("https://b.test")];
        let selection = UrlSelection {
            urls: vec!["https://nope.test".into()],
            reasoning: String::new(),
        };
        assert_eq!(apply_selection(&selection, &candidates, 1), vec![hit("https://a.test")]);
    }
}
