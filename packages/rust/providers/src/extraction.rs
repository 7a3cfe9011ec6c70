//! Document extraction capability: full text for a batch of URLs.
//!
//! Results come back one per input URL, in input order, so a failing URL never
//! hides the others.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use newsroom_shared::{NewsroomError, Result};

use crate::http::{build_client, check_status, endpoint, is_ssrf_target};

/// Extracted plain text for one URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub url: String,
    pub text: String,
}

/// Given URLs, return full text per URL (or a per-URL failure).
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, urls: &[String]) -> Vec<Result<ExtractedDocument>>;
}

// ---------------------------------------------------------------------------
// Tavily extract
// ---------------------------------------------------------------------------

/// Tavily's batch extract endpoint.
pub struct TavilyExtractor {
    client: Client,
    api_key: String,
    base_url: String,
}

impl TavilyExtractor {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            api_key,
            base_url,
        })
    }

    async fn request(&self, urls: &[String]) -> std::result::Result<TavilyExtractResponse, String> {
        let response = self
            .client
            .post(endpoint(&self.base_url, "extract"))
            .bearer_auth(&self.api_key)
            .json(&TavilyExtractRequest { urls })
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| format!("bad response: {e}"))
    }
}

#[derive(Debug, Serialize)]
struct TavilyExtractRequest<'a> {
    urls: &'a [String],
}

#[derive(Debug, Deserialize)]
struct TavilyExtractResponse {
    #[serde(default)]
    results: Vec<TavilyExtracted>,
    #[serde(default)]
    failed_results: Vec<TavilyFailed>,
}

#[derive(Debug, Deserialize)]
struct TavilyExtracted {
    url: String,
    #[serde(default)]
    raw_content: String,
}

#[derive(Debug, Deserialize)]
struct TavilyFailed {
    url: String,
    #[serde(default)]
    error: String,
}

#[async_trait]
impl Extractor for TavilyExtractor {
    #[instrument(skip_all, fields(provider = "tavily", urls = urls.len()))]
    async fn extract(&self, urls: &[String]) -> Vec<Result<ExtractedDocument>> {
        if urls.is_empty() {
            return Vec::new();
        }

        let body = match self.request(urls).await {
            Ok(body) => body,
            Err(msg) => {
                warn!(error = %msg, "extract request failed");
                return urls
                    .iter()
                    .map(|u| Err(NewsroomError::extraction(u, msg.clone())))
                    .collect();
            }
        };

        let mut results = body.results;
        let failed = body.failed_results;
        urls.iter()
            .map(|u| {
                if let Some(pos) = results.iter().position(|r| &r.url == u) {
                    let r = results.swap_remove(pos);
                    if r.raw_content.trim().is_empty() {
                        return Err(NewsroomError::extraction(u, "empty content"));
                    }
                    return Ok(ExtractedDocument {
                        url: r.url,
                        text: r.raw_content,
                    });
                }
                let reason = failed
                    .iter()
                    .find(|f| &f.url == u)
                    .map(|f| f.error.clone())
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| "not returned by provider".into());
                Err(NewsroomError::extraction(u, reason))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Direct HTTP fetch + local extraction
// ---------------------------------------------------------------------------

/// Fetches each page itself and extracts the article with `newsroom-markdown`.
pub struct HttpExtractor {
    client: Client,
    allow_private: bool,
}

impl HttpExtractor {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            allow_private: false,
        })
    }

    /// Allow loopback/private hosts (local testing only).
    pub fn allow_private(mut self, allow: bool) -> Self {
        self.allow_private = allow;
        self
    }

    async fn fetch_one(&self, raw: &str) -> Result<ExtractedDocument> {
        let url = Url::parse(raw).map_err(|e| NewsroomError::extraction(raw, e.to_string()))?;
        if !self.allow_private && is_ssrf_target(&url) {
            return Err(NewsroomError::extraction(raw, "refusing non-public address"));
        }

        debug!(%url, "fetching page");
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| NewsroomError::extraction(raw, e.to_string()))?;
        let response = check_status(response)
            .await
            .map_err(|msg| NewsroomError::extraction(raw, msg))?;

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_none_or(|ct| ct.contains("html"));
        if !is_html {
            return Err(NewsroomError::extraction(raw, "not an HTML page"));
        }

        let html = response
            .text()
            .await
            .map_err(|e| NewsroomError::extraction(raw, format!("body read failed: {e}")))?;
        let article = newsroom_markdown::extract_article(&html, raw)?;
        if article.word_count == 0 {
            return Err(NewsroomError::extraction(raw, "no readable text"));
        }

        Ok(ExtractedDocument {
            url: raw.to_string(),
            text: article.text,
        })
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    #[instrument(skip_all, fields(provider = "http", urls = urls.len()))]
    async fn extract(&self, urls: &[String]) -> Vec<Result<ExtractedDocument>> {
        join_all(urls.iter().map(|u| self.fetch_one(u))).await
    }
}
