//! Document search capability: web search (Tavily) and encyclopedia lookup
//! (Wikipedia).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use newsroom_shared::{NewsroomError, Result};

use crate::http::{build_client, check_status, endpoint};

/// One ranked candidate document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

/// Given a query, return ranked candidates. May return fewer than requested.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Short provider name for logs and errors.
    fn name(&self) -> &str;

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;
}

// ---------------------------------------------------------------------------
// Tavily
// ---------------------------------------------------------------------------

/// Tavily web search.
pub struct TavilySearch {
    client: Client,
    api_key: String,
    base_url: String,
    max_results: usize,
}

impl TavilySearch {
    pub fn new(
        api_key: String,
        base_url: String,
        max_results: usize,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            api_key,
            base_url,
            max_results,
        })
    }
}

#[derive(Debug, Serialize)]
struct TavilySearchRequest<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
}

#[derive(Debug, Deserialize)]
struct TavilySearchResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

#[async_trait]
impl SearchProvider for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    #[instrument(skip(self), fields(provider = "tavily"))]
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let url = endpoint(&self.base_url, "search");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&TavilySearchRequest {
                query,
                max_results: self.max_results,
                search_depth: "advanced",
            })
            .send()
            .await
            .map_err(|e| NewsroomError::search(self.name(), e.to_string()))?;
        let response = check_status(response)
            .await
            .map_err(|msg| NewsroomError::search(self.name(), msg))?;

        let body: TavilySearchResponse = response
            .json()
            .await
            .map_err(|e| NewsroomError::search(self.name(), format!("bad response: {e}")))?;

        let hits: Vec<SearchHit> = body
            .results
            .into_iter()
            .take(self.max_results)
            .map(|r| SearchHit {
                url: r.url,
                title: r.title,
                snippet: r.content,
            })
            .collect();
        debug!(hits = hits.len(), "search complete");
        Ok(hits)
    }
}

// ---------------------------------------------------------------------------
// Wikipedia
// ---------------------------------------------------------------------------

/// MediaWiki full-text search. Titles become article URLs.
pub struct WikipediaSearch {
    client: Client,
    api_url: Url,
    limit: usize,
}

impl WikipediaSearch {
    pub fn new(api_url: &str, limit: usize, timeout: Duration) -> Result<Self> {
        let api_url = Url::parse(api_url)
            .map_err(|e| NewsroomError::config(format!("invalid wikipedia_url '{api_url}': {e}")))?;
        Ok(Self {
            client: build_client(timeout)?,
            api_url,
            limit,
        })
    }

    fn article_url(&self, title: &str) -> String {
        let mut page = self.api_url.clone();
        page.set_query(None);
        page.set_path(&format!("/wiki/{}", title.replace(' ', "_")));
        page.to_string()
    }
}

#[derive(Debug, Deserialize)]
struct WikiResponse {
    #[serde(default)]
    query: Option<WikiQuery>,
}

#[derive(Debug, Deserialize)]
struct WikiQuery {
    #[serde(default)]
    search: Vec<WikiHit>,
}

#[derive(Debug, Deserialize)]
struct WikiHit {
    title: String,
    #[serde(default)]
    snippet: String,
}

#[async_trait]
impl SearchProvider for WikipediaSearch {
    fn name(&self) -> &str {
        "wikipedia"
    }

    #[instrument(skip(self), fields(provider = "wikipedia"))]
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let limit = self.limit.to_string();
        let response = self
            .client
            .get(self.api_url.as_str())
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("format", "json"),
                ("utf8", "1"),
                ("srsearch", query),
                ("srlimit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| NewsroomError::search(self.name(), e.to_string()))?;
        let response = check_status(response)
            .await
            .map_err(|msg| NewsroomError::search(self.name(), msg))?;

        let body: WikiResponse = response
            .json()
            .await
            .map_err(|e| NewsroomError::search(self.name(), format!("bad response: {e}")))?;

        Ok(body
            .query
            .map(|q| q.search)
            .unwrap_or_default()
            .into_iter()
            .take(self.limit)
            .map(|hit| SearchHit {
                url: self.article_url(&hit.title),
                snippet: newsroom_markdown::strip_tags(&hit.snippet),
                title: hit.title,
            })
            .collect())
    }
}
