//! arXiv search over the public Atom API.
//!
//! Results are fetched in pages of at most [`PAGE_SIZE`] with a pause between
//! pages, which is what the API's terms of use ask for.

use crate::error::{MonitorError, Result};
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// arXiv query endpoint
pub const DEFAULT_ARXIV_URL: &str = "http://export.arxiv.org/api/query";

/// Largest page requested from the API
pub const PAGE_SIZE: usize = 100;

/// Sort criterion, always applied in descending order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    Relevance,
    Updated,
    #[default]
    Submitted,
}

impl SortBy {
    /// Lenient parse: unknown values warn and fall back to relevance.
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            warn!("Invalid sort_by value '{}'. Defaulting to 'relevance'.", value);
            SortBy::Relevance
        })
    }

    fn api_value(self) -> &'static str {
        match self {
            SortBy::Relevance => "relevance",
            SortBy::Updated => "lastUpdatedDate",
            SortBy::Submitted => "submittedDate",
        }
    }
}

impl FromStr for SortBy {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "relevance" => Ok(SortBy::Relevance),
            "updated" | "last_updated_date" => Ok(SortBy::Updated),
            "submitted" | "submitted_date" => Ok(SortBy::Submitted),
            other => Err(MonitorError::Validation(format!(
                "Invalid sort '{}'. Use relevance, updated or submitted",
                other
            ))),
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortBy::Relevance => "relevance",
            SortBy::Updated => "updated",
            SortBy::Submitted => "submitted",
        };
        f.write_str(name)
    }
}

/// A paper from the search results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paper {
    pub title: String,
    pub authors: Vec<String>,
    pub summary: String,
    pub published: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Abstract page, e.g. `http://arxiv.org/abs/1706.03762v7`
    pub abs_url: String,
    pub pdf_url: String,
    pub categories: Vec<String>,
}

impl Paper {
    /// Publication time as printed in reports
    pub fn published_display(&self) -> String {
        self.published.format("%Y-%m-%d %H:%M:%S+00:00").to_string()
    }
}

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: String,
    title: String,
    #[serde(default)]
    summary: String,
    published: DateTime<Utc>,
    updated: DateTime<Utc>,
    #[serde(rename = "author", default)]
    authors: Vec<Author>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
    #[serde(rename = "category", default)]
    categories: Vec<Category>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@title")]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Category {
    #[serde(rename = "@term")]
    term: String,
}

/// Collapse runs of whitespace (titles and abstracts wrap across lines).
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl From<Entry> for Paper {
    fn from(entry: Entry) -> Self {
        let pdf_url = entry
            .links
            .iter()
            .find(|l| l.title.as_deref() == Some("pdf"))
            .map(|l| l.href.clone())
            .unwrap_or_else(|| entry.id.replace("/abs/", "/pdf/"));

        Paper {
            title: normalize_whitespace(&entry.title),
            authors: entry.authors.into_iter().map(|a| a.name).collect(),
            summary: normalize_whitespace(&entry.summary),
            published: entry.published,
            updated: entry.updated,
            abs_url: entry.id,
            pdf_url,
            categories: entry.categories.into_iter().map(|c| c.term).collect(),
        }
    }
}

/// Parse an Atom response. The API reports query errors as a single
/// entry whose id points at its error documentation.
fn parse_feed(xml: &str) -> Result<Vec<Paper>> {
    let feed: Feed = from_str(xml)?;

    if let Some(error) = feed.entries.iter().find(|e| e.id.contains("/api/errors")) {
        return Err(MonitorError::Api {
            code: 400,
            message: format!("arXiv query error: {}", normalize_whitespace(&error.summary)),
        });
    }

    Ok(feed.entries.into_iter().map(Paper::from).collect())
}

/// Client settings
#[derive(Debug, Clone)]
pub struct ArxivOptions {
    pub base_url: String,
    /// Pause between pages and between retries
    pub page_delay: Duration,
    /// Attempts per page
    pub max_attempts: u32,
}

impl Default for ArxivOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ARXIV_URL.to_string(),
            page_delay: Duration::from_secs(3),
            max_attempts: 3,
        }
    }
}

/// Client for the arXiv query API
pub struct ArxivClient {
    client: reqwest::Client,
    options: ArxivOptions,
}

impl ArxivClient {
    pub fn new(options: ArxivOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MonitorError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, options })
    }

    fn page_url(&self, query: &str, sort_by: SortBy, start: usize, size: usize) -> Result<Url> {
        let start = start.to_string();
        let size = size.to_string();
        Url::parse_with_params(
            &self.options.base_url,
            &[
                ("search_query", query),
                ("start", start.as_str()),
                ("max_results", size.as_str()),
                ("sortBy", sort_by.api_value()),
                ("sortOrder", "descending"),
            ],
        )
        .map_err(|e| MonitorError::Config(format!("Invalid arXiv URL: {}", e)))
    }

    async fn fetch_page(&self, url: &Url) -> Result<Vec<Paper>> {
        debug!(url = %url, "Fetching arXiv page");
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::Api {
                code: status.as_u16() as i32,
                message: format!("arXiv error: {}", status),
            });
        }
        let body = response.text().await?;
        parse_feed(&body)
    }

    async fn fetch_page_with_retries(&self, url: &Url) -> Result<Vec<Paper>> {
        let mut attempt = 1;
        loop {
            match self.fetch_page(url).await {
                Ok(papers) => return Ok(papers),
                Err(e) if attempt < self.options.max_attempts => {
                    warn!(attempt, error = %e, "arXiv request failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.options.page_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Search arXiv, returning at most `max_results` papers.
    pub async fn search(
        &self,
        query: &str,
        max_results: usize,
        sort_by: SortBy,
    ) -> Result<Vec<Paper>> {
        info!(query, max_results, sort = %sort_by, "Searching arXiv");

        let mut papers = Vec::new();
        while papers.len() < max_results {
            if !papers.is_empty() {
                tokio::time::sleep(self.options.page_delay).await;
            }

            let size = (max_results - papers.len()).min(PAGE_SIZE);
            let url = self.page_url(query, sort_by, papers.len(), size)?;
            let page = self.fetch_page_with_retries(&url).await?;
            let exhausted = page.len() < size;
            papers.extend(page);

            if exhausted {
                break;
            }
        }

        papers.truncate(max_results);
        info!(count = papers.len(), "arXiv search complete");
        Ok(papers)
    }
}
