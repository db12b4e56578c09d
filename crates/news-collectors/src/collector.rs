use async_trait::async_trait;
use pulse_core::time::AssumedZone;
use pulse_core::{NewsItem, SourceType};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::browser::{BrowserError, SharedBrowser};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),
}

/// Stable identity of a news source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    /// Stable identifier used in logs and diagnostics
    pub id: String,
    /// Display name stored on every item
    pub name: String,
    pub source_type: SourceType,
    pub language: String,
}

impl SourceInfo {
    pub fn new(id: &str, name: &str, source_type: SourceType, language: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            source_type,
            language: language.to_string(),
        }
    }

    /// Zone naive timestamps from this source are expressed in.
    pub fn assumed_zone(&self) -> AssumedZone {
        match self.source_type {
            SourceType::Domestic => AssumedZone::Business,
            SourceType::International => AssumedZone::Utc,
        }
    }

    pub fn item(&self, title: impl Into<String>) -> NewsItem {
        NewsItem::new(title, self.name.clone(), self.source_type, self.language.clone())
    }
}

/// A source fetched over plain HTTP. Runs concurrently with its peers.
#[async_trait]
pub trait NewsCollector: Send + Sync {
    fn info(&self) -> &SourceInfo;

    async fn collect(&self) -> Result<Vec<NewsItem>, CollectError>;

    /// Never fails: errors are logged and the source contributes nothing.
    async fn safe_collect(&self) -> Vec<NewsItem> {
        let info = self.info();
        match self.collect().await {
            Ok(items) => {
                tracing::info!("{} collected {} items", info.id, items.len());
                items
            }
            Err(e) => {
                tracing::warn!("{} collection failed: {}", info.id, e);
                Vec::new()
            }
        }
    }
}

/// A source that needs a rendered page. Runs after the HTTP batch, one at a
/// time, on the shared browser.
#[async_trait]
pub trait RenderedCollector: Send + Sync {
    fn info(&self) -> &SourceInfo;

    async fn collect(&self, browser: &SharedBrowser) -> Result<Vec<NewsItem>, CollectError>;

    async fn safe_collect(&self, browser: &SharedBrowser) -> Vec<NewsItem> {
        let info = self.info();
        match self.collect(browser).await {
            Ok(items) => {
                tracing::info!("{} collected {} items", info.id, items.len());
                items
            }
            Err(e) => {
                tracing::warn!("{} collection failed: {}", info.id, e);
                Vec::new()
            }
        }
    }
}

/// HTTP client shared by the feed and API collectors.
pub fn build_http_client(timeout: Duration) -> Result<Client, CollectError> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?)
}

/// Fetch a URL and return its body, treating non-2xx as an error.
pub(crate) async fn fetch_text(
    client: &Client,
    url: &str,
    query: &[(String, String)],
) -> Result<String, CollectError> {
    let response = client.get(url).query(query).send().await?;
    if !response.status().is_success() {
        return Err(CollectError::Status {
            status: response.status().as_u16(),
            url: url.to_string(),
        });
    }
    Ok(response.text().await?)
}

/// Truncate to at most `max` characters (not bytes).
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Remove markup tags, decode entities and collapse whitespace.
pub(crate) fn strip_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    html_escape::decode_html_entities(&out)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
