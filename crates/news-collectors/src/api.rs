//! JSON news APIs mapped through a declarative field description.

use async_trait::async_trait;
use pulse_core::time::{from_unix_seconds, parse_timestamp};
use pulse_core::NewsItem;
use reqwest::Client;
use serde_json::Value;

use crate::collector::{
    fetch_text, strip_html, truncate_chars, CollectError, NewsCollector, SourceInfo,
};

const TITLE_FROM_CONTENT_CHARS: usize = 100;
const CONTENT_CHARS: usize = 500;

/// How the item URL is obtained from a record
#[derive(Debug, Clone)]
pub enum UrlField {
    None,
    /// Field already holds the full URL
    Field(String),
    /// Field value substituted into `template` at `{}`
    Template { field: String, template: String },
}

#[derive(Debug, Clone)]
pub struct ApiSource {
    pub info: SourceInfo,
    pub url: String,
    pub query: Vec<(String, String)>,
    /// JSON pointer to the array of records
    pub items_pointer: String,
    pub title_field: String,
    pub content_field: Option<String>,
    pub url_field: UrlField,
    pub time_field: Option<String>,
    pub max_items: usize,
}

pub struct ApiCollector {
    source: ApiSource,
    client: Client,
}

impl ApiCollector {
    pub fn new(source: ApiSource, client: Client) -> Self {
        Self { source, client }
    }
}

#[async_trait]
impl NewsCollector for ApiCollector {
    fn info(&self) -> &SourceInfo {
        &self.source.info
    }

    async fn collect(&self) -> Result<Vec<NewsItem>, CollectError> {
        let body = fetch_text(&self.client, &self.source.url, &self.source.query).await?;
        let payload: Value = serde_json::from_str(&body)
            .map_err(|e| CollectError::Parse(format!("{}: {}", self.source.info.id, e)))?;
        parse_records(&payload, &self.source)
    }
}

/// Map every record under `items_pointer`; malformed records are skipped.
pub fn parse_records(payload: &Value, source: &ApiSource) -> Result<Vec<NewsItem>, CollectError> {
    let records = payload
        .pointer(&source.items_pointer)
        .and_then(Value::as_array)
        .ok_or_else(|| {
            CollectError::Parse(format!(
                "{}: no record array at {}",
                source.info.id, source.items_pointer
            ))
        })?;

    let items = records
        .iter()
        .filter_map(|record| match parse_record(record, source) {
            Some(item) => Some(item),
            None => {
                tracing::debug!("{} record skipped: {}", source.info.id, record);
                None
            }
        })
        .take(source.max_items)
        .collect();
    Ok(items)
}

fn parse_record(record: &Value, source: &ApiSource) -> Option<NewsItem> {
    let content = source
        .content_field
        .as_deref()
        .and_then(|f| field_string(record, f))
        .map(|c| strip_html(&c))
        .unwrap_or_default();

    let title = field_string(record, &source.title_field)
        .map(|t| strip_html(&t))
        .filter(|t| !t.is_empty())
        .or_else(|| title_from_content(&content))?;

    let url = match &source.url_field {
        UrlField::None => None,
        UrlField::Field(field) => field_string(record, field),
        UrlField::Template { field, template } => {
            field_string(record, field).map(|v| template.replace("{}", &v))
        }
    };

    let zone = source.info.assumed_zone();
    let published_at = source
        .time_field
        .as_deref()
        .and_then(|f| record.get(f))
        .and_then(|v| match v {
            Value::Number(n) => n.as_i64().and_then(|secs| {
                if secs > 100_000_000_000 {
                    chrono::DateTime::from_timestamp_millis(secs)
                } else {
                    from_unix_seconds(secs)
                }
            }),
            Value::String(s) => parse_timestamp(s, zone),
            _ => None,
        });

    Some(
        source
            .info
            .item(title)
            .with_content(truncate_chars(&content, CONTENT_CHARS))
            .with_url(url)
            .with_published_at(published_at),
    )
}

/// Non-empty string form of a scalar field
fn field_string(record: &Value, field: &str) -> Option<String> {
    let value = match record.get(field)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!value.is_empty()).then_some(value)
}

/// Telegraph-style content leads with `【headline】`; otherwise use a prefix.
fn title_from_content(content: &str) -> Option<String> {
    if content.is_empty() {
        return None;
    }
    if let Some(start) = content.find('【') {
        let after = &content[start + '【'.len_utf8()..];
        if let Some(end) = after.find('】') {
            let headline = after[..end].trim();
            if !headline.is_empty() {
                return Some(headline.to_string());
            }
        }
    }
    Some(truncate_chars(content, TITLE_FROM_CONTENT_CHARS))
}
