//! RSS 2.0 and Atom syndication feeds.

use async_trait::async_trait;
use pulse_core::time::parse_timestamp;
use pulse_core::NewsItem;
use reqwest::Client;
use roxmltree::{Document, Node, ParsingOptions};

use crate::collector::{
    fetch_text, strip_html, truncate_chars, CollectError, NewsCollector, SourceInfo,
};

const CONTENT_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct FeedSource {
    pub info: SourceInfo,
    pub url: String,
    pub max_items: usize,
}

impl FeedSource {
    pub fn new(info: SourceInfo, url: &str) -> Self {
        Self {
            info,
            url: url.to_string(),
            max_items: 30,
        }
    }
}

pub struct FeedCollector {
    source: FeedSource,
    client: Client,
}

impl FeedCollector {
    pub fn new(source: FeedSource, client: Client) -> Self {
        Self { source, client }
    }
}

#[async_trait]
impl NewsCollector for FeedCollector {
    fn info(&self) -> &SourceInfo {
        &self.source.info
    }

    async fn collect(&self) -> Result<Vec<NewsItem>, CollectError> {
        let body = fetch_text(&self.client, &self.source.url, &[]).await?;
        parse_feed(&body, &self.source.info, self.source.max_items)
    }
}

/// Parse an RSS or Atom document. Entries without a title are skipped.
pub fn parse_feed(
    xml: &str,
    info: &SourceInfo,
    max_items: usize,
) -> Result<Vec<NewsItem>, CollectError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(xml, options)
        .map_err(|e| CollectError::Parse(format!("{}: {}", info.id, e)))?;

    let zone = info.assumed_zone();
    let items = doc
        .descendants()
        .filter(|n| n.has_tag_name("item") || n.has_tag_name("entry"))
        .filter_map(|node| {
            let Some(title) = child_text_any(&node, &["title"]) else {
                tracing::debug!("{} entry without title skipped", info.id);
                return None;
            };
            let content = child_text_any(&node, &["description", "summary", "content"])
                .map(|c| truncate_chars(&strip_html(&c), CONTENT_CHARS))
                .unwrap_or_default();
            let published_at = child_text_any(&node, &["pubDate", "published", "updated", "date"])
                .and_then(|t| parse_timestamp(&t, zone));

            Some(
                info.item(strip_html(&title))
                    .with_content(content)
                    .with_url(child_link(&node))
                    .with_published_at(published_at),
            )
        })
        .take(max_items)
        .collect();

    Ok(items)
}

fn node_text(node: &Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect::<String>()
}

fn child_text_any(node: &Node<'_, '_>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        node.children()
            .filter(|c| c.is_element())
            .find(|c| c.tag_name().name().eq_ignore_ascii_case(name))
            .map(|c| node_text(&c).trim().to_string())
            .filter(|t| !t.is_empty())
    })
}

fn child_link(node: &Node<'_, '_>) -> Option<String> {
    node.children()
        .filter(|c| c.is_element() && c.tag_name().name().eq_ignore_ascii_case("link"))
        .find_map(|c| {
            let link = match c.attribute("href") {
                Some(href) => href.trim().to_string(),
                None => node_text(&c).trim().to_string(),
            };
            (!link.is_empty()).then_some(link)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pulse_core::SourceType;

    fn info(source_type: SourceType) -> SourceInfo {
        SourceInfo::new("test_feed", "Test Feed", source_type, "en")
    }

    #[test]
    fn test_parse_rss() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Business</title>
  <item>
    <title>Stocks rally as Fed signals pause</title>
    <link>https://news.test/a</link>
    <description><![CDATA[<p>Markets <b>rose</b> sharply.</p>]]></description>
    <pubDate>Tue, 04 Mar 2025 08:30:00 GMT</pubDate>
  </item>
  <item>
    <title></title>
    <link>https://news.test/empty</link>
  </item>
  <item>
    <title>Oil slips on demand worries</title>
    <pubDate>sometime yesterday</pubDate>
  </item>
</channel></rss>"#;

        let items = parse_feed(xml, &info(SourceType::International), 10).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Stocks rally as Fed signals pause");
        assert_eq!(items[0].content, "Markets rose sharply.");
        assert_eq!(items[0].url.as_deref(), Some("https://news.test/a"));
        assert_eq!(
            items[0].published_at,
            Some(Utc.with_ymd_and_hms(2025, 3, 4, 8, 30, 0).unwrap())
        );
        assert!(items[1].published_at.is_none());
        assert!(items[1].url.is_none());
    }

    #[test]
    fn test_entities_are_decoded() {
        let xml = r#"<rss version="2.0"><channel>
  <item>
    <title>S&amp;P 500 &amp;#8217;s rally</title>
    <description><![CDATA[<p>S&amp;P&nbsp;500 rose &#8217;</p>]]></description>
  </item>
</channel></rss>"#;

        let items = parse_feed(xml, &info(SourceType::International), 10).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "S&P 500 \u{2019}s rally");
        assert_eq!(items[0].content, "S&P 500 rose \u{2019}");
    }

    #[test]
    fn test_parse_atom() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <title>Chipmakers extend gains</title>
    <link href="https://news.test/atom"/>
    <summary>Semiconductor shares climbed.</summary>
    <updated>2025-03-04T16:30:00+08:00</updated>
  </entry>
</feed>"#;
        let items = parse_feed(xml, &info(SourceType::International), 10).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url.as_deref(), Some("https://news.test/atom"));
        assert_eq!(
            items[0].published_at,
            Some(Utc.with_ymd_and_hms(2025, 3, 4, 8, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_max_items_and_malformed() {
        let xml = "<rss><channel><item><title>a b c</title></item><item><title>d e f</title></item></channel></rss>";
        assert_eq!(parse_feed(xml, &info(SourceType::Domestic), 1).unwrap().len(), 1);
        assert!(parse_feed("<rss><channel>", &info(SourceType::Domestic), 10).is_err());
    }
}
