use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_core::time::clock_time_on_business_day;
use pulse_core::NewsItem;
use reqwest::Url;

use crate::browser::{ExtractedNode, ExtractionPlan, SharedBrowser};
use crate::collector::{truncate_chars, CollectError, RenderedCollector, SourceInfo};

/// Title length below which a rendered item is treated as noise
const MIN_TITLE_CHARS: usize = 10;
/// Body prefix promoted to title when the page has no title node
const TITLE_FROM_BODY_CHARS: usize = 100;

/// A page that only shows its news after client-side rendering.
#[derive(Debug, Clone)]
pub struct RenderedSource {
    pub info: SourceInfo,
    pub url: String,
    pub plan: ExtractionPlan,
    pub min_title_chars: usize,
}

impl RenderedSource {
    pub fn new(info: SourceInfo, url: &str, plan: ExtractionPlan) -> Self {
        Self {
            info,
            url: url.to_string(),
            plan,
            min_title_chars: MIN_TITLE_CHARS,
        }
    }
}

pub struct RenderedPageCollector {
    source: RenderedSource,
}

impl RenderedPageCollector {
    pub fn new(source: RenderedSource) -> Self {
        Self { source }
    }
}

#[async_trait]
impl RenderedCollector for RenderedPageCollector {
    fn info(&self) -> &SourceInfo {
        &self.source.info
    }

    async fn collect(&self, browser: &SharedBrowser) -> Result<Vec<NewsItem>, CollectError> {
        let nodes = browser.extract(&self.source.url, &self.source.plan).await?;
        tracing::debug!("{} rendered {} nodes", self.source.info.id, nodes.len());
        Ok(nodes_to_items(&self.source, nodes, Utc::now()))
    }
}

/// Map extracted nodes to news items, dropping nodes without a usable title.
///
/// Live tickers only show a clock reading, so times are anchored on the
/// business date of `now`; anything unreadable stays unknown.
pub fn nodes_to_items(
    source: &RenderedSource,
    nodes: Vec<ExtractedNode>,
    now: DateTime<Utc>,
) -> Vec<NewsItem> {
    nodes
        .into_iter()
        .take(source.plan.max_items)
        .filter_map(|node| {
            let body = node.body.or(node.text).unwrap_or_default();
            let title = match node.title {
                Some(title) => title,
                None => truncate_chars(&body, TITLE_FROM_BODY_CHARS),
            };
            let title = title.trim().to_string();
            if title.chars().count() < source.min_title_chars {
                return None;
            }

            let published_at = node
                .time
                .as_deref()
                .and_then(|t| clock_time_on_business_day(t, now));
            let url = node.href.and_then(|href| resolve_href(&source.url, &href));

            Some(
                source
                    .info
                    .item(title)
                    .with_content(body.trim())
                    .with_url(url)
                    .with_published_at(published_at),
            )
        })
        .collect()
}

/// Resolve a possibly relative link against the page URL.
fn resolve_href(page_url: &str, href: &str) -> Option<String> {
    Url::parse(page_url)
        .and_then(|base| base.join(href.trim()))
        .map(String::from)
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::fake_browser;
    use pulse_core::time::{parse_timestamp, AssumedZone};
    use pulse_core::SourceType;
    use std::collections::HashMap;

    fn source() -> RenderedSource {
        RenderedSource::new(
            SourceInfo::new("cls_rendered", "财联社", SourceType::Domestic, "zh"),
            "https://www.cls.cn/telegraph",
            ExtractionPlan {
                item_selector: ".telegraph-item".to_string(),
                title_selector: Some(".telegraph-title".to_string()),
                body_selector: Some(".telegraph-content".to_string()),
                time_selector: Some(".telegraph-time".to_string()),
                link_selector: Some("a".to_string()),
                max_items: 2,
            },
        )
    }

    #[test]
    fn test_nodes_to_items() {
        let now = parse_timestamp("2025-03-05 10:00:00", AssumedZone::Business).unwrap();
        let nodes = vec![
            ExtractedNode {
                title: None,
                body: Some("【央行开展逆回购操作】央行今日开展7天期逆回购操作1000亿元".to_string()),
                time: Some("09:30:15".to_string()),
                href: Some("/detail/1".to_string()),
                text: None,
            },
            ExtractedNode {
                title: Some("短讯".to_string()),
                ..Default::default()
            },
            ExtractedNode {
                title: Some("被截断的第三条新闻标题足够长".to_string()),
                ..Default::default()
            },
        ];

        let items = nodes_to_items(&source(), nodes, now);
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert!(item.title.starts_with("【央行开展逆回购操作】"));
        assert_eq!(item.url.as_deref(), Some("https://www.cls.cn/detail/1"));
        assert_eq!(
            item.published_at,
            parse_timestamp("2025-03-05 09:30:15", AssumedZone::Business)
        );
    }

    #[test]
    fn test_unreadable_time_is_unknown() {
        let now = Utc::now();
        let nodes = vec![ExtractedNode {
            title: Some("美联储维持利率不变符合市场预期".to_string()),
            time: Some("刚刚".to_string()),
            ..Default::default()
        }];
        let items = nodes_to_items(&source(), nodes, now);
        assert_eq!(items.len(), 1);
        assert!(items[0].published_at.is_none());
    }

    #[test]
    fn test_resolve_href() {
        assert_eq!(resolve_href("https://a.test/x/y", "https://b.test/z").as_deref(), Some("https://b.test/z"));
        assert_eq!(resolve_href("https://a.test/x/y", "//cdn.test/z").as_deref(), Some("https://cdn.test/z"));
        assert_eq!(resolve_href("https://a.test/x/y", "/z").as_deref(), Some("https://a.test/z"));
        assert_eq!(resolve_href("https://a.test", "z").as_deref(), Some("https://a.test/z"));
    }

    #[test]
    fn test_resolve_relative_links_against_page_directory() {
        assert_eq!(
            resolve_href("https://www.cls.cn/detail/list", "1234").as_deref(),
            Some("https://www.cls.cn/detail/1234")
        );
        assert_eq!(
            resolve_href("https://finance.sina.com.cn/7x24/", "?tag=10").as_deref(),
            Some("https://finance.sina.com.cn/7x24/?tag=10")
        );
        assert_eq!(
            resolve_href("https://finance.sina.com.cn/7x24/", "./item/9.html").as_deref(),
            Some("https://finance.sina.com.cn/7x24/item/9.html")
        );
        assert_eq!(resolve_href("not a url", "/z"), None);
    }

    #[tokio::test]
    async fn test_collect_through_shared_browser() {
        let pages = HashMap::from([(
            "https://www.cls.cn/telegraph".to_string(),
            vec![ExtractedNode {
                title: Some("沪指午间收涨0.8%两市成交额破万亿".to_string()),
                ..Default::default()
            }],
        )]);
        let (browser, _) = fake_browser(pages);
        let collector = RenderedPageCollector::new(source());
        let items = collector.safe_collect(&browser).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source, "财联社");
    }
}
