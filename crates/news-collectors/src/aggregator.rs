use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use pulse_core::{NewsItem, NewsRecord, SourceStats};
use serde::Serialize;
use std::collections::HashSet;

use crate::browser::SharedBrowser;
use crate::collector::{NewsCollector, RenderedCollector};
use crate::similarity::normalize_title;

/// Deduplicated, recency-ordered output of one collection run
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedNews {
    pub items: Vec<NewsItem>,
    pub source_stats: SourceStats,
    pub collected_at: DateTime<Utc>,
}

impl AggregatedNews {
    pub fn records(&self) -> Vec<NewsRecord> {
        self.items.iter().map(NewsRecord::from).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Fans out to every registered collector and merges the results.
pub struct NewsAggregator {
    collectors: Vec<Box<dyn NewsCollector>>,
    rendered: Vec<Box<dyn RenderedCollector>>,
    browser: SharedBrowser,
}

impl NewsAggregator {
    pub fn new(browser: SharedBrowser) -> Self {
        Self {
            collectors: Vec::new(),
            rendered: Vec::new(),
            browser,
        }
    }

    pub fn with_collector(mut self, collector: Box<dyn NewsCollector>) -> Self {
        self.collectors.push(collector);
        self
    }

    pub fn with_rendered(mut self, collector: Box<dyn RenderedCollector>) -> Self {
        self.rendered.push(collector);
        self
    }

    pub fn source_count(&self) -> usize {
        self.collectors.len() + self.rendered.len()
    }

    /// Run every collector once.
    ///
    /// HTTP collectors run concurrently and are joined in registration
    /// order; rendered collectors follow one at a time on the shared browser.
    pub async fn collect_all(&self) -> AggregatedNews {
        tracing::info!(
            "Collecting from {} HTTP and {} rendered sources",
            self.collectors.len(),
            self.rendered.len()
        );

        let mut batches = join_all(self.collectors.iter().map(|c| c.safe_collect())).await;

        for collector in &self.rendered {
            batches.push(collector.safe_collect(&self.browser).await);
        }

        let aggregated = dedup_and_order(batches);
        tracing::info!(
            "Aggregated {} unique items from {} sources",
            aggregated.items.len(),
            aggregated.source_stats.len()
        );
        aggregated
    }

    /// Release the shared browser.
    pub async fn shutdown(&self) {
        self.browser.shutdown().await;
    }

    /// Collect once and release the browser before returning.
    pub async fn collect_once(self) -> AggregatedNews {
        let news = self.collect_all().await;
        self.shutdown().await;
        news
    }
}

/// Exact-title dedup (first occurrence wins) followed by a stable sort on
/// `published_at` descending, unknown timestamps last.
pub fn dedup_and_order(batches: Vec<Vec<NewsItem>>) -> AggregatedNews {
    let mut seen = HashSet::new();
    let mut items: Vec<NewsItem> = batches
        .into_iter()
        .flatten()
        .filter(|item| seen.insert(normalize_title(&item.title)))
        .collect();

    // Option orders None first, so compare reversed
    items.sort_by(|a, b| match (a.published_at, b.published_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    let mut source_stats = SourceStats::new();
    for item in &items {
        *source_stats.entry(item.source.clone()).or_insert(0) += 1;
    }

    AggregatedNews {
        items,
        source_stats,
        collected_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::{fake_browser, Counters};
    use crate::browser::{ExtractedNode, ExtractionPlan};
    use crate::collector::{CollectError, SourceInfo};
    use crate::rendered::{RenderedPageCollector, RenderedSource};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use pulse_core::SourceType;
    use std::collections::HashMap;
    use pulse_core::time::clock_time_on_business_day;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    struct StaticCollector {
        info: SourceInfo,
        items: Vec<(&'static str, Option<DateTime<Utc>>)>,
    }

    impl StaticCollector {
        fn boxed(name: &str, items: Vec<(&'static str, Option<DateTime<Utc>>)>) -> Box<dyn NewsCollector> {
            Box::new(Self {
                info: SourceInfo::new(name, name, SourceType::Domestic, "zh"),
                items,
            })
        }
    }

    #[async_trait]
    impl NewsCollector for StaticCollector {
        fn info(&self) -> &SourceInfo {
            &self.info
        }

        async fn collect(&self) -> Result<Vec<NewsItem>, CollectError> {
            Ok(self
                .items
                .iter()
                .map(|(title, ts)| self.info.item(*title).with_published_at(*ts))
                .collect())
        }
    }

    struct BrokenCollector {
        info: SourceInfo,
    }

    #[async_trait]
    impl NewsCollector for BrokenCollector {
        fn info(&self) -> &SourceInfo {
            &self.info
        }

        async fn collect(&self) -> Result<Vec<NewsItem>, CollectError> {
            Err(CollectError::Status {
                status: 503,
                url: "https://down.test".to_string(),
            })
        }
    }

    /// Records when it finishes, after yielding so rendered work could overlap it.
    struct SlowCollector {
        info: SourceInfo,
        title: &'static str,
        published_at: Option<DateTime<Utc>>,
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl NewsCollector for SlowCollector {
        fn info(&self) -> &SourceInfo {
            &self.info
        }

        async fn collect(&self) -> Result<Vec<NewsItem>, CollectError> {
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            self.counters.record(format!("done {}", self.info.id));
            Ok(vec![self.info.item(self.title).with_published_at(self.published_at)])
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 4, 2, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_titles_across_sources() {
        let (browser, _) = fake_browser(HashMap::new());
        let aggregator = NewsAggregator::new(browser)
            .with_collector(StaticCollector::boxed("A", vec![("央行降准0.5%", Some(t0()))]))
            .with_collector(StaticCollector::boxed(
                "B",
                vec![("央行降准0.5%", Some(t0() + Duration::seconds(1)))],
            ))
            .with_collector(StaticCollector::boxed(
                "C",
                vec![("存储芯片价格持续上涨", Some(t0() - Duration::seconds(60)))],
            ));

        let news = aggregator.collect_once().await;
        assert_eq!(news.items.len(), 2);
        assert_eq!(news.items[0].title, "央行降准0.5%");
        assert_eq!(news.items[0].source, "A");
        assert_eq!(news.items[0].published_at, Some(t0()));
        assert_eq!(news.items[1].title, "存储芯片价格持续上涨");
        assert_eq!(news.source_stats.get("A"), Some(&1));
        assert_eq!(news.source_stats.get("B"), None);
        assert_eq!(news.source_stats.get("C"), Some(&1));
    }

    #[test]
    fn test_order_is_stable_and_unknown_last() {
        let info = SourceInfo::new("s", "s", SourceType::International, "en");
        let batches = vec![
            vec![
                info.item("undated first"),
                info.item("tie one").with_published_at(Some(t0())),
            ],
            vec![
                info.item("newest").with_published_at(Some(t0() + Duration::hours(1))),
                info.item("tie two").with_published_at(Some(t0())),
                info.item("undated second"),
                info.item("  tie   one ").with_published_at(Some(t0() + Duration::hours(2))),
            ],
        ];

        let news = dedup_and_order(batches);
        let titles: Vec<&str> = news.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["newest", "tie one", "tie two", "undated first", "undated second"]
        );
        for pair in news.items.windows(2) {
            match (pair[0].published_at, pair[1].published_at) {
                (Some(a), Some(b)) => assert!(a >= b),
                (None, Some(_)) => panic!("undated item before dated item"),
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn test_failing_source_is_isolated() {
        let (browser, _) = fake_browser(HashMap::new());
        let aggregator = NewsAggregator::new(browser)
            .with_collector(Box::new(BrokenCollector {
                info: SourceInfo::new("down", "Down", SourceType::International, "en"),
            }))
            .with_collector(StaticCollector::boxed("up", vec![("Stocks rise", None)]));

        let news = aggregator.collect_all().await;
        assert_eq!(news.items.len(), 1);
        assert_eq!(news.items[0].source, "up");
    }

    #[tokio::test]
    async fn test_rendered_sources_share_one_browser() {
        let page = |title: &str| {
            vec![ExtractedNode {
                title: Some(title.to_string()),
                ..Default::default()
            }]
        };
        let pages = HashMap::from([
            ("https://one.test".to_string(), page("第一个页面的快讯标题足够长")),
            ("https://two.test".to_string(), page("第二个页面的快讯标题足够长")),
        ]);
        let (browser, counters) = fake_browser(pages);

        let plan = ExtractionPlan {
            item_selector: ".item".to_string(),
            title_selector: Some(".title".to_string()),
            body_selector: None,
            time_selector: None,
            link_selector: None,
            max_items: 30,
        };
        let rendered = |id: &str, url: &str| -> Box<dyn RenderedCollector> {
            Box::new(RenderedPageCollector::new(RenderedSource::new(
                SourceInfo::new(id, id, SourceType::Domestic, "zh"),
                url,
                plan.clone(),
            )))
        };

        let aggregator = NewsAggregator::new(browser)
            .with_rendered(rendered("one", "https://one.test"))
            .with_rendered(rendered("two", "https://two.test"))
            .with_rendered(rendered("missing", "https://missing.test"));

        let news = aggregator.collect_once().await;
        assert_eq!(news.items.len(), 2);
        assert_eq!(counters.launches.load(Ordering::SeqCst), 1);
        assert_eq!(counters.extractions.load(Ordering::SeqCst), 3);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rendered_sources_run_after_http_one_at_a_time() {
        let node = |title: &str| ExtractedNode {
            title: Some(title.to_string()),
            time: Some("00:00:00".to_string()),
            ..Default::default()
        };
        let pages = HashMap::from([
            ("https://one.test".to_string(), vec![node("渲染页面一的快讯标题足够长")]),
            ("https://two.test".to_string(), vec![node("渲染页面二的快讯标题足够长")]),
        ]);
        let (browser, counters) = fake_browser(pages);
        let tied = clock_time_on_business_day("00:00:00", Utc::now());
        assert!(tied.is_some());

        let plan = ExtractionPlan {
            item_selector: ".item".to_string(),
            title_selector: Some(".title".to_string()),
            body_selector: None,
            time_selector: Some(".time".to_string()),
            link_selector: None,
            max_items: 30,
        };
        let rendered = |id: &str, url: &str| -> Box<dyn RenderedCollector> {
            Box::new(RenderedPageCollector::new(RenderedSource::new(
                SourceInfo::new(id, id, SourceType::Domestic, "zh"),
                url,
                plan.clone(),
            )))
        };
        let slow = |id: &str, title: &'static str| -> Box<dyn NewsCollector> {
            Box::new(SlowCollector {
                info: SourceInfo::new(id, id, SourceType::Domestic, "zh"),
                title,
                published_at: tied,
                counters: counters.clone(),
            })
        };

        // Rendered sources registered first still run after the HTTP batch
        let aggregator = NewsAggregator::new(browser)
            .with_rendered(rendered("one", "https://one.test"))
            .with_rendered(rendered("two", "https://two.test"))
            .with_collector(slow("http-a", "接口来源甲的快讯标题"))
            .with_collector(slow("http-b", "接口来源乙的快讯标题"));

        let news = aggregator.collect_once().await;

        let sources: Vec<&str> = news.items.iter().map(|i| i.source.as_str()).collect();
        assert_eq!(sources, vec!["http-a", "http-b", "one", "two"]);
        assert!(news.items.iter().all(|i| i.published_at == tied));

        let events = counters.events();
        let first_extract = events
            .iter()
            .position(|e| e.starts_with("extract"))
            .unwrap();
        let last_done = events.iter().rposition(|e| e.starts_with("done")).unwrap();
        assert!(last_done < first_extract, "events: {:?}", events);
        assert_eq!(
            &events[first_extract..],
            &["extract https://one.test", "extract https://two.test"]
        );
        assert_eq!(counters.max_in_flight.load(Ordering::SeqCst), 1);
    }
}
