//! Built-in sources and the aggregator wiring.

use pulse_core::SourceType;
use reqwest::Client;
use std::time::Duration;

use crate::aggregator::NewsAggregator;
use crate::api::{ApiCollector, ApiSource, UrlField};
use crate::browser::{BrowserConfig, ExtractionPlan, SharedBrowser};
use crate::collector::{build_http_client, CollectError, SourceInfo};
use crate::feed::{FeedCollector, FeedSource};
use crate::rendered::{RenderedPageCollector, RenderedSource};

#[derive(Debug, Clone)]
pub struct RegistryOptions {
    pub include_international: bool,
    pub include_rendered: bool,
    pub http_timeout: Duration,
    pub browser: BrowserConfig,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            include_international: true,
            include_rendered: true,
            http_timeout: Duration::from_secs(15),
            browser: BrowserConfig::default(),
        }
    }
}

pub fn default_feeds() -> Vec<FeedSource> {
    let intl = |id: &str, name: &str| SourceInfo::new(id, name, SourceType::International, "en");
    vec![
        FeedSource::new(
            intl("cnbc", "CNBC"),
            "https://www.cnbc.com/id/100003114/device/rss/rss.html",
        ),
        FeedSource::new(
            intl("bloomberg", "Bloomberg"),
            "https://feeds.bloomberg.com/markets/news.rss",
        ),
        FeedSource::new(
            intl("wsj", "WSJ"),
            "https://feeds.a.dj.com/rss/RSSMarketsMain.xml",
        ),
        FeedSource::new(
            intl("bbc", "BBC"),
            "https://feeds.bbci.co.uk/news/business/rss.xml",
        ),
        FeedSource::new(
            intl("reuters", "Reuters"),
            "https://reutersagency.com/feed/?taxonomy=best-topics&post_type=best",
        ),
        FeedSource::new(intl("techcrunch", "TechCrunch"), "https://techcrunch.com/feed/"),
        FeedSource::new(
            SourceInfo::new("huxiu", "虎嗅", SourceType::Domestic, "zh"),
            "https://www.huxiu.com/rss/0.xml",
        ),
    ]
}

fn query(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn default_api_sources() -> Vec<ApiSource> {
    let domestic = |id: &str, name: &str| SourceInfo::new(id, name, SourceType::Domestic, "zh");
    vec![
        ApiSource {
            info: domestic("cls", "财联社"),
            url: "https://www.cls.cn/nodeapi/telegraphList".to_string(),
            query: query(&[("app", "CailianpressWeb"), ("os", "web"), ("rn", "50")]),
            items_pointer: "/data/roll_data".to_string(),
            title_field: "title".to_string(),
            content_field: Some("content".to_string()),
            url_field: UrlField::Field("shareurl".to_string()),
            time_field: Some("ctime".to_string()),
            max_items: 50,
        },
        ApiSource {
            info: domestic("eastmoney", "东方财富"),
            url: "https://np-listapi.eastmoney.com/comm/web/getFastNewsList".to_string(),
            query: query(&[
                ("client", "web"),
                ("biz", "web_724"),
                ("fastColumn", "102"),
                ("sortEnd", ""),
                ("pageSize", "50"),
                ("req_trace", "pulse"),
            ]),
            items_pointer: "/data/fastNewsList".to_string(),
            title_field: "title".to_string(),
            content_field: Some("summary".to_string()),
            url_field: UrlField::Template {
                field: "code".to_string(),
                template: "https://finance.eastmoney.com/a/{}.html".to_string(),
            },
            time_field: Some("showTime".to_string()),
            max_items: 50,
        },
        ApiSource {
            info: domestic("sina", "新浪财经"),
            url: "https://feed.mix.sina.com.cn/api/roll/get".to_string(),
            query: query(&[("pageid", "153"), ("lid", "2516"), ("num", "50"), ("page", "1")]),
            items_pointer: "/result/data".to_string(),
            title_field: "title".to_string(),
            content_field: Some("intro".to_string()),
            url_field: UrlField::Field("url".to_string()),
            time_field: Some("ctime".to_string()),
            max_items: 50,
        },
    ]
}

pub fn default_rendered_sources() -> Vec<RenderedSource> {
    vec![
        RenderedSource::new(
            SourceInfo::new("cls_telegraph", "财联社电报", SourceType::Domestic, "zh"),
            "https://www.cls.cn/telegraph",
            ExtractionPlan {
                item_selector: ".telegraph-list .telegraph-item, .telegraph-content-box".to_string(),
                title_selector: Some(".telegraph-title, .title, h3".to_string()),
                body_selector: Some(".telegraph-content, .content, p".to_string()),
                time_selector: Some(".telegraph-time, .time, time".to_string()),
                link_selector: Some("a".to_string()),
                max_items: 30,
            },
        ),
        RenderedSource::new(
            SourceInfo::new("sina_7x24", "新浪7x24", SourceType::Domestic, "zh"),
            "https://finance.sina.com.cn/7x24/",
            ExtractionPlan {
                item_selector: ".bd_i".to_string(),
                title_selector: None,
                body_selector: Some(".bd_i_txt_c".to_string()),
                time_selector: Some(".bd_i_time_c".to_string()),
                link_selector: Some(".bd_i_txt_c a".to_string()),
                max_items: 30,
            },
        ),
    ]
}

/// Register the built-in sources on `browser`, honouring the options.
pub fn register_defaults(
    client: &Client,
    browser: SharedBrowser,
    options: &RegistryOptions,
) -> NewsAggregator {
    let mut aggregator = NewsAggregator::new(browser);

    for source in default_feeds() {
        if !options.include_international && source.info.source_type == SourceType::International {
            continue;
        }
        aggregator = aggregator.with_collector(Box::new(FeedCollector::new(source, client.clone())));
    }
    for source in default_api_sources() {
        if !options.include_international && source.info.source_type == SourceType::International {
            continue;
        }
        aggregator = aggregator.with_collector(Box::new(ApiCollector::new(source, client.clone())));
    }
    if options.include_rendered {
        for source in default_rendered_sources() {
            aggregator = aggregator.with_rendered(Box::new(RenderedPageCollector::new(source)));
        }
    }

    tracing::info!("Registered {} news sources", aggregator.source_count());
    aggregator
}

/// Aggregator over all built-in sources with a Chromium-backed browser.
pub fn build_aggregator(options: &RegistryOptions) -> Result<NewsAggregator, CollectError> {
    let client = build_http_client(options.http_timeout)?;
    let browser = SharedBrowser::chromium(options.browser.clone());
    Ok(register_defaults(&client, browser, options))
}
