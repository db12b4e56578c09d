//! News ingestion: collectors for heterogeneous sources, the shared headless
//! browser, the aggregator and the title-similarity tools used to keep the
//! feed free of duplicates.

pub mod aggregator;
pub mod api;
pub mod browser;
pub mod collector;
pub mod feed;
pub mod filter;
pub mod registry;
pub mod rendered;
pub mod similarity;

pub use aggregator::{dedup_and_order, AggregatedNews, NewsAggregator};
pub use browser::{BrowserConfig, BrowserError, SharedBrowser};
pub use collector::{build_http_client, CollectError, NewsCollector, RenderedCollector, SourceInfo};
pub use filter::{hard_filter, preprocess, PreprocessOptions, Preprocessed};
pub use registry::{build_aggregator, register_defaults, RegistryOptions};
pub use similarity::{merge_near_duplicates, similarity, DEFAULT_NEAR_DUP_THRESHOLD};
