//! Quotes, daily bars and the sector index for exchange-traded funds.
//!
//! Every public lookup on [`MarketDataService`] degrades to "no data" instead
//! of failing: providers are retried, then replaced by their fallback, and an
//! exhausted chain yields an empty result.

pub mod cache;
pub mod config;
pub mod eastmoney;
pub mod error;
pub mod fetcher;
pub mod provider;
pub mod retry;
pub mod sectors;
pub mod service;
pub mod sina;
pub mod symbols;

pub use cache::TtlCache;
pub use config::MarketDataConfig;
pub use error::MarketDataError;
pub use fetcher::HttpFetcher;
pub use provider::{BarProvider, ListingProvider, ListingRecord, QuoteProvider, QuoteRecord};
pub use retry::RetryPolicy;
pub use service::{BarSnapshot, MarketDataService, Providers, SectorShortlist};
