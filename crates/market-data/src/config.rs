use std::time::Duration;

use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct MarketDataConfig {
    /// Lifetime of a memoized bar history
    pub bar_ttl: Duration,
    /// Lifetime of the sector index
    pub sector_ttl: Duration,
    /// Maximum bar fetches in flight
    pub bar_concurrency: usize,
    /// Retry schedule for the primary bulk-quote call and listings
    pub quote_retry: RetryPolicy,
    /// Members kept per sector
    pub sector_top_n: usize,
    /// Instruments trading less than this (CNY) are left out of the index
    pub min_listing_amount: f64,
    /// Closes kept per instrument
    pub max_closes: usize,
    pub http_timeout: Duration,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            bar_ttl: Duration::from_secs(300),
            sector_ttl: Duration::from_secs(86_400),
            bar_concurrency: 5,
            quote_retry: RetryPolicy::default(),
            sector_top_n: 5,
            min_listing_amount: 5_000_000.0,
            max_closes: 90,
            http_timeout: Duration::from_secs(15),
        }
    }
}
