//! Offline stand-ins for the analyzer and the market data providers.

use async_trait::async_trait;
use market_data::{
    BarProvider, ListingProvider, ListingRecord, MarketDataConfig, MarketDataError, MarketDataService,
    Providers, QuoteProvider, QuoteRecord,
};
use pulse_core::{AnalysisRequest, PulseError, SectorAnalyzer, SectorReport};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub news_count: usize,
    pub history_context: Option<String>,
    pub allowed_sectors: Option<Vec<String>>,
}

/// Answers every request with the same report and remembers what it was asked.
#[derive(Clone)]
pub struct RecordingAnalyzer {
    answer: Option<SectorReport>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl RecordingAnalyzer {
    pub fn answering(answer: Option<SectorReport>) -> Self {
        Self {
            answer,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl SectorAnalyzer for RecordingAnalyzer {
    async fn analyze(&self, request: AnalysisRequest<'_>) -> Result<Option<SectorReport>, PulseError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            news_count: request.news.len(),
            history_context: request.history_context.map(str::to_string),
            allowed_sectors: request.allowed_sectors.map(|s| s.to_vec()),
        });
        Ok(self.answer.clone())
    }
}

const LISTING: &[(&str, &str, f64)] = &[
    ("512880", "证券ETF", 3.0e9),
    ("512000", "券商ETF", 1.2e9),
    ("512480", "半导体ETF", 2.0e9),
    ("518880", "黄金ETF", 5.0e9),
];

struct FixedMarket;

#[async_trait]
impl QuoteProvider for FixedMarket {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn fetch_quotes(&self, codes: &[String]) -> Result<Vec<QuoteRecord>, MarketDataError> {
        let quotes: Vec<QuoteRecord> = LISTING
            .iter()
            .filter(|(code, _, _)| codes.iter().any(|c| c == code))
            .map(|(code, name, amount)| QuoteRecord {
                code: code.to_string(),
                name: name.to_string(),
                price: 1.5,
                change_pct: 1.25,
                amount: *amount,
                turnover: 3.0,
                main_flow: 1.0e7,
                main_flow_pct: 0.8,
            })
            .collect();
        if quotes.is_empty() {
            return Err(MarketDataError::Empty("fixed quotes".to_string()));
        }
        Ok(quotes)
    }
}

#[async_trait]
impl BarProvider for FixedMarket {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn fetch_closes(&self, _code: &str) -> Result<Vec<f64>, MarketDataError> {
        Ok((1..=30).map(|i| 1.0 + i as f64 / 100.0).collect())
    }
}

#[async_trait]
impl ListingProvider for FixedMarket {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn fetch_listings(&self) -> Result<Vec<ListingRecord>, MarketDataError> {
        Ok(LISTING
            .iter()
            .map(|(code, name, amount)| ListingRecord {
                code: code.to_string(),
                name: name.to_string(),
                amount: *amount,
            })
            .collect())
    }
}

/// Market data service answering from a small fixed table.
pub fn fake_market() -> MarketDataService {
    let providers = Providers {
        quotes: Box::new(FixedMarket),
        quotes_fallback: Box::new(FixedMarket),
        bars: Box::new(FixedMarket),
        bars_fallback: Box::new(FixedMarket),
        listings: vec![Box::new(FixedMarket)],
    };
    MarketDataService::new(providers, MarketDataConfig::default())
}
