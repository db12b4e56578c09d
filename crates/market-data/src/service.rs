use chrono::Utc;
use futures_util::future::join_all;
use pulse_core::{round2, InstrumentSummary, MarketQuote, SectorMap};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tokio::sync::{RwLock, Semaphore};
use tokio::time::Instant;

use crate::cache::TtlCache;
use crate::config::MarketDataConfig;
use crate::eastmoney::EastmoneyProvider;
use crate::error::MarketDataError;
use crate::fetcher::HttpFetcher;
use crate::provider::{BarProvider, ListingProvider, ListingRecord, QuoteProvider, QuoteRecord};
use crate::retry::{retry, RetryPolicy};
use crate::sectors::{build_sector_map, resolve_sector};
use crate::sina::SinaProvider;

/// Bar horizons exposed on every quote
const SHORT_HORIZON: usize = 5;
const LONG_HORIZON: usize = 20;

/// Memoized daily history for one instrument
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BarSnapshot {
    /// Most recent closes, oldest first
    pub closes: Vec<f64>,
    pub change_5d: f64,
    pub change_20d: f64,
}

impl BarSnapshot {
    pub fn from_closes(mut closes: Vec<f64>, max_closes: usize) -> Self {
        let change_5d = percent_change(&closes, SHORT_HORIZON);
        let change_20d = percent_change(&closes, LONG_HORIZON);
        if closes.len() > max_closes {
            closes.drain(..closes.len() - max_closes);
        }
        Self {
            closes,
            change_5d,
            change_20d,
        }
    }
}

/// Percent change of the last close against the close `bars` bars earlier,
/// rounded to two decimals. Zero when the history is too short.
pub fn percent_change(closes: &[f64], bars: usize) -> f64 {
    if closes.len() <= bars {
        return 0.0;
    }
    let latest = closes[closes.len() - 1];
    let base = closes[closes.len() - 1 - bars];
    if base <= 0.0 {
        return 0.0;
    }
    round2((latest - base) / base * 100.0)
}

/// Instruments backing one requested sector
#[derive(Debug, Clone, Serialize)]
pub struct SectorShortlist {
    /// Sector name as requested
    pub sector: String,
    /// Index sector it resolved to
    pub matched: String,
    pub instruments: Vec<InstrumentSummary>,
}

/// Provider chain used by the service
pub struct Providers {
    pub quotes: Box<dyn QuoteProvider>,
    pub quotes_fallback: Box<dyn QuoteProvider>,
    pub bars: Box<dyn BarProvider>,
    pub bars_fallback: Box<dyn BarProvider>,
    /// Tried in order until one answers
    pub listings: Vec<Box<dyn ListingProvider>>,
}

impl Providers {
    /// Eastmoney first for quotes and bars, Sina first for the listing.
    pub fn public(fetcher: HttpFetcher) -> Self {
        Self {
            quotes: Box::new(EastmoneyProvider::new(fetcher.clone())),
            quotes_fallback: Box::new(SinaProvider::new(fetcher.clone())),
            bars: Box::new(EastmoneyProvider::new(fetcher.clone())),
            bars_fallback: Box::new(SinaProvider::new(fetcher.clone())),
            listings: vec![
                Box::new(SinaProvider::new(fetcher.clone())),
                Box::new(EastmoneyProvider::new(fetcher)),
            ],
        }
    }
}

struct SectorIndex {
    built: Instant,
    map: SectorMap,
}

/// Resilient quote, bar and sector lookups with in-process caches.
///
/// Constructed once and shared by reference. Concurrent misses for the same
/// symbol may both go to the network; the later write simply overwrites the
/// cache entry.
pub struct MarketDataService {
    providers: Providers,
    config: MarketDataConfig,
    bar_cache: TtlCache<BarSnapshot>,
    bar_permits: Semaphore,
    sector_index: RwLock<Option<SectorIndex>>,
}

impl MarketDataService {
    pub fn new(providers: Providers, config: MarketDataConfig) -> Self {
        Self {
            bar_cache: TtlCache::new(config.bar_ttl),
            bar_permits: Semaphore::new(config.bar_concurrency.max(1)),
            sector_index: RwLock::new(None),
            providers,
            config,
        }
    }

    /// Service over the public Eastmoney and Sina endpoints.
    pub fn public(config: MarketDataConfig) -> Result<Self, MarketDataError> {
        let fetcher = HttpFetcher::new(config.http_timeout)?;
        Ok(Self::new(Providers::public(fetcher), config))
    }

    pub fn config(&self) -> &MarketDataConfig {
        &self.config
    }

    /// Latest quotes for `codes`, in the primary provider's shape.
    ///
    /// The bulk call is retried on the configured schedule; symbols it still
    /// does not cover are asked from the fallback. The first answer for a
    /// symbol wins. Total failure yields an empty list.
    pub async fn batch_quotes(&self, codes: &[String]) -> Vec<QuoteRecord> {
        let codes = unique(codes);
        if codes.is_empty() {
            return Vec::new();
        }

        let mut merged: Vec<QuoteRecord> = Vec::with_capacity(codes.len());
        let mut answered: HashSet<String> = HashSet::new();

        let primary = self.providers.quotes.as_ref();
        let what = format!("{} bulk quotes", primary.name());
        match retry(&self.config.quote_retry, &what, || primary.fetch_quotes(&codes)).await {
            Ok(records) => merge_first_writer(&mut merged, &mut answered, records),
            Err(e) => tracing::warn!("{} exhausted, falling back: {}", what, e),
        }

        let missing: Vec<String> = codes
            .iter()
            .filter(|c| !answered.contains(c.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            let fallback = self.providers.quotes_fallback.as_ref();
            match fallback.fetch_quotes(&missing).await {
                Ok(records) => {
                    tracing::info!(
                        "{} answered {} of {} missing symbols",
                        fallback.name(),
                        records.len(),
                        missing.len()
                    );
                    merge_first_writer(&mut merged, &mut answered, records);
                }
                Err(e) => tracing::warn!("{} quotes failed: {}", fallback.name(), e),
            }
        }

        // Only what was asked for, in request order
        let mut by_code: HashMap<String, QuoteRecord> =
            merged.into_iter().map(|q| (q.code.clone(), q)).collect();
        codes.iter().filter_map(|c| by_code.remove(c)).collect()
    }

    /// Daily history for one symbol, served from cache within the TTL.
    ///
    /// Misses fetch from the primary bar provider, then the alternate. An
    /// exhausted chain yields an empty snapshot that is not cached.
    pub async fn bar_snapshot(&self, code: &str) -> BarSnapshot {
        if let Some(snapshot) = self.bar_cache.get(code) {
            return snapshot;
        }

        let _permit = self.bar_permits.acquire().await.ok();

        let closes = match self.providers.bars.fetch_closes(code).await {
            Ok(closes) => Some(closes),
            Err(e) => {
                tracing::warn!(
                    "{} bars failed for {}: {}, trying {}",
                    self.providers.bars.name(),
                    code,
                    e,
                    self.providers.bars_fallback.name()
                );
                match self.providers.bars_fallback.fetch_closes(code).await {
                    Ok(closes) => Some(closes),
                    Err(e) => {
                        tracing::warn!("No bar history for {}: {}", code, e);
                        None
                    }
                }
            }
        };

        match closes {
            Some(closes) => {
                let snapshot = BarSnapshot::from_closes(closes, self.config.max_closes);
                self.bar_cache.insert(code, snapshot.clone());
                snapshot
            }
            None => BarSnapshot::default(),
        }
    }

    /// Bar snapshots for many symbols, at most `bar_concurrency` fetches in flight.
    pub async fn bar_snapshots(&self, codes: &[String]) -> HashMap<String, BarSnapshot> {
        let codes = unique(codes);
        let snapshots = join_all(codes.iter().map(|c| self.bar_snapshot(c))).await;
        codes.into_iter().zip(snapshots).collect()
    }

    /// Quotes joined with multi-horizon changes and close history.
    pub async fn quotes(&self, codes: &[String]) -> Vec<MarketQuote> {
        let records = self.batch_quotes(codes).await;
        if records.is_empty() {
            return Vec::new();
        }

        let quoted: Vec<String> = records.iter().map(|r| r.code.clone()).collect();
        let mut bars = self.bar_snapshots(&quoted).await;
        let fetched_at = Utc::now();

        records
            .into_iter()
            .map(|r| {
                let bar = bars.remove(&r.code).unwrap_or_default();
                MarketQuote {
                    symbol: r.code,
                    name: r.name,
                    price: r.price,
                    change_pct: round2(r.change_pct),
                    change_5d: bar.change_5d,
                    change_20d: bar.change_20d,
                    amount: r.amount,
                    flow: r.main_flow,
                    flow_pct: round2(r.main_flow_pct),
                    turnover: round2(r.turnover),
                    closes: bar.closes,
                    fetched_at,
                }
            })
            .collect()
    }

    /// The sector index, rebuilt once older than `sector_ttl`.
    ///
    /// A failed rebuild yields an empty map; an expired index is never served.
    pub async fn sector_map(&self) -> SectorMap {
        {
            let index = self.sector_index.read().await;
            if let Some(index) = index.as_ref() {
                if index.built.elapsed() < self.config.sector_ttl {
                    return index.map.clone();
                }
            }
        }

        match self.fetch_listings().await {
            Some(listings) => {
                let map = build_sector_map(
                    &listings,
                    self.config.min_listing_amount,
                    self.config.sector_top_n,
                    Utc::now(),
                );
                tracing::info!(
                    "Sector index rebuilt: {} sectors from {} listings",
                    map.len(),
                    listings.len()
                );
                *self.sector_index.write().await = Some(SectorIndex {
                    built: Instant::now(),
                    map: map.clone(),
                });
                map
            }
            None => {
                *self.sector_index.write().await = None;
                SectorMap::default()
            }
        }
    }

    async fn fetch_listings(&self) -> Option<Vec<ListingRecord>> {
        let policy = RetryPolicy {
            attempts: self.config.quote_retry.attempts,
            base_delay: self.config.quote_retry.base_delay * 2,
            max_jitter: self.config.quote_retry.max_jitter,
        };
        for provider in &self.providers.listings {
            let what = format!("{} listing", provider.name());
            match retry(&policy, &what, || provider.fetch_listings()).await {
                Ok(listings) => return Some(listings),
                Err(e) => tracing::warn!("{} unavailable: {}", what, e),
            }
        }
        tracing::warn!("Every listing provider failed; sector index is empty");
        None
    }

    /// Top instruments for each requested sector.
    ///
    /// One batch quote covers the union of all members; each sector's
    /// instruments are sorted by amount descending and capped at `limit`.
    /// Sectors that do not resolve are left out.
    pub async fn sector_shortlist(&self, sectors: &[String], limit: usize) -> Vec<SectorShortlist> {
        let map = self.sector_map().await;
        if map.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut wanted: Vec<(String, String, Vec<String>)> = Vec::new();
        let mut union: Vec<String> = Vec::new();
        for requested in sectors {
            let Some(entry) = resolve_sector(&map, requested) else {
                tracing::debug!("Sector {} has no instruments in the index", requested);
                continue;
            };
            let codes: Vec<String> = entry
                .members
                .iter()
                .take(limit)
                .map(|m| m.symbol.clone())
                .collect();
            union.extend(codes.iter().cloned());
            wanted.push((requested.clone(), entry.name.clone(), codes));
        }
        if union.is_empty() {
            return Vec::new();
        }

        let quotes: HashMap<String, MarketQuote> = self
            .quotes(&union)
            .await
            .into_iter()
            .map(|q| (q.symbol.clone(), q))
            .collect();

        wanted
            .into_iter()
            .map(|(sector, matched, codes)| {
                let mut instruments: Vec<InstrumentSummary> = codes
                    .iter()
                    .filter_map(|c| quotes.get(c))
                    .map(InstrumentSummary::from)
                    .collect();
                instruments.sort_by(|a, b| b.amount.total_cmp(&a.amount));
                instruments.truncate(limit);
                SectorShortlist {
                    sector,
                    matched,
                    instruments,
                }
            })
            .collect()
    }
}

fn unique(codes: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    codes
        .iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty() && seen.insert(c.clone()))
        .collect()
}

fn merge_first_writer(
    merged: &mut Vec<QuoteRecord>,
    answered: &mut HashSet<String>,
    records: Vec<QuoteRecord>,
) {
    for record in records {
        if answered.insert(record.code.clone()) {
            merged.push(record);
        }
    }
}
