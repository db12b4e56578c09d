//! One collection and analysis cycle.
//!
//! Layout under `data_dir`:
//! - `news_raw.json`: the deduplicated news of the latest collection
//! - `latest.json`: the latest published view
//! - `<archive_dir>/<YYYY-MM-DD>.json`: condensed daily snapshots

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use market_data::MarketDataService;
use news_collectors::{build_aggregator, hard_filter, preprocess, AggregatedNews};
use pulse_core::time::business_date_of;
use pulse_core::{
    AnalysisRequest, ArchiveSnapshot, NewsRecord, SectorAnalyzer, SectorReport, SourceStats,
};
use serde::{Deserialize, Serialize};
use snapshot_archive::{build_sector_trends, format_history_context, Archiver, SectorTrend};
use std::path::{Path, PathBuf};

use crate::config::PulseConfig;
use crate::enrich::{enrich_sectors, overheat_alert, EnrichedSector, OverheatAlert};

pub const NEWS_RAW_FILE: &str = "news_raw.json";
pub const LATEST_FILE: &str = "latest.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNews {
    pub items: Vec<NewsRecord>,
    pub source_stats: SourceStats,
    pub collected_at: DateTime<Utc>,
}

/// The published view, overwritten every successful cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestView {
    pub report: SectorReport,
    #[serde(default)]
    pub enrichment: Vec<EnrichedSector>,
    #[serde(default)]
    pub sector_trends: Vec<SectorTrend>,
    #[serde(default)]
    pub overheat: Option<OverheatAlert>,
    #[serde(default)]
    pub earnings_summary: String,
    pub news_count: usize,
    #[serde(default)]
    pub source_stats: SourceStats,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Published { news_count: usize, sectors: usize },
    TooFewNews { count: usize },
    NoReport,
}

pub struct Pipeline {
    config: PulseConfig,
    analyzer: Box<dyn SectorAnalyzer>,
    market: MarketDataService,
    archiver: Archiver,
}

impl Pipeline {
    pub fn new(config: PulseConfig, analyzer: Box<dyn SectorAnalyzer>, market: MarketDataService) -> Self {
        let archiver = Archiver::new(config.archive_dir.clone(), config.retention());
        Self {
            config,
            analyzer,
            market,
            archiver,
        }
    }

    fn data_path(&self, file: &str) -> PathBuf {
        self.config.data_dir.join(file)
    }

    /// Collect from every registered source, then process the batch.
    ///
    /// The browser is released before processing starts.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let aggregator =
            build_aggregator(&self.config.registry_options()).context("Failed to build news sources")?;
        let news = aggregator.collect_once().await;
        self.process(news, Utc::now()).await
    }

    pub async fn process(&self, news: AggregatedNews, now: DateTime<Utc>) -> Result<CycleOutcome> {
        let today = business_date_of(now);

        let raw = RawNews {
            items: news.records(),
            source_stats: news.source_stats.clone(),
            collected_at: news.collected_at,
        };
        write_json(&self.data_path(NEWS_RAW_FILE), &raw).await?;
        tracing::info!("Collected {} news items: {:?}", news.len(), news.source_stats);

        if news.len() < self.config.min_news_for_analysis {
            tracing::warn!(
                "Not enough news for analysis ({} < {})",
                news.len(),
                self.config.min_news_for_analysis
            );
            return Ok(CycleOutcome::TooFewNews { count: news.len() });
        }

        self.archive_previous(today).await;

        let history = self.load_history(today).await;
        let history_context = format_history_context(&history);
        if let Some(context) = &history_context {
            tracing::info!("History context:\n{}", context);
        }

        let filtered = preprocess(hard_filter(news.items.clone()), now, &self.config.preprocess_options());
        let corpus = if filtered.high_value.is_empty() {
            tracing::warn!("Pre-filter left nothing; analyzing the full collection");
            news.items.as_slice()
        } else {
            filtered.high_value.as_slice()
        };

        let allowed_sectors = self.market.sector_map().await.names();
        let request = AnalysisRequest {
            news: corpus,
            history_context: history_context.as_deref(),
            allowed_sectors: (!allowed_sectors.is_empty()).then_some(allowed_sectors.as_slice()),
        };

        let report = match self.analyzer.analyze(request).await {
            Ok(Some(report)) if report.is_usable() => report,
            Ok(_) => {
                tracing::warn!("Analyzer returned nothing usable");
                return Ok(CycleOutcome::NoReport);
            }
            Err(e) => {
                tracing::error!("Analysis failed: {}", e);
                return Ok(CycleOutcome::NoReport);
            }
        };
        tracing::info!("Analysis complete: {} sectors", report.sectors.len());

        let enrichment =
            enrich_sectors(&self.market, &report.sectors, self.config.enrich_per_sector).await;
        let sector_trends = build_sector_trends(&history, &report.sectors, today);
        let overheat = overheat_alert(&report.sectors);
        if let Some(alert) = &overheat {
            tracing::warn!("Overheat alert: {} ({} sectors)", alert.level, alert.count);
        }

        let sectors = report.sectors.len();
        let latest = LatestView {
            report,
            enrichment,
            sector_trends,
            overheat,
            earnings_summary: filtered.earnings_summary,
            news_count: news.len(),
            source_stats: news.source_stats,
            updated_at: Utc::now(),
        };
        let path = self.data_path(LATEST_FILE);
        write_json(&path, &latest).await?;
        tracing::info!("Saved {}", path.display());

        Ok(CycleOutcome::Published {
            news_count: latest.news_count,
            sectors,
        })
    }

    /// Archive the current `latest.json` under its business date, then sweep.
    ///
    /// Never fails the cycle: a missing or unreadable view only skips archiving.
    async fn archive_previous(&self, today: NaiveDate) {
        let path = self.data_path(LATEST_FILE);
        let previous = match read_latest(&path).await {
            Ok(previous) => previous,
            Err(e) => {
                tracing::warn!("Cannot read previous view {}: {:#}", path.display(), e);
                None
            }
        };

        let archiver = self.archiver.clone();
        let archived = tokio::task::spawn_blocking(move || match previous {
            Some(latest) => {
                let snapshot = ArchiveSnapshot::from_report(
                    business_date_of(latest.updated_at),
                    &latest.report,
                    latest.news_count,
                    latest.source_stats,
                );
                let (outcome, sweep) = archiver.archive_and_sweep(&snapshot, today);
                if let Ok(outcome) = outcome {
                    tracing::info!("Archive {}: {:?}, {:?}", snapshot.date, outcome, sweep);
                }
            }
            None => {
                archiver.sweep(today);
            }
        })
        .await;
        if let Err(e) = archived {
            tracing::error!("Archive task failed: {}", e);
        }
    }

    /// Archived snapshots for the history window, newest first; empty if the read task fails.
    async fn load_history(&self, today: NaiveDate) -> Vec<ArchiveSnapshot> {
        let archiver = self.archiver.clone();
        let days = self.config.history_days;
        match tokio::task::spawn_blocking(move || archiver.load_history(today, days)).await {
            Ok(history) => history,
            Err(e) => {
                tracing::error!("History load task failed: {}", e);
                Vec::new()
            }
        }
    }
}

async fn read_latest(path: &Path) -> Result<Option<LatestView>> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&text)?))
}

/// Write pretty JSON through a sibling temp file so readers never see a partial file.
async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let body = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, body)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
