use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-source contribution counts, keyed by source display name.
pub type SourceStats = BTreeMap<String, usize>;

/// Origin classification of a news source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Domestic,
    International,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Domestic => "domestic",
            SourceType::International => "international",
        }
    }
}

/// A single news item as produced by a collector.
///
/// `published_at` is always normalized to UTC at the ingestion boundary;
/// `None` means the source gave no usable timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub source: String,
    pub source_type: SourceType,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    pub language: String,
}

impl NewsItem {
    pub fn new(
        title: impl Into<String>,
        source: impl Into<String>,
        source_type: SourceType,
        language: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: String::new(),
            source: source.into(),
            source_type,
            url: None,
            published_at: None,
            language: language.into(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url.filter(|u| !u.trim().is_empty());
        self
    }

    pub fn with_published_at(mut self, published_at: Option<DateTime<Utc>>) -> Self {
        self.published_at = published_at;
        self
    }
}

/// Externally exposed news record (the `news_raw.json` item shape)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsRecord {
    pub title: String,
    pub source: String,
    pub url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl From<&NewsItem> for NewsRecord {
    fn from(item: &NewsItem) -> Self {
        Self {
            title: item.title.clone(),
            source: item.source.clone(),
            url: item.url.clone(),
            published_at: item.published_at,
        }
    }
}

/// Trading heat bucket derived from turnover amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Heat {
    Hot,
    Warm,
    Normal,
    Cold,
}

impl Heat {
    /// Bucket a raw trading amount (CNY).
    pub fn from_amount(amount: f64) -> Self {
        let yi = amount / 1e8;
        if yi >= 50.0 {
            Heat::Hot
        } else if yi >= 20.0 {
            Heat::Warm
        } else if yi >= 5.0 {
            Heat::Normal
        } else {
            Heat::Cold
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Heat::Hot => "极热",
            Heat::Warm => "较热",
            Heat::Normal => "一般",
            Heat::Cold => "冷清",
        }
    }
}

/// Latest quote for one instrument plus multi-horizon percent changes.
///
/// All percentages are expressed in percent (1.25 == +1.25%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change_pct: f64,
    pub change_5d: f64,
    pub change_20d: f64,
    /// Turnover amount in CNY
    pub amount: f64,
    /// Main-force net inflow in CNY
    pub flow: f64,
    /// Main-force net inflow as a share of turnover, percent
    pub flow_pct: f64,
    /// Turnover rate, percent
    pub turnover: f64,
    /// Most recent daily closes, oldest first
    #[serde(default)]
    pub closes: Vec<f64>,
    pub fetched_at: DateTime<Utc>,
}

impl MarketQuote {
    pub fn amount_yi(&self) -> f64 {
        round2(self.amount / 1e8)
    }

    pub fn flow_yi(&self) -> f64 {
        round2(self.flow / 1e8)
    }

    pub fn heat(&self) -> Heat {
        Heat::from_amount(self.amount)
    }
}

/// Instrument shortlist entry handed out with sector enrichment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSummary {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change_pct: f64,
    pub change_5d: f64,
    pub change_20d: f64,
    pub amount: f64,
    pub flow: f64,
    pub heat: String,
    #[serde(default)]
    pub closes: Vec<f64>,
}

impl From<&MarketQuote> for InstrumentSummary {
    fn from(quote: &MarketQuote) -> Self {
        Self {
            symbol: quote.symbol.clone(),
            name: quote.name.clone(),
            price: quote.price,
            change_pct: quote.change_pct,
            change_5d: quote.change_5d,
            change_20d: quote.change_20d,
            amount: quote.amount,
            flow: quote.flow,
            heat: quote.heat().label().to_string(),
            closes: quote.closes.clone(),
        }
    }
}

/// One ranked member of a sector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorMember {
    pub symbol: String,
    pub name: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorEntry {
    pub name: String,
    /// Ranked by trading amount, descending
    pub members: Vec<SectorMember>,
}

/// Sector name → ranked instrument list.
///
/// Sectors keep the order of the classification rule table so that name
/// resolution is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorMap {
    pub sectors: Vec<SectorEntry>,
    pub built_at: Option<DateTime<Utc>>,
}

impl SectorMap {
    pub fn get(&self, name: &str) -> Option<&SectorEntry> {
        self.sectors.iter().find(|s| s.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.sectors.iter().map(|s| s.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sectors.len()
    }
}

/// Sector direction as reported by the analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Direction {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl Direction {
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Bullish => "利好",
            Direction::Bearish => "利空",
            Direction::Neutral => "中性",
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            Direction::Bullish => "↑",
            Direction::Bearish => "↓",
            Direction::Neutral => "→",
        }
    }
}

impl From<String> for Direction {
    fn from(value: String) -> Self {
        match value.trim() {
            "利好" | "bullish" | "Bullish" => Direction::Bullish,
            "利空" | "bearish" | "Bearish" => Direction::Bearish,
            _ => Direction::Neutral,
        }
    }
}

impl From<Direction> for String {
    fn from(value: Direction) -> Self {
        value.label().to_string()
    }
}

/// Per-sector verdict inside an analyzer report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorSignal {
    pub name: String,
    #[serde(default)]
    pub heat: u8,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub signal: String,
    #[serde(default)]
    pub confidence: Option<u8>,
}

/// Structured sector/sentiment report returned by the analyzer collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorReport {
    #[serde(default)]
    pub market_view: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub sentiment: String,
    #[serde(default)]
    pub sectors: Vec<SectorSignal>,
    #[serde(default)]
    pub risk_alerts: Vec<String>,
    #[serde(default)]
    pub opportunity_hints: Vec<String>,
}

impl SectorReport {
    /// A report without any sector verdict carries nothing worth enriching or archiving.
    pub fn is_usable(&self) -> bool {
        !self.sectors.is_empty()
    }
}

/// Condensed sector fact kept in the daily archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorDigest {
    pub name: String,
    pub heat: u8,
    pub direction: Direction,
}

impl From<&SectorSignal> for SectorDigest {
    fn from(signal: &SectorSignal) -> Self {
        Self {
            name: signal.name.clone(),
            heat: signal.heat,
            direction: signal.direction,
        }
    }
}

/// One archived day. Written at most once per business date and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveSnapshot {
    pub date: NaiveDate,
    pub archived_at: DateTime<Utc>,
    #[serde(default)]
    pub market_view: String,
    #[serde(default)]
    pub sentiment: String,
    #[serde(default)]
    pub news_count: usize,
    #[serde(default)]
    pub sectors: Vec<SectorDigest>,
    #[serde(default)]
    pub source_stats: SourceStats,
}

impl ArchiveSnapshot {
    pub fn from_report(
        date: NaiveDate,
        report: &SectorReport,
        news_count: usize,
        source_stats: SourceStats,
    ) -> Self {
        Self {
            date,
            archived_at: Utc::now(),
            market_view: report.market_view.clone(),
            sentiment: report.sentiment.clone(),
            news_count,
            sectors: report.sectors.iter().map(SectorDigest::from).collect(),
            source_stats,
        }
    }

    /// File name used on disk: `YYYY-MM-DD.json`
    pub fn file_name(&self) -> String {
        format!("{}.json", self.date.format("%Y-%m-%d"))
    }
}

/// Round to two decimals, the precision used for every exposed percentage.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heat_buckets() {
        assert_eq!(Heat::from_amount(60e8), Heat::Hot);
        assert_eq!(Heat::from_amount(20e8), Heat::Warm);
        assert_eq!(Heat::from_amount(5e8), Heat::Normal);
        assert_eq!(Heat::from_amount(1e8), Heat::Cold);
    }

    #[test]
    fn test_direction_is_lenient() {
        let signal: SectorSignal =
            serde_json::from_str(r#"{"name":"芯片","heat":4,"direction":"利好"}"#).unwrap();
        assert_eq!(signal.direction, Direction::Bullish);

        let signal: SectorSignal =
            serde_json::from_str(r#"{"name":"黄金","direction":"看情况"}"#).unwrap();
        assert_eq!(signal.direction, Direction::Neutral);
        assert_eq!(signal.heat, 0);
    }

    #[test]
    fn test_snapshot_file_name() {
        let snapshot = ArchiveSnapshot::from_report(
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            &SectorReport::default(),
            0,
            SourceStats::new(),
        );
        assert_eq!(snapshot.file_name(), "2025-03-01.json");
    }

    #[test]
    fn test_news_item_drops_blank_url() {
        let item = NewsItem::new("title", "src", SourceType::Domestic, "zh")
            .with_url(Some("  ".to_string()));
        assert!(item.url.is_none());
    }
}
