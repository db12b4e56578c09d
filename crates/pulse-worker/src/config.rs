use anyhow::{bail, Context, Result};
use market_data::{MarketDataConfig, RetryPolicy};
use news_collectors::{BrowserConfig, PreprocessOptions, RegistryOptions};
use snapshot_archive::RetentionPolicy;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PulseConfig {
    // Analyzer collaborator
    pub analyzer_url: String,
    pub analyzer_api_key: Option<String>,

    // Persisted layout
    pub data_dir: PathBuf,          // data
    pub archive_dir: PathBuf,       // <data_dir>/archive

    // Collection
    pub include_international: bool,
    pub include_rendered: bool,
    pub chrome_executable: Option<PathBuf>,
    pub http_timeout_secs: u64,     // 15

    // Filtering
    pub near_dup_threshold: f64,    // 0.5
    pub news_window_hours: i64,     // 6

    // Market data
    pub bar_cache_ttl_secs: u64,    // 300
    pub sector_index_ttl_secs: u64, // 86400
    pub bar_concurrency: usize,     // 5
    pub quote_retries: u32,         // 3
    pub sector_top_n: usize,        // 5
    pub enrich_per_sector: usize,   // 3

    // Cycle
    pub history_days: i64,          // 7
    pub min_news_for_analysis: usize, // 20
    pub run_interval_secs: u64,     // 0 = run once
}

impl PulseConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = PathBuf::from(lookup("DATA_DIR").unwrap_or_else(|| "data".to_string()));
        let archive_dir = lookup("ARCHIVE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("archive"));

        let config = Self {
            analyzer_url: lookup("ANALYZER_URL")
                .filter(|v| !v.trim().is_empty())
                .context("ANALYZER_URL not set")?,
            analyzer_api_key: lookup("ANALYZER_API_KEY").filter(|v| !v.is_empty()),

            data_dir,
            archive_dir,

            include_international: flag(&lookup, "INCLUDE_INTERNATIONAL", true)?,
            include_rendered: flag(&lookup, "INCLUDE_RENDERED", true)?,
            chrome_executable: lookup("CHROME_EXECUTABLE").map(PathBuf::from),
            http_timeout_secs: parse(&lookup, "HTTP_TIMEOUT_SECS", 15)?,

            near_dup_threshold: parse(&lookup, "NEAR_DUP_THRESHOLD", 0.5)?,
            news_window_hours: parse(&lookup, "NEWS_WINDOW_HOURS", 6)?,

            bar_cache_ttl_secs: parse(&lookup, "BAR_CACHE_TTL_SECS", 300)?,
            sector_index_ttl_secs: parse(&lookup, "SECTOR_INDEX_TTL_SECS", 86_400)?,
            bar_concurrency: parse(&lookup, "BAR_CONCURRENCY", 5)?,
            quote_retries: parse(&lookup, "QUOTE_RETRIES", 3)?,
            sector_top_n: parse(&lookup, "SECTOR_TOP_N", 5)?,
            enrich_per_sector: parse(&lookup, "ENRICH_PER_SECTOR", 3)?,

            history_days: parse(&lookup, "HISTORY_DAYS", 7)?,
            min_news_for_analysis: parse(&lookup, "MIN_NEWS_FOR_ANALYSIS", 20)?,
            run_interval_secs: parse(&lookup, "RUN_INTERVAL_SECS", 0)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.near_dup_threshold) {
            bail!(
                "NEAR_DUP_THRESHOLD must be within 0..=1, got {}",
                self.near_dup_threshold
            );
        }
        if self.bar_concurrency == 0 {
            bail!("BAR_CONCURRENCY must be at least 1");
        }
        if self.quote_retries == 0 {
            bail!("QUOTE_RETRIES must be at least 1");
        }
        if self.history_days < 0 || self.news_window_hours <= 0 {
            bail!("HISTORY_DAYS and NEWS_WINDOW_HOURS must be positive");
        }
        Ok(())
    }

    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            include_international: self.include_international,
            include_rendered: self.include_rendered,
            http_timeout: Duration::from_secs(self.http_timeout_secs),
            browser: BrowserConfig {
                executable: self.chrome_executable.clone(),
                ..BrowserConfig::default()
            },
        }
    }

    pub fn preprocess_options(&self) -> PreprocessOptions {
        PreprocessOptions {
            window_hours: self.news_window_hours,
            near_dup_threshold: self.near_dup_threshold,
        }
    }

    pub fn market_data(&self) -> MarketDataConfig {
        MarketDataConfig {
            bar_ttl: Duration::from_secs(self.bar_cache_ttl_secs),
            sector_ttl: Duration::from_secs(self.sector_index_ttl_secs),
            bar_concurrency: self.bar_concurrency,
            quote_retry: RetryPolicy::with_attempts(self.quote_retries),
            sector_top_n: self.sector_top_n,
            http_timeout: Duration::from_secs(self.http_timeout_secs),
            ..MarketDataConfig::default()
        }
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy::default()
    }

    pub fn run_interval(&self) -> Option<Duration> {
        (self.run_interval_secs > 0).then(|| Duration::from_secs(self.run_interval_secs))
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> Result<bool> {
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => bail!("invalid value for {key}: {v:?}"),
        },
    }
}
