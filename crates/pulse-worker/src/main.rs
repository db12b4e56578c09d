use std::time::Duration;

use anyhow::{Context, Result};
use market_data::MarketDataService;
use tokio::signal::unix::SignalKind;
use tokio::time;

mod analyzer;
mod config;
mod enrich;
mod pipeline;
#[cfg(test)]
mod testing;

use analyzer::HttpAnalyzer;
use config::PulseConfig;
use pipeline::{CycleOutcome, Pipeline};

/// Analyzer calls carry the whole corpus and may take a while
const ANALYZER_TIMEOUT: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    // Panic hook: log panic info before crashing
    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("Starting market pulse worker");

    // 2. Configuration
    let config = PulseConfig::from_env()?;
    tracing::info!("Configuration loaded");
    tracing::info!("  Data dir: {}", config.data_dir.display());
    tracing::info!("  Archive dir: {}", config.archive_dir.display());
    tracing::info!(
        "  Sources: international={} rendered={}",
        config.include_international,
        config.include_rendered
    );
    tracing::info!("  Min news for analysis: {}", config.min_news_for_analysis);

    // 3. Collaborators
    let analyzer = HttpAnalyzer::new(
        config.analyzer_url.clone(),
        config.analyzer_api_key.clone(),
        ANALYZER_TIMEOUT,
    )
    .context("Failed to create analyzer client")?;
    let market =
        MarketDataService::public(config.market_data()).context("Failed to create market data client")?;

    let interval = config.run_interval();
    let pipeline = Pipeline::new(config, Box::new(analyzer), market);

    // 4. Run once, or loop until SIGINT / SIGTERM
    let Some(period) = interval else {
        run_and_log(&pipeline).await;
        return Ok(());
    };

    tracing::info!("Running every {} seconds", period.as_secs());
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    let shutdown = async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_and_log(&pipeline).await;
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received, exiting gracefully...");
                break;
            }
        }
    }

    tracing::info!("Worker shut down.");
    Ok(())
}

async fn run_and_log(pipeline: &Pipeline) {
    match pipeline.run_cycle().await {
        Ok(CycleOutcome::Published { news_count, sectors }) => {
            tracing::info!("Cycle done: {} news, {} sectors published", news_count, sectors);
        }
        Ok(CycleOutcome::TooFewNews { count }) => {
            tracing::info!("Cycle skipped: only {} news items", count);
        }
        Ok(CycleOutcome::NoReport) => {
            tracing::info!("Cycle ended without a report");
        }
        Err(e) => {
            tracing::error!("Error in cycle: {:#}", e);
        }
    }
}
