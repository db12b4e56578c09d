use async_trait::async_trait;
use crate::{NewsItem, PulseError, SectorReport};

/// Input handed to the report generator
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    pub news: &'a [NewsItem],
    /// Compressed history of recent archived days
    pub history_context: Option<&'a str>,
    /// Sector names the report may use
    pub allowed_sectors: Option<&'a [String]>,
}

/// Trait for the sector report generator.
///
/// `Ok(None)` means the analyzer answered but produced nothing usable.
#[async_trait]
pub trait SectorAnalyzer: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest<'_>) -> Result<Option<SectorReport>, PulseError>;
}
