use async_trait::async_trait;
use serde_json::Value;

use crate::error::MarketDataError;

/// Quote in the primary provider's shape, already unscaled.
///
/// Providers without money-flow data report zeros for `turnover`,
/// `main_flow` and `main_flow_pct`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRecord {
    pub code: String,
    pub name: String,
    pub price: f64,
    /// Day change, percent
    pub change_pct: f64,
    pub amount: f64,
    /// Turnover rate, percent
    pub turnover: f64,
    pub main_flow: f64,
    pub main_flow_pct: f64,
}

/// One row of an instrument listing used to build the sector index
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRecord {
    pub code: String,
    pub name: String,
    pub amount: f64,
}

/// Bulk latest-quote endpoint.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Quotes for `codes`. An empty answer is reported as [`MarketDataError::Empty`].
    async fn fetch_quotes(&self, codes: &[String]) -> Result<Vec<QuoteRecord>, MarketDataError>;
}

/// Daily bar history.
#[async_trait]
pub trait BarProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Daily closes, oldest first.
    async fn fetch_closes(&self, code: &str) -> Result<Vec<f64>, MarketDataError>;
}

/// Full instrument listing with trading amounts.
#[async_trait]
pub trait ListingProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_listings(&self) -> Result<Vec<ListingRecord>, MarketDataError>;
}

/// Numeric field that may arrive as a number, a numeric string, or `"-"`.
pub(crate) fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Record list that may be a JSON array or an index-keyed object.
pub(crate) fn records(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => Vec::new(),
    }
}
