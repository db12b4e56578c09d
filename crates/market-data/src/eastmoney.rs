//! Eastmoney push endpoints: bulk quotes, daily klines and the fund listing.
//!
//! Quote fields are scaled integers: `f2` price ×1000, `f3` change ×100,
//! `f8` turnover ×100, `f184` main-flow share ×100.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::MarketDataError;
use crate::fetcher::HttpFetcher;
use crate::provider::{
    number, records, text, BarProvider, ListingProvider, ListingRecord, QuoteProvider, QuoteRecord,
};
use crate::symbols::eastmoney_secid;

const QUOTE_URL: &str = "https://push2.eastmoney.com/api/qt/ulist.np/get";
const KLINE_URL: &str = "https://push2his.eastmoney.com/api/qt/stock/kline/get";
const LIST_URL: &str = "https://push2.eastmoney.com/api/qt/clist/get";

const LIST_PAGE_SIZE: usize = 100;
const LIST_MAX_PAGES: usize = 14;
const KLINE_LIMIT: &str = "95";

pub struct EastmoneyProvider {
    fetcher: HttpFetcher,
}

impl EastmoneyProvider {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl QuoteProvider for EastmoneyProvider {
    fn name(&self) -> &'static str {
        "eastmoney"
    }

    async fn fetch_quotes(&self, codes: &[String]) -> Result<Vec<QuoteRecord>, MarketDataError> {
        let secids: Vec<String> = codes.iter().map(|c| eastmoney_secid(c)).collect();
        let query = [
            ("secids", secids.join(",")),
            ("fields", "f12,f14,f2,f3,f6,f8,f62,f184".to_string()),
        ];
        let payload = self.fetcher.get_json(QUOTE_URL, &query, None).await?;
        let quotes = parse_quotes(&payload);
        if quotes.is_empty() {
            return Err(MarketDataError::Empty(QUOTE_URL.to_string()));
        }
        Ok(quotes)
    }
}

#[async_trait]
impl BarProvider for EastmoneyProvider {
    fn name(&self) -> &'static str {
        "eastmoney"
    }

    async fn fetch_closes(&self, code: &str) -> Result<Vec<f64>, MarketDataError> {
        let query = [
            ("secid", eastmoney_secid(code)),
            ("fields1", "f1,f2,f3".to_string()),
            ("fields2", "f51,f52,f53,f54,f55,f56".to_string()),
            ("klt", "101".to_string()),
            ("fqt", "1".to_string()),
            ("end", "20500101".to_string()),
            ("lmt", KLINE_LIMIT.to_string()),
        ];
        let payload = self.fetcher.get_json(KLINE_URL, &query, None).await?;
        let closes = parse_kline_closes(&payload);
        if closes.is_empty() {
            return Err(MarketDataError::Empty(format!("{} kline", code)));
        }
        Ok(closes)
    }
}

#[async_trait]
impl ListingProvider for EastmoneyProvider {
    fn name(&self) -> &'static str {
        "eastmoney"
    }

    async fn fetch_listings(&self) -> Result<Vec<ListingRecord>, MarketDataError> {
        let mut all = Vec::new();
        for page in 1..=LIST_MAX_PAGES {
            let query = [
                ("pn", page.to_string()),
                ("pz", LIST_PAGE_SIZE.to_string()),
                ("fs", "b:MK0021,b:MK0023,b:MK0024".to_string()),
                ("fid", "f6".to_string()),
                ("po", "1".to_string()),
                ("fields", "f12,f14,f6".to_string()),
            ];
            let payload = self.fetcher.get_json(LIST_URL, &query, None).await?;
            let rows = parse_listing(&payload);
            if rows.is_empty() {
                break;
            }
            let short_page = rows.len() < LIST_PAGE_SIZE;
            all.extend(rows);
            if short_page {
                break;
            }
        }
        if all.is_empty() {
            return Err(MarketDataError::Empty(LIST_URL.to_string()));
        }
        tracing::info!("Eastmoney listing returned {} funds", all.len());
        Ok(all)
    }
}

/// Parse `data.diff`; a record without code or price is skipped.
pub fn parse_quotes(payload: &Value) -> Vec<QuoteRecord> {
    records(&payload["data"]["diff"])
        .into_iter()
        .filter_map(|row| {
            let record = parse_quote(row);
            if record.is_none() {
                tracing::debug!("Skipping malformed Eastmoney quote: {}", row);
            }
            record
        })
        .collect()
}

fn parse_quote(row: &Value) -> Option<QuoteRecord> {
    let code = text(&row["f12"])?;
    let price = number(&row["f2"])? / 1000.0;
    let scaled = |field: &str, divisor: f64| number(&row[field]).unwrap_or(0.0) / divisor;
    Some(QuoteRecord {
        name: text(&row["f14"]).unwrap_or_else(|| code.clone()),
        code,
        price,
        change_pct: scaled("f3", 100.0),
        amount: scaled("f6", 1.0),
        turnover: scaled("f8", 100.0),
        main_flow: scaled("f62", 1.0),
        main_flow_pct: scaled("f184", 100.0),
    })
}

/// Closes from `data.klines` (`date,open,close,high,low,volume`), oldest first.
pub fn parse_kline_closes(payload: &Value) -> Vec<f64> {
    payload["data"]["klines"]
        .as_array()
        .map(|lines| {
            lines
                .iter()
                .filter_map(|line| line.as_str()?.split(',').nth(2)?.trim().parse::<f64>().ok())
                .collect()
        })
        .unwrap_or_default()
}

pub fn parse_listing(payload: &Value) -> Vec<ListingRecord> {
    records(&payload["data"]["diff"])
        .into_iter()
        .filter_map(|row| {
            let code = text(&row["f12"])?;
            Some(ListingRecord {
                name: text(&row["f14"]).unwrap_or_default(),
                amount: number(&row["f6"]).unwrap_or(0.0),
                code,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_quotes_unscales_fields() {
        let payload = json!({"data": {"total": 3, "diff": [
            {"f2": 10883, "f3": 125, "f6": 2345678901.0, "f8": 56, "f12": "518880",
             "f14": "黄金ETF", "f62": -12345678.0, "f184": -215},
            {"f2": "-", "f3": "-", "f6": "-", "f12": "159999", "f14": "停牌ETF"},
            {"f2": 1500, "f14": "缺代码"}
        ]}});

        let quotes = parse_quotes(&payload);
        assert_eq!(quotes.len(), 1);
        let q = &quotes[0];
        assert_eq!(q.code, "518880");
        assert!((q.price - 10.883).abs() < 1e-9);
        assert!((q.change_pct - 1.25).abs() < 1e-9);
        assert!((q.turnover - 0.56).abs() < 1e-9);
        assert!((q.main_flow_pct + 2.15).abs() < 1e-9);
        assert_eq!(q.amount, 2345678901.0);
    }

    #[test]
    fn test_parse_quotes_object_diff_and_null_data() {
        let payload = json!({"data": {"diff": {"0": {"f2": 1000, "f12": "512480", "f14": "半导体ETF"}}}});
        assert_eq!(parse_quotes(&payload).len(), 1);
        assert!(parse_quotes(&json!({"data": null})).is_empty());
    }

    #[test]
    fn test_parse_kline_closes() {
        let payload = json!({"data": {"klines": [
            "2025-03-03,10.10,10.20,10.30,10.00,12345",
            "garbage",
            "2025-03-04,10.20,10.50,10.60,10.10,23456"
        ]}});
        assert_eq!(parse_kline_closes(&payload), vec![10.2, 10.5]);
    }

    #[test]
    fn test_parse_listing() {
        let payload = json!({"data": {"diff": [
            {"f12": "512480", "f14": "半导体ETF", "f6": 1.5e9},
            {"f12": "159001", "f14": "货币ETF", "f6": "-"}
        ]}});
        let rows = parse_listing(&payload);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].amount, 0.0);
    }
}
