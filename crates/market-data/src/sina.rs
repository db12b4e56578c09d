//! Sina Finance endpoints: the text quote feed, daily klines and the ETF
//! listing. Quotes are normalized into the Eastmoney record shape.

use async_trait::async_trait;
use pulse_core::round2;
use serde_json::Value;

use crate::error::MarketDataError;
use crate::fetcher::HttpFetcher;
use crate::provider::{
    number, text, BarProvider, ListingProvider, ListingRecord, QuoteProvider, QuoteRecord,
};
use crate::symbols::{bare_code, sina_symbol};

const QUOTE_URL: &str = "https://hq.sinajs.cn/list=";
const KLINE_URL: &str =
    "https://money.finance.sina.com.cn/quotes_service/api/json_v2.php/CN_MarketData.getKLineData";
const LIST_URL: &str =
    "https://vip.stock.finance.sina.com.cn/quotes_service/api/json_v2.php/Market_Center.getHQNodeData";
const REFERER: &str = "https://finance.sina.com.cn";

const LIST_PAGE_SIZE: usize = 100;
const LIST_MAX_PAGES: usize = 15;
const KLINE_LIMIT: &str = "95";

/// Comma-separated quote fields: name, open, previous close, price, ..., amount
const FIELD_PREV_CLOSE: usize = 2;
const FIELD_PRICE: usize = 3;
const FIELD_AMOUNT: usize = 9;

pub struct SinaProvider {
    fetcher: HttpFetcher,
}

impl SinaProvider {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl QuoteProvider for SinaProvider {
    fn name(&self) -> &'static str {
        "sina"
    }

    async fn fetch_quotes(&self, codes: &[String]) -> Result<Vec<QuoteRecord>, MarketDataError> {
        let symbols: Vec<String> = codes.iter().map(|c| sina_symbol(c)).collect();
        let url = format!("{}{}", QUOTE_URL, symbols.join(","));
        let body = self.fetcher.get_text(&url, &[], Some(REFERER), "gbk").await?;
        let quotes = parse_quote_text(&body);
        if quotes.is_empty() {
            return Err(MarketDataError::Empty(url));
        }
        Ok(quotes)
    }
}

#[async_trait]
impl BarProvider for SinaProvider {
    fn name(&self) -> &'static str {
        "sina"
    }

    async fn fetch_closes(&self, code: &str) -> Result<Vec<f64>, MarketDataError> {
        let query = [
            ("symbol", sina_symbol(code)),
            ("scale", "240".to_string()),
            ("ma", "no".to_string()),
            ("datalen", KLINE_LIMIT.to_string()),
        ];
        let payload = self.fetcher.get_json(KLINE_URL, &query, Some(REFERER)).await?;
        let closes = parse_kline_closes(&payload);
        if closes.is_empty() {
            return Err(MarketDataError::Empty(format!("{} kline", code)));
        }
        Ok(closes)
    }
}

#[async_trait]
impl ListingProvider for SinaProvider {
    fn name(&self) -> &'static str {
        "sina"
    }

    async fn fetch_listings(&self) -> Result<Vec<ListingRecord>, MarketDataError> {
        let mut all = Vec::new();
        for page in 1..=LIST_MAX_PAGES {
            let query = [
                ("page", page.to_string()),
                ("num", LIST_PAGE_SIZE.to_string()),
                ("sort", "amount".to_string()),
                ("asc", "0".to_string()),
                ("node", "etf_hq_fund".to_string()),
            ];
            let payload = match self.fetcher.get_json(LIST_URL, &query, Some(REFERER)).await {
                Ok(payload) => payload,
                // Past the last page the endpoint answers with an empty body
                Err(MarketDataError::Empty(_)) if !all.is_empty() => break,
                Err(e) => return Err(e),
            };
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
        tracing::info!("Sina listing returned {} funds", all.len());
        Ok(all)
    }
}

/// Parse `var hq_str_sh518880="name,open,prev_close,price,...";` lines.
///
/// Lines with an empty payload, too few fields or unparseable numbers are
/// skipped. Money-flow fields are not published by this feed and stay zero.
pub fn parse_quote_text(body: &str) -> Vec<QuoteRecord> {
    body.lines()
        .filter_map(|line| {
            let record = parse_quote_line(line);
            if record.is_none() && !line.trim().is_empty() {
                tracing::debug!("Skipping Sina quote line: {}", line);
            }
            record
        })
        .collect()
}

fn parse_quote_line(line: &str) -> Option<QuoteRecord> {
    let (var_part, data_part) = line.split_once('=')?;
    let symbol = var_part.trim().rsplit('_').next()?;
    let code = bare_code(symbol).to_string();
    let data = data_part.trim().trim_end_matches(';').trim_matches('"');
    let fields: Vec<&str> = data.split(',').collect();
    if code.is_empty() || fields.len() <= FIELD_AMOUNT {
        return None;
    }

    let price: f64 = fields[FIELD_PRICE].parse().ok()?;
    let prev_close: f64 = fields[FIELD_PREV_CLOSE].parse().ok()?;
    let amount: f64 = fields[FIELD_AMOUNT].parse().ok()?;
    let change_pct = if prev_close > 0.0 {
        round2((price - prev_close) / prev_close * 100.0)
    } else {
        0.0
    };

    Some(QuoteRecord {
        code,
        name: fields[0].to_string(),
        price,
        change_pct,
        amount,
        turnover: 0.0,
        main_flow: 0.0,
        main_flow_pct: 0.0,
    })
}

/// Closes from `[{"day": ..., "close": "10.2"}, ...]`, oldest first.
pub fn parse_kline_closes(payload: &Value) -> Vec<f64> {
    payload
        .as_array()
        .map(|rows| rows.iter().filter_map(|row| number(&row["close"])).collect())
        .unwrap_or_default()
}

pub fn parse_listing(payload: &Value) -> Vec<ListingRecord> {
    payload
        .as_array()
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    let code = text(&row["code"])
                        .or_else(|| text(&row["symbol"]).map(|s| bare_code(&s).to_string()))?;
                    Some(ListingRecord {
                        name: text(&row["name"]).unwrap_or_default(),
                        amount: number(&row["amount"]).unwrap_or(0.0),
                        code,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}
