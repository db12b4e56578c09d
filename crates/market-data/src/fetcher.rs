use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::error::MarketDataError;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Thin HTTP layer shared by the concrete providers.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, MarketDataError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// GET and decode the body with `charset` unless the server declares one.
    pub async fn get_text(
        &self,
        url: &str,
        query: &[(&str, String)],
        referer: Option<&str>,
        charset: &str,
    ) -> Result<String, MarketDataError> {
        let mut request = self.client.get(url).query(query);
        if let Some(referer) = referer {
            request = request.header(reqwest::header::REFERER, referer);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(MarketDataError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let text = response.text_with_charset(charset).await?;
        if text.trim().is_empty() {
            return Err(MarketDataError::Empty(url.to_string()));
        }
        Ok(text)
    }

    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        referer: Option<&str>,
    ) -> Result<Value, MarketDataError> {
        let text = self.get_text(url, query, referer, "utf-8").await?;
        Ok(serde_json::from_str(&text)?)
    }
}
