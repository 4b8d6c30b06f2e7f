use async_trait::async_trait;
use serde::Deserialize;

use crate::external::market_provider::{ytd_percent, MarketDataProvider, MarketError};
use crate::models::StockRecord;

/// Yahoo Finance chart API. Free, no API key, but offers no sector or
/// fundamentals metadata; those fields come back "Unknown" and are filled
/// in by the sector classifier downstream.
pub struct YahooProvider {
    client: reqwest::Client,
}

impl YahooProvider {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

// Minimal response structs (only what we need)
#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct YahooResult {
    meta: YahooMeta,
    indicators: YahooIndicators,
}

#[derive(Debug, Deserialize)]
struct YahooMeta {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    #[serde(rename = "shortName")]
    short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YahooIndicators {
    quote: Vec<YahooQuote>,
}

#[derive(Debug, Deserialize)]
struct YahooQuote {
    close: Vec<Option<f64>>,
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    async fn fetch(&self, symbol: &str) -> Result<StockRecord, MarketError> {
        // range=ytd starts the series at the first trading day of the year,
        // which is exactly the start-of-period price we need.
        let url = format!(
            "https://query1.finance.yahoo.com/v8/finance/chart/{symbol}?range=ytd&interval=1d"
        );

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MarketError::Network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketError::RateLimited);
        }

        let body = resp
            .json::<YahooChartResponse>()
            .await
            .map_err(|e| MarketError::Parse(e.to_string()))?;

        if let Some(err) = body.chart.error {
            return Err(MarketError::BadResponse(err.to_string()));
        }

        let result = body
            .chart
            .result
            .and_then(|mut r| r.pop())
            .ok_or_else(|| MarketError::BadResponse("missing result".into()))?;

        let closes = &result
            .indicators
            .quote
            .first()
            .ok_or_else(|| MarketError::BadResponse("missing quote".into()))?
            .close;

        let year_start = closes.iter().flatten().copied().next();
        let current = result
            .meta
            .regular_market_price
            .or_else(|| closes.iter().flatten().copied().last())
            .ok_or_else(|| MarketError::BadResponse("no price data".into()))?;

        let ytd = year_start.map(|s| ytd_percent(s, current)).unwrap_or(0.0);

        let mut record = StockRecord::unknown(symbol);
        record.name = result.meta.short_name.unwrap_or_else(|| symbol.to_string());
        record.price = current;
        record.ytd = ytd;
        Ok(record)
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }
}
