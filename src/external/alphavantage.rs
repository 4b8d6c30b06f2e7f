use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;

use crate::external::market_provider::{ytd_percent, MarketDataProvider, MarketError};
use crate::models::StockRecord;

const BASE_URL: &str = "https://www.alphavantage.co/query";

pub struct AlphaVantageProvider {
    client: reqwest::Client,
    api_key: String,
}

impl AlphaVantageProvider {
    pub fn from_env() -> Result<Self, MarketError> {
        let api_key = std::env::var("ALPHAVANTAGE_API_KEY")
            .map_err(|_| MarketError::BadResponse("ALPHAVANTAGE_API_KEY not set".into()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
        })
    }

    async fn query<T: serde::de::DeserializeOwned>(
        &self,
        params: &[(&str, &str)],
    ) -> Result<T, MarketError> {
        let mut query: Vec<(&str, &str)> = params.to_vec();
        query.push(("apikey", self.api_key.as_str()));

        let resp = self
            .client
            .get(BASE_URL)
            .query(&query)
            .send()
            .await
            .map_err(|e| MarketError::Network(e.to_string()))?;

        resp.json::<T>()
            .await
            .map_err(|e| MarketError::Parse(e.to_string()))
    }

    async fn quote_price(&self, symbol: &str) -> Result<f64, MarketError> {
        let body: AvQuoteResponse = self
            .query(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol)])
            .await?;
        body.check_throttle()?;

        let quote = body
            .global_quote
            .ok_or_else(|| MarketError::BadResponse("missing global quote".into()))?;
        quote
            .price
            .parse::<f64>()
            .map_err(|e| MarketError::Parse(e.to_string()))
    }

    async fn overview(&self, symbol: &str) -> Result<AvOverview, MarketError> {
        let body: AvOverview = self
            .query(&[("function", "OVERVIEW"), ("symbol", symbol)])
            .await?;
        if body.note.is_some() {
            return Err(MarketError::RateLimited);
        }
        Ok(body)
    }

    /// First available close at or after Jan 1 of the current year.
    async fn year_start_price(&self, symbol: &str) -> Result<Option<f64>, MarketError> {
        let body: AvDailyResponse = self
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol),
                ("outputsize", "full"),
            ])
            .await?;

        if body.note.is_some() {
            return Err(MarketError::RateLimited);
        }
        if let Some(msg) = body.error_message {
            return Err(MarketError::BadResponse(msg));
        }

        let series = body
            .time_series
            .ok_or_else(|| MarketError::BadResponse("missing time series".into()))?;

        let year_start = NaiveDate::from_ymd_opt(Utc::now().year(), 1, 1)
            .expect("Jan 1 is always a valid date");

        // BTreeMap iterates date-ascending, so the first entry at or after
        // Jan 1 is the start-of-period price.
        for (date_str, bar) in series {
            let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
                .map_err(|e| MarketError::Parse(e.to_string()))?;
            if date >= year_start {
                let close = bar
                    .close
                    .parse::<f64>()
                    .map_err(|e| MarketError::Parse(e.to_string()))?;
                return Ok(Some(close));
            }
        }

        Ok(None)
    }
}

#[derive(Debug, Deserialize)]
struct AvQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<AvQuote>,

    // When rate-limited Alpha Vantage returns:
    // { "Note": "Thank you for using Alpha Vantage! ... 5 calls per minute ..." }
    #[serde(rename = "Note")]
    note: Option<String>,
}

impl AvQuoteResponse {
    fn check_throttle(&self) -> Result<(), MarketError> {
        if self.note.is_some() {
            return Err(MarketError::RateLimited);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct AvQuote {
    #[serde(rename = "05. price")]
    price: String,
}

#[derive(Debug, Deserialize)]
struct AvOverview {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Sector")]
    sector: Option<String>,
    #[serde(rename = "Industry")]
    industry: Option<String>,
    #[serde(rename = "MarketCapitalization")]
    market_cap: Option<String>,
    #[serde(rename = "PERatio")]
    pe_ratio: Option<String>,
    #[serde(rename = "DividendYield")]
    dividend_yield: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AvDailyResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<BTreeMap<String, AvDailyBar>>,

    #[serde(rename = "Note")]
    note: Option<String>,

    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AvDailyBar {
    #[serde(rename = "4. close")]
    close: String,
}

#[async_trait]
impl MarketDataProvider for AlphaVantageProvider {
    async fn fetch(&self, symbol: &str) -> Result<StockRecord, MarketError> {
        let price = self.quote_price(symbol).await?;
        let overview = self.overview(symbol).await?;
        let year_start = self.year_start_price(symbol).await?;

        let ytd = year_start.map(|s| ytd_percent(s, price)).unwrap_or(0.0);
        let or_unknown = |v: Option<String>| v.unwrap_or_else(|| "Unknown".to_string());

        Ok(StockRecord {
            symbol: symbol.to_string(),
            name: overview.name.unwrap_or_else(|| symbol.to_string()),
            price,
            ytd,
            sector: or_unknown(overview.sector),
            industry: or_unknown(overview.industry),
            market_cap: or_unknown(overview.market_cap),
            pe_ratio: or_unknown(overview.pe_ratio),
            dividend_yield: or_unknown(overview.dividend_yield),
        })
    }

    fn name(&self) -> &'static str {
        "alphavantage"
    }
}
