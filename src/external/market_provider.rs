use async_trait::async_trait;
use thiserror::Error;

use crate::models::StockRecord;
use crate::services::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("network error: {0}")]
    Network(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited")]
    RateLimited,
}

/// One external quote/overview source, normalized into `StockRecord`.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch(&self, symbol: &str) -> Result<StockRecord, MarketError>;

    /// Apply the retry discipline for this provider: a single backend
    /// retries `fetch` to exhaustion. Compositions override this so the
    /// policy runs within each leg before falling over.
    async fn fetch_with_policy(
        &self,
        retry: &RetryPolicy,
        symbol: &str,
    ) -> Result<StockRecord, MarketError> {
        retry
            .run(&format!("fetch {symbol} via {}", self.name()), |_| {
                self.fetch(symbol)
            })
            .await
    }

    fn name(&self) -> &'static str;
}

/// Year-to-date change in percent. A missing or non-positive start price
/// yields 0 so degraded series never divide by zero.
pub fn ytd_percent(year_start: f64, current: f64) -> f64 {
    if year_start <= 0.0 {
        return 0.0;
    }
    (current - year_start) / year_start * 100.0
}

/// Fetch through the provider's retry discipline; on exhaustion the failure
/// is encoded as a sentinel record instead of an error. Callers never see a
/// hard failure from this path.
pub async fn fetch_or_default(
    provider: &dyn MarketDataProvider,
    retry: &RetryPolicy,
    symbol: &str,
) -> StockRecord {
    match provider.fetch_with_policy(retry, symbol).await {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(
                "Giving up on {} after retries ({}); recording sentinel",
                symbol,
                e
            );
            StockRecord::unknown(symbol)
        }
    }
}
