use async_trait::async_trait;
use tracing::{info, warn};

use crate::external::market_provider::{MarketDataProvider, MarketError};
use crate::models::StockRecord;
use crate::services::retry::RetryPolicy;

/// Primary/fallback pair of market-data providers.
///
/// The primary is tried first; any failure (rate limit, missing ticker,
/// network) falls over to the fallback. Under a retry policy the discipline
/// runs within each leg: the primary exhausts its attempts before the
/// fallback is consulted.
pub struct MultiProvider {
    primary: Box<dyn MarketDataProvider>,
    fallback: Box<dyn MarketDataProvider>,
}

impl MultiProvider {
    pub fn new(primary: Box<dyn MarketDataProvider>, fallback: Box<dyn MarketDataProvider>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl MarketDataProvider for MultiProvider {
    async fn fetch(&self, symbol: &str) -> Result<StockRecord, MarketError> {
        match self.primary.fetch(symbol).await {
            Ok(record) => return Ok(record),
            Err(MarketError::RateLimited) => {
                info!(
                    "⚠️ {} rate limited for {}, trying {}",
                    self.primary.name(),
                    symbol,
                    self.fallback.name()
                );
            }
            Err(e) => {
                warn!(
                    "{} failed for {}: {}. Trying {}",
                    self.primary.name(),
                    symbol,
                    e,
                    self.fallback.name()
                );
            }
        }

        self.fallback.fetch(symbol).await
    }

    async fn fetch_with_policy(
        &self,
        retry: &RetryPolicy,
        symbol: &str,
    ) -> Result<StockRecord, MarketError> {
        match self.primary.fetch_with_policy(retry, symbol).await {
            Ok(record) => Ok(record),
            Err(e) => {
                warn!(
                    "{} exhausted retries for {}: {}. Trying {}",
                    self.primary.name(),
                    symbol,
                    e,
                    self.fallback.name()
                );
                self.fallback.fetch_with_policy(retry, symbol).await
            }
        }
    }

    fn name(&self) -> &'static str {
        "multi"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::market_provider::fetch_or_default;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Fixed(Result<f64, ()>);

    #[async_trait]
    impl MarketDataProvider for Fixed {
        async fn fetch(&self, symbol: &str) -> Result<StockRecord, MarketError> {
            match self.0 {
                Ok(price) => {
                    let mut record = StockRecord::unknown(symbol);
                    record.price = price;
                    Ok(record)
                }
                Err(()) => Err(MarketError::Network("down".into())),
            }
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn primary_result_wins_when_it_succeeds() {
        let multi = MultiProvider::new(Box::new(Fixed(Ok(1.0))), Box::new(Fixed(Ok(2.0))));
        let record = multi.fetch("AAPL").await.unwrap();
        assert_eq!(record.price, 1.0);
    }

    #[tokio::test]
    async fn fallback_is_used_when_primary_fails() {
        let multi = MultiProvider::new(Box::new(Fixed(Err(()))), Box::new(Fixed(Ok(2.0))));
        let record = multi.fetch("AAPL").await.unwrap();
        assert_eq!(record.price, 2.0);
    }

    #[tokio::test]
    async fn error_propagates_when_both_fail() {
        let multi = MultiProvider::new(Box::new(Fixed(Err(()))), Box::new(Fixed(Err(()))));
        assert!(multi.fetch("AAPL").await.is_err());
    }

    struct Recording {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl MarketDataProvider for Recording {
        async fn fetch(&self, _symbol: &str) -> Result<StockRecord, MarketError> {
            self.log.lock().push(self.label);
            Err(MarketError::Network("down".into()))
        }

        fn name(&self) -> &'static str {
            self.label
        }
    }

    #[tokio::test]
    async fn primary_exhausts_retries_before_fallback_is_consulted() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let multi = MultiProvider::new(
            Box::new(Recording {
                label: "primary",
                log: log.clone(),
            }),
            Box::new(Recording {
                label: "fallback",
                log: log.clone(),
            }),
        );

        let record = fetch_or_default(&multi, &RetryPolicy::immediate(3), "AAPL").await;

        assert_eq!(record.sector, "Unknown");
        assert_eq!(
            *log.lock(),
            vec![
                "primary", "primary", "primary", "fallback", "fallback", "fallback"
            ]
        );
    }

    #[tokio::test]
    async fn fallback_is_skipped_when_a_primary_retry_succeeds() {
        struct FlakyPrimary {
            log: Arc<Mutex<Vec<&'static str>>>,
        }

        #[async_trait]
        impl MarketDataProvider for FlakyPrimary {
            async fn fetch(&self, symbol: &str) -> Result<StockRecord, MarketError> {
                let mut log = self.log.lock();
                log.push("primary");
                if log.len() < 2 {
                    return Err(MarketError::RateLimited);
                }
                Ok(StockRecord::unknown(symbol))
            }

            fn name(&self) -> &'static str {
                "flaky"
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let multi = MultiProvider::new(
            Box::new(FlakyPrimary { log: log.clone() }),
            Box::new(Recording {
                label: "fallback",
                log: log.clone(),
            }),
        );

        let result = multi
            .fetch_with_policy(&RetryPolicy::immediate(3), "AAPL")
            .await;

        assert!(result.is_ok());
        assert_eq!(*log.lock(), vec!["primary", "primary"]);
    }
}
