use tracing::info;

use crate::external::market_provider::fetch_or_default;
use crate::services::retry::RetryPolicy;
use crate::services::task_tracker::TaskHandle;
use crate::state::AppState;

pub const TASK_NAME: &str = "Fetching stock data";

/// Fetch (or mock) the stock collection, classify missing sectors, and
/// persist the result. Returned string becomes the task's final message.
pub async fn run(
    state: AppState,
    handle: TaskHandle,
    max_stocks: usize,
    use_mock: bool,
) -> anyhow::Result<String> {
    handle.report(0, 0, "Loading NASDAQ symbols...");
    let mut symbols = state.store.load_symbols();
    if symbols.is_empty() {
        anyhow::bail!("No symbols available. Check nasdaq100.csv in the data directory.");
    }
    if max_stocks > 0 && symbols.len() > max_stocks {
        symbols.truncate(max_stocks);
    }
    let total = symbols.len() as u32;

    let mut records = if use_mock {
        handle.report(0, total, "Loading pregenerated mock data...");
        let records = state.store.mock_collection(&symbols);
        handle.report(total, total, "Mock data loaded");
        records
    } else {
        let retry = RetryPolicy::new(
            state.settings.fetch_max_retries,
            state.settings.retry_base_delay,
            state.settings.retry_max_delay,
        );

        let mut records = Vec::with_capacity(symbols.len());
        for (i, symbol) in symbols.iter().enumerate() {
            handle.report(
                i as u32,
                total,
                format!("Fetching {symbol} ({}/{total})...", i + 1),
            );
            records.push(fetch_or_default(state.market.as_ref(), &retry, symbol).await);
        }
        handle.report(total, total, "Fetch complete");
        records
    };

    let unclassified = records.iter().filter(|r| r.needs_sector()).count();
    if unclassified > 0 {
        info!("Classifying sectors for {unclassified} companies");
        for record in records.iter_mut().filter(|r| r.needs_sector()) {
            handle.message(format!("Classifying sector for {}...", record.name));
            record.sector = state.classifier.classify(&record.name).await;
        }
    }

    handle.message("Saving data...");
    let path = state.store.save(&records)?;

    Ok(format!(
        "Data fetching complete! Saved {} records to {}",
        records.len(),
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("data file")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::ai_provider::test_support::ScriptedAi;
    use crate::external::ai_provider::FallbackAi;
    use crate::jobs::spawn_job;
    use crate::jobs::test_support::{test_state, wait_complete};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn live_fetch_classifies_and_saves() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("nasdaq100.csv"), "symbol\nAAPL\nMSFT\n").unwrap();

        let state = test_state(
            &dir,
            FallbackAi::new(vec![Arc::new(ScriptedAi::always("Healthcare"))]),
        );
        let tracker = state.tasks.clone();

        spawn_job(&tracker, TASK_NAME, {
            let state = state.clone();
            move |handle| run(state, handle, 0, false)
        })
        .unwrap();

        let status = wait_complete(&tracker).await;
        assert!(status.message.starts_with("Data fetching complete!"));

        let records = state.store.load();
        assert_eq!(records.len(), 2);
        // StubMarket leaves sectors "Unknown"; the classifier must fill them.
        assert!(records.iter().all(|r| r.sector == "Healthcare"));
        assert!(records.iter().all(|r| r.price == 100.0));
    }

    #[tokio::test]
    async fn mock_fetch_respects_max_stocks() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("nasdaq100.csv"),
            "symbol\nAAPL\nMSFT\nGOOG\n",
        )
        .unwrap();

        let state = test_state(&dir, FallbackAi::new(vec![]));
        let tracker = state.tasks.clone();

        spawn_job(&tracker, TASK_NAME, {
            let state = state.clone();
            move |handle| run(state, handle, 2, true)
        })
        .unwrap();

        wait_complete(&tracker).await;
        assert_eq!(state.store.load().len(), 2);
    }

    #[tokio::test]
    async fn missing_symbols_file_fails_with_clear_message() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, FallbackAi::new(vec![]));
        let tracker = state.tasks.clone();

        spawn_job(&tracker, TASK_NAME, {
            let state = state.clone();
            move |handle| run(state, handle, 0, true)
        })
        .unwrap();

        let status = wait_complete(&tracker).await;
        assert!(status.message.contains("No symbols available"));
        assert!(tracker.start("next").is_ok());
    }
}
