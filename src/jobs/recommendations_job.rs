use crate::services::task_tracker::TaskHandle;
use crate::state::AppState;

pub const TASK_NAME: &str = "Generating recommendations";

/// Resolve the current collection through the data store, run the
/// recommendation engine once, and report the artifact name.
pub async fn run(state: AppState, handle: TaskHandle) -> anyhow::Result<String> {
    handle.report(10, 100, "Loading NASDAQ data...");
    let records = state.store.load();
    if records.is_empty() {
        anyhow::bail!("No stock data available. Please fetch data first.");
    }
    handle.report(
        30,
        100,
        format!("Loaded data for {} companies", records.len()),
    );

    handle.report(40, 100, "Analyzing stock data with AI...");
    let outcome = state
        .engine
        .recommend(&records, state.settings.top_n, state.settings.bottom_n)
        .await?;

    handle.report(100, 100, "Analysis complete");
    let artifact = outcome
        .markdown_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("recommendations")
        .to_string();
    Ok(format!(
        "Analysis complete! Recommendations saved to {artifact}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::ai_provider::test_support::ScriptedAi;
    use crate::external::ai_provider::FallbackAi;
    use crate::jobs::spawn_job;
    use crate::jobs::test_support::{test_state, wait_complete};
    use crate::models::StockRecord;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn record(symbol: &str, ytd: f64) -> StockRecord {
        let mut r = StockRecord::unknown(symbol);
        r.ytd = ytd;
        r.sector = "Technology".to_string();
        r
    }

    #[tokio::test]
    async fn produces_artifact_and_reports_its_name() {
        let dir = TempDir::new().unwrap();
        let state = test_state(
            &dir,
            FallbackAi::new(vec![Arc::new(ScriptedAi::always("Diversify."))]),
        );
        state.store.replace(vec![record("AAPL", 10.0), record("MSFT", -2.0)]);

        let tracker = state.tasks.clone();
        spawn_job(&tracker, TASK_NAME, {
            let state = state.clone();
            move |handle| run(state, handle)
        })
        .unwrap();

        let status = wait_complete(&tracker).await;
        assert!(
            status.message.contains("stock_recommendations_"),
            "unexpected message: {}",
            status.message
        );
        assert_eq!(state.store.list_results().len(), 2);
    }

    #[tokio::test]
    async fn empty_store_finishes_with_error_message() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, FallbackAi::new(vec![]));

        let tracker = state.tasks.clone();
        spawn_job(&tracker, TASK_NAME, {
            let state = state.clone();
            move |handle| run(state, handle)
        })
        .unwrap();

        let status = wait_complete(&tracker).await;
        assert!(status.message.contains("No stock data available"));
        assert!(tracker.start("next").is_ok());
    }

    #[tokio::test]
    async fn missing_ai_provider_is_reported_not_thrown() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, FallbackAi::new(vec![]));
        state.store.replace(vec![record("AAPL", 10.0)]);

        let tracker = state.tasks.clone();
        spawn_job(&tracker, TASK_NAME, {
            let state = state.clone();
            move |handle| run(state, handle)
        })
        .unwrap();

        let status = wait_complete(&tracker).await;
        assert!(
            status.message.contains("No AI provider configured"),
            "unexpected message: {}",
            status.message
        );
    }
}
