//! Background jobs driven by the single-slot task tracker.
//!
//! Each job claims the slot via `spawn_job`, reports progress through its
//! `TaskHandle`, and is guaranteed to reach `finish` even if the worker
//! errors or panics, so the slot is never left permanently locked.

use std::future::Future;

use crate::services::task_tracker::{TaskBusy, TaskHandle, TaskTracker};

pub mod fetch_data_job;
pub mod recommendations_job;

/// Claim the task slot and run `job` on a background task.
///
/// The worker future runs inside its own `tokio::spawn` so a panic surfaces
/// as a `JoinError` here instead of poisoning anything; every exit path
/// calls `finish`, releasing the slot for the next `start`.
pub fn spawn_job<F, Fut>(tracker: &TaskTracker, name: &str, job: F) -> Result<(), TaskBusy>
where
    F: FnOnce(TaskHandle) -> Fut,
    Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
{
    let handle = tracker.start(name)?;
    let worker = job(handle.clone());

    tokio::spawn(async move {
        match tokio::spawn(worker).await {
            Ok(Ok(message)) => handle.finish(message),
            Ok(Err(e)) => handle.finish(format!("Error: {e:#}")),
            Err(e) => handle.finish(format!("Error: background task aborted: {e}")),
        }
    });

    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::config::Settings;
    use crate::external::ai_provider::FallbackAi;
    use crate::external::market_provider::{MarketDataProvider, MarketError};
    use crate::models::{StockRecord, TaskStatus};
    use crate::services::classifier::SectorClassifier;
    use crate::services::data_store::DataStore;
    use crate::services::recommendation_service::RecommendationEngine;
    use crate::services::task_tracker::TaskTracker;
    use crate::services::upload_service::UploadAnalyzer;
    use crate::state::AppState;

    /// Market provider that always succeeds with a fixed quote and no
    /// sector metadata (like the Yahoo backend).
    pub struct StubMarket;

    #[async_trait]
    impl MarketDataProvider for StubMarket {
        async fn fetch(&self, symbol: &str) -> Result<StockRecord, MarketError> {
            let mut record = StockRecord::unknown(symbol);
            record.price = 100.0;
            record.ytd = 5.0;
            Ok(record)
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    pub fn test_state(dir: &TempDir, ai: FallbackAi) -> AppState {
        let mut settings = Settings::from_env();
        settings.data_dir = dir.path().to_path_buf();
        settings.results_dir = dir.path().join("results");
        settings.uploads_dir = dir.path().join("uploads");
        settings.retry_base_delay = Duration::ZERO;
        settings.classify_min_delay = Duration::ZERO;

        let ai = Arc::new(ai);
        AppState {
            settings: Arc::new(settings.clone()),
            store: Arc::new(DataStore::new(&settings)),
            tasks: Arc::new(TaskTracker::new()),
            market: Arc::new(StubMarket),
            classifier: Arc::new(SectorClassifier::new(ai.clone(), &settings)),
            engine: Arc::new(RecommendationEngine::new(ai.clone(), &settings)),
            analyzer: Arc::new(UploadAnalyzer::new(ai, &settings)),
        }
    }

    pub async fn wait_complete(tracker: &TaskTracker) -> TaskStatus {
        for _ in 0..200 {
            let status = tracker.status();
            if status.complete {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task never completed: {:?}", tracker.status());
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::wait_complete;
    use super::*;

    #[tokio::test]
    async fn successful_job_finishes_with_its_message() {
        let tracker = TaskTracker::new();
        spawn_job(&tracker, "demo", |handle| async move {
            handle.report(1, 1, "working");
            Ok("all done".to_string())
        })
        .unwrap();

        let status = wait_complete(&tracker).await;
        assert_eq!(status.message, "all done");
        assert_eq!(status.task.as_deref(), Some("demo"));
    }

    #[tokio::test]
    async fn failing_job_records_error_and_releases_slot() {
        let tracker = TaskTracker::new();
        spawn_job(&tracker, "doomed", |_handle| async move {
            anyhow::bail!("disk on fire")
        })
        .unwrap();

        let status = wait_complete(&tracker).await;
        assert!(status.message.contains("disk on fire"));

        // The slot must be reclaimable after the failure.
        assert!(tracker.start("next").is_ok());
    }

    #[tokio::test]
    async fn panicking_job_still_releases_slot() {
        let tracker = TaskTracker::new();
        spawn_job(&tracker, "panicky", |_handle| async move {
            panic!("unexpected");
            #[allow(unreachable_code)]
            Ok(String::new())
        })
        .unwrap();

        let status = wait_complete(&tracker).await;
        assert!(status.message.starts_with("Error:"));
        assert!(tracker.start("next").is_ok());
    }

    #[tokio::test]
    async fn second_spawn_is_rejected_while_job_runs() {
        let tracker = TaskTracker::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        spawn_job(&tracker, "slow", |_handle| async move {
            rx.await.ok();
            Ok("done".to_string())
        })
        .unwrap();

        let err = spawn_job(&tracker, "eager", |_| async { Ok(String::new()) }).unwrap_err();
        assert_eq!(err.0, "slow");

        tx.send(()).ok();
        wait_complete(&tracker).await;
    }
}
