use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::info;

use crate::models::TaskStatus;

#[derive(Debug, Error)]
#[error("another task is already running: {0}")]
pub struct TaskBusy(pub String);

/// Single-slot register for long-running background jobs.
///
/// At most one job may hold the slot at a time; `start` rejects a second
/// claim while the active job has not called `finish`. The whole status
/// struct sits behind one mutex so pollers never observe a torn update.
#[derive(Clone, Default)]
pub struct TaskTracker {
    inner: Arc<Mutex<TaskStatus>>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot. A finished-but-unreclaimed slot (previous job called
    /// `finish`, no new job started since) may be reclaimed here; an active
    /// slot may not.
    pub fn start(&self, name: &str) -> Result<TaskHandle, TaskBusy> {
        let mut status = self.inner.lock();
        if status.is_active() {
            let active = status.task.clone().unwrap_or_default();
            return Err(TaskBusy(active));
        }

        *status = TaskStatus {
            task: Some(name.to_string()),
            progress: 0,
            total: 0,
            message: String::new(),
            complete: false,
        };
        info!("Task slot claimed: {}", name);

        Ok(TaskHandle {
            inner: self.inner.clone(),
        })
    }

    /// Non-blocking snapshot for pollers.
    pub fn status(&self) -> TaskStatus {
        self.inner.lock().clone()
    }
}

/// Progress reporter owned by the single active job.
#[derive(Clone, Debug)]
pub struct TaskHandle {
    inner: Arc<Mutex<TaskStatus>>,
}

impl TaskHandle {
    /// Last write wins; only the active job is expected to call this.
    pub fn report(&self, progress: u32, total: u32, message: impl Into<String>) {
        let mut status = self.inner.lock();
        status.progress = progress;
        status.total = total;
        status.message = message.into();
    }

    pub fn message(&self, message: impl Into<String>) {
        self.inner.lock().message = message.into();
    }

    /// Terminal update. The task name is kept so pollers can observe which
    /// job completed; the slot is reclaimed by the next successful `start`.
    pub fn finish(&self, message: impl Into<String>) {
        let mut status = self.inner.lock();
        status.message = message.into();
        status.complete = true;
        info!(
            "Task finished: {} - {}",
            status.task.as_deref().unwrap_or("?"),
            status.message
        );
    }
}
