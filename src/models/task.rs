use serde::Serialize;

/// Snapshot of the single background-task slot, as served by
/// `GET /api/task-status`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskStatus {
    pub task: Option<String>,
    pub progress: u32,
    pub total: u32,
    pub message: String,
    pub complete: bool,
}

impl TaskStatus {
    /// An active slot is one that has been claimed and has not finished yet.
    pub fn is_active(&self) -> bool {
        self.task.is_some() && !self.complete
    }
}
