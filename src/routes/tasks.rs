use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::models::TaskStatus;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/task-status", get(task_status))
}

/// Polled by clients while a background job runs. Always non-blocking.
async fn task_status(State(state): State<AppState>) -> Json<TaskStatus> {
    Json(state.tasks.status())
}
