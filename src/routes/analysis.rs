use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;

use crate::errors::AppError;
use crate::jobs::{self, recommendations_job};
use crate::services::upload_service::UploadedFile;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/get-recommendations", post(get_recommendations))
        .route("/upload-files", post(upload_files))
}

/// Kick off the AI recommendation job. Rejected with 409 while another task
/// holds the slot; the response carries the active task's status so the
/// client can resume polling.
async fn get_recommendations(State(state): State<AppState>) -> Response {
    info!("POST /api/get-recommendations");

    let tracker = state.tasks.clone();
    let spawned = jobs::spawn_job(&tracker, recommendations_job::TASK_NAME, {
        let state = state.clone();
        move |handle| recommendations_job::run(state, handle)
    });

    match spawned {
        Ok(()) => Json(json!({
            "success": true,
            "message": "Started generating recommendations",
            "task": recommendations_job::TASK_NAME,
        }))
        .into_response(),
        Err(busy) => (
            StatusCode::CONFLICT,
            Json(json!({
                "success": false,
                "message": format!("Another task is already running: {}", busy.0),
                "task_info": state.tasks.status(),
            })),
        )
            .into_response(),
    }
}

/// Accept a set of documents, persist them, and return one AI analysis over
/// their textual content. Runs inline (not through the task slot): uploads
/// are small and the single AI call bounds the latency.
async fn upload_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?
    {
        let Some(name) = field.file_name().map(|n| n.to_string()) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload {name}: {e}")))?;
        files.push(UploadedFile {
            name,
            bytes: bytes.to_vec(),
        });
    }
    info!("POST /api/upload-files - {} file(s)", files.len());

    let analysis = state.analyzer.analyze(&state.store, files).await?;
    Ok(Json(json!({ "success": true, "analysis": analysis })))
}
