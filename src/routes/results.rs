use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/results", get(list_results))
        .route("/download/:filename", get(download))
        .route("/view-recommendation/:filename", get(view))
}

async fn list_results(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "files": state.store.list_results() }))
}

/// Serve an artifact as an attachment. The filename is validated before any
/// filesystem access.
async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let path = state.store.result_path(&filename)?;
    if !path.is_file() {
        return Err(AppError::NotFound);
    }

    let bytes = tokio::fs::read(&path).await?;
    let content_type = if filename.ends_with(".md") {
        "text/markdown; charset=utf-8"
    } else {
        "text/plain; charset=utf-8"
    };

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    ))
}

async fn view(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<Value>, AppError> {
    let content = state.store.read_result(&filename)?;
    Ok(Json(json!({ "success": true, "content": content })))
}
