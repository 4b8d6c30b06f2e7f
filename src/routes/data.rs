use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::errors::AppError;
use crate::jobs::{self, fetch_data_job};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/data-status", get(data_status))
        .route("/fetch-data", post(fetch_data))
        .route("/mock-data", get(mock_data))
        .route("/stocks", get(stocks))
}

async fn data_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "has_data": state.store.has_data() }))
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FetchDataRequest {
    max_stocks: Option<usize>,
    use_mock_data: bool,
}

/// Kick off the data-fetch background job. Rejected with 400 while another
/// task holds the slot.
async fn fetch_data(
    State(state): State<AppState>,
    Json(req): Json<FetchDataRequest>,
) -> Response {
    let max_stocks = req.max_stocks.unwrap_or(state.settings.max_stocks_default);
    let use_mock = req.use_mock_data;
    info!(
        "POST /api/fetch-data - max_stocks={max_stocks}, use_mock_data={use_mock}"
    );

    let tracker = state.tasks.clone();
    let spawned = jobs::spawn_job(&tracker, fetch_data_job::TASK_NAME, {
        let state = state.clone();
        move |handle| fetch_data_job::run(state, handle, max_stocks, use_mock)
    });

    match spawned {
        Ok(()) => Json(json!({
            "success": true,
            "message": "Started fetching stock data",
        }))
        .into_response(),
        Err(busy) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": format!("Another task is already running: {}", busy.0),
            })),
        )
            .into_response(),
    }
}

async fn mock_data(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let stocks = state
        .store
        .load_mock()
        .map_err(|e| AppError::Internal(format!("Error loading mock data: {e:#}")))?;

    Ok(Json(json!({
        "success": true,
        "count": stocks.len(),
        "stocks": stocks,
    })))
}

async fn stocks(State(state): State<AppState>) -> Json<Value> {
    let stocks = state.store.load();
    Json(json!({
        "success": true,
        "count": stocks.len(),
        "stocks": &*stocks,
    }))
}
