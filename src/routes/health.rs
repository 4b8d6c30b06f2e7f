use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/status", get(status))
}

async fn status() -> Json<Value> {
    Json(json!({
        "status": "online",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
