use axum::Router;
use tower_http::cors::CorsLayer;

use crate::routes::{analysis, data, health, results, tasks};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    let api = Router::new()
        .merge(health::router())
        .merge(data::router())
        .merge(tasks::router())
        .merge(results::router())
        .merge(analysis::router());

    Router::<AppState>::new()
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
