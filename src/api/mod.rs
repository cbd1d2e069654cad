use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use std::sync::Arc;

pub mod handlers;
pub mod responses;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/predict", get(handlers::get_predict))
        .route("/api/health", get(handlers::get_health))
        .with_state(state)
}
