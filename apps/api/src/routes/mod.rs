pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::generation::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/cv", post(handlers::handle_generate))
        .route("/api/v1/cv/preview", post(handlers::handle_preview))
        .with_state(state)
}
