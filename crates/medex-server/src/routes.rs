use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::state::AppState;

pub fn create_router() -> Router<AppState> {
    Router::new()
        // Health
        .route("/api/health", get(handlers::health::health_check))
        // Uploads
        .route("/api/documents", post(handlers::documents::upload_document))
        // Extractions
        .route(
            "/api/extractions",
            get(handlers::extractions::list_runs).post(handlers::extractions::trigger_extraction),
        )
        .route("/api/extractions/{run_id}", get(handlers::extractions::get_run))
}
