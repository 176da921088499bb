use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::info;

use medex_core::api_types::HealthResponse;

use crate::state::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    info!("Health check requested");

    let response = HealthResponse {
        status: "ok".to_string(),
        version: VERSION.to_string(),
        processor: state.config.processor_path(),
        bucket: state.config.gcp_bucket_name.clone(),
    };

    (StatusCode::OK, Json(response))
}
