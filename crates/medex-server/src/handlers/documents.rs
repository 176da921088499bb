use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{error, info, instrument, warn};

use medex_core::api_types::{UploadParams, UploadResponse};

use crate::state::AppState;

fn is_safe_filename(name: &str) -> bool {
    !name.trim().is_empty() && !name.contains('/') && !name.contains('\\') && name != "." && name != ".."
}

/// POST /api/documents?filename=<name> — store the request body under `uploads/<name>`.
#[instrument(skip(state, body), fields(filename = %params.filename, size = body.len()))]
pub async fn upload_document(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> impl IntoResponse {
    if !is_safe_filename(&params.filename) {
        warn!("Rejected upload with invalid filename");
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "filename must be a plain file name" })),
        )
            .into_response();
    }
    if body.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "request body is empty" })),
        )
            .into_response();
    }

    let key = format!("uploads/{}", params.filename);
    let size = body.len();

    match state.store.upload(&key, body.to_vec(), &state.config.mime_type).await {
        Ok(uri) => {
            info!(uri = %uri, "File uploaded successfully");
            (StatusCode::CREATED, Json(UploadResponse { uri, size })).into_response()
        }
        Err(e) => {
            error!(error = %e, "Upload failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": format!("Upload failed: {e}") })),
            )
                .into_response()
        }
    }
}
