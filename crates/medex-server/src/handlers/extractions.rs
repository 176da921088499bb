use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use medex_core::api_types::{
    ExtractionRequest, ExtractionRunState, ExtractionRunStatus, ExtractionRunsResponse,
    ExtractionTriggerResponse,
};
use medex_core::{InputDocument, MedicalRecord, Result, TransformInput};

use crate::state::AppState;

/// GET /api/extractions — recent runs, newest last.
pub async fn list_runs(State(state): State<AppState>) -> impl IntoResponse {
    let runs = state.runs.read().await.clone();
    (StatusCode::OK, Json(ExtractionRunsResponse { runs }))
}

/// GET /api/extractions/{run_id}
pub async fn get_run(State(state): State<AppState>, Path(run_id): Path<Uuid>) -> impl IntoResponse {
    let runs = state.runs.read().await;
    match runs.iter().find(|r| r.run_id == run_id) {
        Some(run) => (StatusCode::OK, Json(run.clone())).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("Run '{run_id}' not found") })),
        )
            .into_response(),
    }
}

/// POST /api/extractions — start a batch extraction in the background.
/// Returns 202 Accepted immediately with a run_id to poll.
pub async fn trigger_extraction(
    State(state): State<AppState>,
    Json(req): Json<ExtractionRequest>,
) -> impl IntoResponse {
    if req.document_uris.is_empty() {
        warn!("Extraction requested without documents");
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "document_uris must not be empty" })),
        )
            .into_response();
    }

    let mime_type = req.mime_type.clone().unwrap_or_else(|| state.config.mime_type.clone());
    let documents: Vec<InputDocument> = req
        .document_uris
        .iter()
        .map(|uri| InputDocument::new(uri.clone(), mime_type.clone()))
        .collect();

    let run_id = Uuid::new_v4();
    state.record_run(new_run(run_id, &req.document_uris)).await;

    info!(run_id = %run_id, documents = documents.len(), analyze = req.analyze, "Extraction run started");

    let count = documents.len();
    tokio::spawn(async move {
        run_extraction(&state, run_id, &documents, req.analyze, req.transform_input).await;
    });

    (
        StatusCode::ACCEPTED,
        Json(ExtractionTriggerResponse {
            run_id,
            status: ExtractionRunState::Running,
            documents: count,
        }),
    )
        .into_response()
}

fn new_run(run_id: Uuid, document_uris: &[String]) -> ExtractionRunStatus {
    ExtractionRunStatus {
        run_id,
        status: ExtractionRunState::Running,
        document_uris: document_uris.to_vec(),
        started_at: Utc::now(),
        finished_at: None,
        extraction: None,
        record: None,
        error: None,
    }
}

async fn update_run(state: &AppState, run_id: Uuid, apply: impl FnOnce(&mut ExtractionRunStatus)) {
    let mut runs = state.runs.write().await;
    if let Some(run) = runs.iter_mut().find(|r| r.run_id == run_id) {
        apply(run);
    }
}

/// OCR extraction, then the optional record analysis. The extraction is
/// stored on the run as soon as it exists, so a failed analysis keeps it.
async fn extract_and_analyze(
    state: &AppState,
    run_id: Uuid,
    documents: &[InputDocument],
    analyze: bool,
    input: TransformInput,
) -> Result<Option<MedicalRecord>> {
    let extraction = state.pipeline.extract_batch(documents).await?;
    update_run(state, run_id, |run| run.extraction = Some(extraction.clone())).await;

    if !analyze {
        return Ok(None);
    }
    state.analysis.analyze(extraction.collection(input)).await.map(Some)
}

async fn run_extraction(
    state: &AppState,
    run_id: Uuid,
    documents: &[InputDocument],
    analyze: bool,
    input: TransformInput,
) {
    let outcome = extract_and_analyze(state, run_id, documents, analyze, input).await;

    update_run(state, run_id, |run| {
        run.finished_at = Some(Utc::now());
        match outcome {
            Ok(record) => {
                run.status = ExtractionRunState::Completed;
                run.record = record;
                info!(run_id = %run_id, "Extraction run completed");
            }
            Err(e) => {
                run.status = ExtractionRunState::Failed;
                run.error = Some(e.to_string());
                error!(run_id = %run_id, error = %e, "Extraction run failed");
            }
        }
    })
    .await;
}
