//! Analysis API handlers
//!
//! **[DA-API-010]** POST /analyze (multipart ingestion, returns the full
//! result), GET /analyze/status/:session_id (concurrent polling)

use axum::{
    extract::{Multipart, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{
    AnalysisSession, AnalysisStatus, AnalysisType, CadAnalysisResult, Precision,
};
use crate::parsers::FileFormat;
use crate::pipeline;
use crate::AppState;
use drafter_common::events::AnalysisEvent;

/// GET /analyze/status/:session_id response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub session_id: Uuid,
    pub status: AnalysisStatus,
    pub progress: u8,
    pub stage: String,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub elapsed_ms: u64,
}

/// **[DA-API-010]** POST /analyze
///
/// Multipart fields: `file` (binary, required), `precision`
/// (`low|standard|high`), `analysisType`
/// (`standard|detailed|professional|measurement`), `options` (JSON blob
/// with feature toggles). Runs the pipeline and returns the assembled
/// result; progress is observable concurrently via the status endpoint
/// and the SSE stream.
pub async fn start_analysis(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<CadAnalysisResult>> {
    let mut file_name: Option<String> = None;
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut precision = Precision::default();
    let mut analysis_type = AnalysisType::default();
    let mut options_json: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                file_name = field.file_name().map(|n| n.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
                file_bytes = Some(bytes.to_vec());
            }
            "precision" => {
                let text = field.text().await.unwrap_or_default();
                precision = Precision::parse(&text)
                    .ok_or_else(|| ApiError::BadRequest(format!("Unknown precision: {}", text)))?;
            }
            "analysisType" => {
                let text = field.text().await.unwrap_or_default();
                analysis_type = AnalysisType::parse(&text).ok_or_else(|| {
                    ApiError::BadRequest(format!("Unknown analysis type: {}", text))
                })?;
            }
            "options" => {
                options_json = Some(field.text().await.unwrap_or_default());
            }
            other => {
                tracing::debug!(field = other, "Ignoring unknown multipart field");
            }
        }
    }

    // **[DA-ERR-010]** Reject before any session/queue work
    let bytes = file_bytes.ok_or_else(|| ApiError::BadRequest("Missing file field".to_string()))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
    }
    if bytes.len() as u64 > state.config.max_upload_bytes {
        return Err(ApiError::BadRequest(format!(
            "Upload exceeds the {} byte limit",
            state.config.max_upload_bytes
        )));
    }
    let file_name =
        file_name.ok_or_else(|| ApiError::BadRequest("Upload has no file name".to_string()))?;
    let extension = std::path::Path::new(&file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .ok_or_else(|| {
            ApiError::BadRequest(format!("File name has no extension: {}", file_name))
        })?;
    let format = FileFormat::from_extension(&extension)
        .ok_or_else(|| ApiError::BadRequest(format!("Unsupported format: {}", extension)))?;

    let options = pipeline::parse_options(precision, analysis_type, options_json.as_deref())?;

    // Register the session; this request is its single writer
    let session = AnalysisSession::new(
        file_name.clone(),
        extension,
        bytes.len() as u64,
        analysis_type,
    );
    let session_id = session.session_id;
    let started_at = session.started_at;
    state.sessions.put(session);
    state.event_bus.emit(AnalysisEvent::SessionStarted {
        session_id,
        file_name,
        timestamp: started_at,
    });

    tracing::info!(
        session_id = %session_id,
        format = format.as_str(),
        bytes = bytes.len(),
        "Analysis session started"
    );

    let result = pipeline::run_analysis(&state, session_id, format, bytes, options).await;
    if let Err(ref e) = result {
        *state.last_error.write().await = Some(e.to_string());
    }
    result.map(Json)
}

/// GET /analyze/status/:session_id
///
/// Concurrent status polling; reads never block the owning pipeline run.
pub async fn analysis_status(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<StatusResponse>> {
    let session = state
        .sessions
        .get(&session_id)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown session: {}", session_id)))?;

    Ok(Json(StatusResponse {
        session_id: session.session_id,
        status: session.status,
        progress: session.progress,
        stage: session.stage.clone(),
        file_name: session.file_name.clone(),
        error: session.error.clone(),
        started_at: session.started_at,
        elapsed_ms: session.elapsed_ms(),
    }))
}

/// Build analysis routes
pub fn analyze_routes() -> Router<AppState> {
    Router::new()
        .route("/analyze", post(start_analysis))
        .route("/analyze/status/:session_id", get(analysis_status))
}
