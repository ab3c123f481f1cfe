//! Analysis pipeline orchestration
//!
//! **[DA-WF-040]** Owns one session end to end: store the upload, validate
//! the signature before any queue submission, run the parse/enrichment
//! task under the bounded queue, advance the session through its progress
//! checkpoints, assemble the result, and release the temp resource on
//! every exit path.
//!
//! **[DA-ERR-030]** Mandatory-stage failures transition the session to
//! FAILED and surface synchronously. Optional-stage failures (AI/domain)
//! are caught here and degrade to empty result blocks; the session still
//! completes.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::analysis::domain::DomainModel;
use crate::analysis::DomainAnalyzer;
use crate::assembler::{self, EnrichmentBlocks};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AnalysisSession, AnalysisStatus, AnalysisType, CadAnalysisResult, Precision,
};
use crate::parsers::FileFormat;
use crate::thumbnail;
use crate::AppState;
use drafter_common::events::AnalysisEvent;

/// Cache TTL for completed results
const RESULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
/// Cache invalidation tag for all analysis results
pub const RESULT_CACHE_TAG: &str = "cad-results";

/// Feature toggles from the request's `options` JSON blob
#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    pub precision: Precision,
    pub analysis_type: AnalysisType,
    pub include_ai: bool,
    pub include_thumbnail: bool,
    pub domain_model: Option<DomainModel>,
}

/// Run the full pipeline for one upload
///
/// The session must already be registered in the store; this invocation is
/// its single writer.
pub async fn run_analysis(
    state: &AppState,
    session_id: Uuid,
    format: FileFormat,
    bytes: Vec<u8>,
    options: AnalysisOptions,
) -> ApiResult<CadAnalysisResult> {
    let session = state
        .sessions
        .get(&session_id)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown session: {}", session_id)))?;

    // Completed results are cached by upload content hash
    let cache_key = format!("cad:{}:{}", format.as_str(), content_hash(&bytes));
    if let Some(cached) = state.cache.get(&cache_key) {
        if let Ok(result) = serde_json::from_value::<CadAnalysisResult>(cached) {
            tracing::info!(session_id = %session_id, "Result served from cache");
            complete_session(state, session_id);
            return Ok(result);
        }
    }

    // **[DA-TMP-010]** Store before validation so the validator reads from
    // the same resource the parse task will consume.
    let resource = state.temp.store(&session.file_name, &bytes).await?;

    // **[DA-VAL-010]** Signature check short-circuits before any queue
    // submission; expensive work is never scheduled for invalid input.
    let valid = match state.validator.validate(resource.path(), &session.format).await {
        Ok(valid) => valid,
        Err(e) => {
            state.temp.release(&resource).await;
            fail_session(state, session_id, &e.to_string());
            return Err(e);
        }
    };
    if !valid {
        state.temp.release(&resource).await;
        let message = format!(
            "File signature does not match declared format '{}'",
            session.format
        );
        fail_session(state, session_id, &message);
        return Err(ApiError::BadRequest(message));
    }

    set_status(state, session_id, AnalysisStatus::Processing);
    set_progress(state, session_id, 5, "Queued for analysis");

    let task_state = state.clone();
    let task_options = options.clone();
    let task_session = session.clone();
    let outcome = state
        .queue
        .submit(move |cancel| async move {
            let work = analyze_task(
                &task_state,
                &task_session,
                format,
                resource.path().to_path_buf(),
                task_options,
                cancel,
            )
            .await;
            // Release runs on success, error, and timeout alike: the queue
            // spawns this future, so it settles even after the caller has
            // received its TIMEOUT error.
            task_state.temp.release(&resource).await;
            work
        })
        .await;

    match outcome {
        Ok(result) => {
            state.cache.set(
                &cache_key,
                serde_json::to_value(&result).unwrap_or_default(),
                RESULT_CACHE_TTL,
                &[RESULT_CACHE_TAG],
            );
            complete_session(state, session_id);
            Ok(result)
        }
        Err(e) => {
            fail_session(state, session_id, &e.to_string());
            Err(e)
        }
    }
}

/// The queued parse + enrichment task
async fn analyze_task(
    state: &AppState,
    session: &AnalysisSession,
    format: FileFormat,
    path: std::path::PathBuf,
    options: AnalysisOptions,
    cancel: tokio_util::sync::CancellationToken,
) -> ApiResult<CadAnalysisResult> {
    let session_id = session.session_id;
    set_progress(state, session_id, 10, "Reading file metadata");

    // Mandatory stage: parse/convert through the format's strategy
    let drawing = state
        .dispatch
        .parse(&path, format, options.precision, &cancel)
        .await?;
    set_progress(state, session_id, 30, "Extracting entities");

    let mut blocks = EnrichmentBlocks::default();

    // Optional stage: AI insight. Failure leaves the block empty.
    if options.include_ai {
        set_progress(state, session_id, 50, "AI analysis");
        match &state.ai {
            Some(client) => {
                let image = options
                    .include_thumbnail
                    .then(|| thumbnail::render_base64(&drawing));
                match client.analyze(&drawing, image.as_deref(), &cancel).await {
                    Ok(insights) => blocks.ai = Some(insights),
                    Err(e) => {
                        tracing::warn!(
                            session_id = %session_id,
                            error = %e,
                            "AI analysis failed; continuing without insights"
                        );
                    }
                }
            }
            None => {
                tracing::debug!(session_id = %session_id, "AI analysis requested but not configured");
            }
        }
        set_progress(state, session_id, 70, "AI analysis complete");
    }

    // Optional stage: domain-specific enrichment
    if let Some(model) = options.domain_model {
        set_progress(state, session_id, 75, "Domain analysis");
        let analyzer = DomainAnalyzer::new(model);
        blocks.devices = analyzer.detect_devices(&drawing);
        blocks.wiring = Some(analyzer.wiring_summary(&drawing));
        blocks.domain = Some(analyzer.analyze(&drawing));
        set_progress(state, session_id, 85, "Domain analysis complete");
    }

    if options.include_thumbnail {
        set_progress(state, session_id, 90, "Preparing thumbnail");
        blocks.thumbnail = Some(thumbnail::render_base64(&drawing));
    }

    Ok(assembler::assemble(session, drawing, blocks))
}

fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Progress write + event emission; ignored once the session is terminal
fn set_progress(state: &AppState, session_id: Uuid, percent: u8, stage: &str) {
    let written = state.sessions.update(&session_id, &mut |s| {
        s.set_progress(percent, stage);
    });
    if written {
        state.event_bus.emit(AnalysisEvent::ProgressUpdate {
            session_id,
            percent,
            stage: stage.to_string(),
            timestamp: chrono::Utc::now(),
        });
    }
}

fn set_status(state: &AppState, session_id: Uuid, status: AnalysisStatus) {
    state.sessions.update(&session_id, &mut |s| {
        s.transition_to(status);
    });
}

fn complete_session(state: &AppState, session_id: Uuid) {
    let mut elapsed = 0;
    state.sessions.update(&session_id, &mut |s| {
        s.complete();
        elapsed = s.elapsed_ms();
    });
    state.event_bus.emit(AnalysisEvent::SessionCompleted {
        session_id,
        processing_time_ms: elapsed,
        timestamp: chrono::Utc::now(),
    });
    tracing::info!(session_id = %session_id, elapsed_ms = elapsed, "Analysis completed");
}

fn fail_session(state: &AppState, session_id: Uuid, message: &str) {
    state.sessions.update(&session_id, &mut |s| {
        s.fail(message);
    });
    state.event_bus.emit(AnalysisEvent::SessionFailed {
        session_id,
        error: message.to_string(),
        timestamp: chrono::Utc::now(),
    });
    tracing::error!(session_id = %session_id, error = %message, "Analysis failed");
}

/// Parse the multipart `options` JSON blob into feature toggles
pub fn parse_options(
    precision: Precision,
    analysis_type: AnalysisType,
    options_json: Option<&str>,
) -> ApiResult<AnalysisOptions> {
    let mut options = AnalysisOptions {
        precision,
        analysis_type,
        ..Default::default()
    };
    let Some(json) = options_json else {
        return Ok(options);
    };
    if json.trim().is_empty() {
        return Ok(options);
    }
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| ApiError::BadRequest(format!("Invalid options JSON: {}", e)))?;

    options.include_ai = value
        .get("includeAiAnalysis")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    options.include_thumbnail = value
        .get("includeThumbnail")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if let Some(model) = value.get("domainModel").and_then(|v| v.as_str()) {
        options.domain_model = Some(
            DomainModel::parse(model)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown domain model: {}", model)))?,
        );
    }
    Ok(options)
}
