//! External DWG conversion client
//!
//! **[DA-INT-010]** DWG has no in-process parser; the upload is sent to a
//! configured conversion endpoint which returns an equivalent DXF payload.
//! The call is retried up to a small fixed bound with exponential backoff
//! and a per-attempt timeout; exhausting retries surfaces as
//! SERVICE_UNAVAILABLE chaining the last underlying error. The caller's
//! cancellation token aborts the attempt loop between and during attempts.

use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::{ApiError, ApiResult};

const MAX_RETRIES: u32 = 2;
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);
const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Conversion client errors
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Converter returned status {0}: {1}")]
    Api(u16, String),

    #[error("Converter returned an empty payload")]
    EmptyPayload,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP client for the external DWG→DXF conversion service
pub struct ConverterClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl ConverterClient {
    pub fn new(base_url: &str) -> Result<Self, ConvertError> {
        let http_client = reqwest::Client::builder()
            .timeout(ATTEMPT_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Upload a DWG and receive the converted DXF text
    ///
    /// **[DA-INT-010]** Bounded retry with exponential backoff; the last
    /// error is chained into the SERVICE_UNAVAILABLE result for
    /// diagnostics.
    pub async fn convert_to_dxf(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> ApiResult<String> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.dwg")
            .to_string();

        let mut last_error: Option<ConvertError> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let backoff = BACKOFF_BASE * 2u32.pow(attempt - 1);
                tracing::info!(
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "Retrying DWG conversion"
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return Err(ApiError::unavailable("DWG conversion cancelled"));
                    }
                    _ = tokio::time::sleep(backoff) => {}
                }
            }

            let call = self.convert_once(&bytes, &file_name);
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(ApiError::unavailable("DWG conversion cancelled"));
                }
                outcome = call => outcome,
            };

            match outcome {
                Ok(dxf_text) => return Ok(dxf_text),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "DWG conversion attempt failed");
                    last_error = Some(e);
                }
            }
        }

        let err = match last_error {
            Some(e) => ApiError::unavailable_with_source("DWG conversion failed", e),
            None => ApiError::unavailable("DWG conversion failed"),
        };
        Err(err)
    }

    async fn convert_once(&self, bytes: &[u8], file_name: &str) -> Result<String, ConvertError> {
        let part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("target", "dxf");

        let url = format!("{}/convert", self.base_url);
        let response = self.http_client.post(&url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConvertError::Api(status.as_u16(), body));
        }

        let dxf_text = response.text().await?;
        if dxf_text.trim().is_empty() {
            return Err(ConvertError::EmptyPayload);
        }
        Ok(dxf_text)
    }
}
