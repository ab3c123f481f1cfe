//! Geometry kernel bridge client (STEP/IGES)
//!
//! **[DA-PAR-040]** Gated behind an explicit enablement flag. The bridge
//! returns its native document as JSON; different bridge versions name the
//! same topology fields differently, so all of that guesswork is isolated
//! in one normalizing adapter (`normalize_document`). A missing optional
//! field falls back to a zeroed default, never an error. Failing to reach
//! the bridge at all is SERVICE_UNAVAILABLE; a bridge that received the
//! file and rejected it (4xx) is a processing failure of that upload.

use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::{ApiError, ApiResult};
use crate::models::{BoundingBox, DrawingMetadata};
use crate::parsers::{FileFormat, NormalizedDrawing};

const BRIDGE_TIMEOUT: Duration = Duration::from_secs(60);

/// Kernel bridge client errors
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Bridge returned status {0}: {1}")]
    Api(u16, String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP client for the geometry kernel bridge service
pub struct KernelBridgeClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl KernelBridgeClient {
    pub fn new(base_url: &str) -> Result<Self, BridgeError> {
        let http_client = reqwest::Client::builder()
            .timeout(BRIDGE_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Hand the file to the bridge and normalize its document
    pub async fn extract(
        &self,
        path: &Path,
        format: FileFormat,
        cancel: &CancellationToken,
    ) -> ApiResult<NormalizedDrawing> {
        let bytes = tokio::fs::read(path).await?;
        let call = self.extract_once(&bytes, format);
        let document = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(ApiError::unavailable("Kernel bridge call cancelled"));
            }
            outcome = call => outcome.map_err(bridge_failure)?,
        };
        Ok(normalize_document(&document))
    }

    async fn extract_once(
        &self,
        bytes: &[u8],
        format: FileFormat,
    ) -> Result<serde_json::Value, BridgeError> {
        let url = format!("{}/extract?format={}", self.base_url, format.as_str());
        let response = self
            .http_client
            .post(&url)
            .header("content-type", "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Api(status.as_u16(), body));
        }
        Ok(response.json().await?)
    }
}

/// Classify a bridge call failure
///
/// A 4xx from the bridge means it received the file and rejected it as
/// unparsable; that is a processing failure of this upload. Network
/// errors and 5xx responses mean the bridge itself is unavailable.
fn bridge_failure(err: BridgeError) -> ApiError {
    match err {
        BridgeError::Api(status, body) if (400..500).contains(&status) => {
            ApiError::FileProcessing(format!("Kernel bridge rejected the file ({}): {}", status, body))
        }
        other => ApiError::unavailable_with_source("Kernel bridge unreachable", other),
    }
}

/// **[DA-PAR-050]** The one place that knows the bridge's field-name
/// variants. Everything else consumes the well-typed normalized shape.
pub fn normalize_document(doc: &serde_json::Value) -> NormalizedDrawing {
    let mut drawing = NormalizedDrawing::default();

    drawing.entities.faces = count_field(doc, &["faces", "faceCount", "nb_faces", "numFaces"]);
    drawing.entities.edges = count_field(doc, &["edges", "edgeCount", "nb_edges", "numEdges"]);
    drawing.entities.vertices = count_field(
        doc,
        &["vertices", "vertexCount", "nb_vertices", "numVertices"],
    );
    drawing.entities.shells = count_field(doc, &["shells", "shellCount", "nb_shells"]);
    drawing.entities.solids = count_field(doc, &["solids", "solidCount", "nb_solids", "bodies"]);

    drawing.dimensions = bounding_box(doc).unwrap_or_else(BoundingBox::placeholder);
    drawing.metadata = metadata(doc);
    drawing
}

/// Best-effort numeric lookup across known alternative field names
///
/// Values may sit at the top level or under a "topology"/"stats" object,
/// and may be a number or a list to count.
fn count_field(doc: &serde_json::Value, names: &[&str]) -> u64 {
    let scopes = [
        Some(doc),
        doc.get("topology"),
        doc.get("stats"),
        doc.get("document"),
    ];
    for scope in scopes.into_iter().flatten() {
        for name in names {
            match scope.get(name) {
                Some(serde_json::Value::Number(n)) => {
                    if let Some(v) = n.as_u64() {
                        return v;
                    }
                }
                Some(serde_json::Value::Array(items)) => return items.len() as u64,
                _ => {}
            }
        }
    }
    0
}

fn bounding_box(doc: &serde_json::Value) -> Option<BoundingBox> {
    let bbox = doc
        .get("boundingBox")
        .or_else(|| doc.get("bbox"))
        .or_else(|| doc.get("bounds"))?;

    let axis = |names: &[&str]| -> Option<f64> {
        for name in names {
            if let Some(v) = bbox.get(name).and_then(|v| v.as_f64()) {
                return Some(v);
            }
        }
        None
    };

    // Either explicit spans or min/max corner pairs
    let (width, height, depth) = match (
        axis(&["width", "dx", "x"]),
        axis(&["height", "dy", "y"]),
        axis(&["depth", "dz", "z"]),
    ) {
        (Some(w), Some(h), d) => (w, h, d.unwrap_or(0.0)),
        _ => {
            let corner = |key: &str, idx: usize| -> Option<f64> {
                bbox.get(key)?.as_array()?.get(idx)?.as_f64()
            };
            let span = |idx: usize| -> Option<f64> {
                Some((corner("max", idx)? - corner("min", idx)?).abs())
            };
            (span(0)?, span(1)?, span(2).unwrap_or(0.0))
        }
    };

    let unit = bbox
        .get("unit")
        .or_else(|| doc.get("unit"))
        .or_else(|| doc.get("units"))
        .and_then(|v| v.as_str())
        .unwrap_or("mm")
        .to_string();

    Some(BoundingBox {
        width,
        height,
        depth,
        unit,
    })
}

fn metadata(doc: &serde_json::Value) -> DrawingMetadata {
    let mut meta = DrawingMetadata::default();
    let header = doc.get("header").or_else(|| doc.get("metadata"));
    if let Some(header) = header {
        let field = |names: &[&str]| -> Option<String> {
            for name in names {
                if let Some(v) = header.get(name).and_then(|v| v.as_str()) {
                    if !v.trim().is_empty() {
                        return Some(v.to_string());
                    }
                }
            }
            None
        };
        if let Some(author) = field(&["author", "originatingAuthor", "created_by"]) {
            meta.author = author;
        }
        if let Some(software) = field(&["software", "originatingSystem", "application"]) {
            meta.software = software;
        }
        if let Some(created) = field(&["created", "timestamp", "creationDate"]) {
            meta.created = created;
        }
    }
    meta
}
