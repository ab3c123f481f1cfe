//! Normalized analysis result types
//!
//! **[DA-RES-010]** The externally visible output shape shared by every
//! parser variant. Every optional block defaults to an empty-but-well-typed
//! structure, never an absent field, so downstream consumers need no
//! null-checks beyond "is the array empty". Unknown metadata defaults to
//! the "unknown" sentinel rather than null.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Entity tallies keyed by primitive type
///
/// 2D primitives come from vector drawings; faces/edges/vertices/shells/
/// solids come from 3D topology.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounts {
    pub lines: u64,
    pub circles: u64,
    pub arcs: u64,
    pub polylines: u64,
    pub text: u64,
    pub dimensions: u64,
    pub blocks: u64,
    pub faces: u64,
    pub edges: u64,
    pub vertices: u64,
    pub shells: u64,
    pub solids: u64,
}

impl EntityCounts {
    /// Total across all primitive types
    pub fn total(&self) -> u64 {
        self.lines
            + self.circles
            + self.arcs
            + self.polylines
            + self.text
            + self.dimensions
            + self.blocks
            + self.faces
            + self.edges
            + self.vertices
            + self.shells
            + self.solids
    }
}

/// Bounding dimensions with unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    pub unit: String,
}

impl BoundingBox {
    /// Fixed placeholder box used when a drawing carries no extent header
    pub fn placeholder() -> Self {
        Self {
            width: 100.0,
            height: 100.0,
            depth: 0.0,
            unit: "mm".to_string(),
        }
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::placeholder()
    }
}

/// Drawing metadata, best-effort
///
/// All fields default to the "unknown" sentinel rather than null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingMetadata {
    pub author: String,
    pub software: String,
    pub created: String,
    pub modified: String,
}

impl DrawingMetadata {
    pub const UNKNOWN: &'static str = "unknown";
}

impl Default for DrawingMetadata {
    fn default() -> Self {
        Self {
            author: Self::UNKNOWN.to_string(),
            software: Self::UNKNOWN.to_string(),
            created: Self::UNKNOWN.to_string(),
            modified: Self::UNKNOWN.to_string(),
        }
    }
}

/// A device recognized by domain analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedDevice {
    /// Device category (e.g. "outlet", "switch")
    pub device_type: String,
    /// Occurrences in the drawing
    pub count: u64,
    /// Where the device was recognized (layer or block name)
    pub location: String,
}

/// One wiring run contributing to the summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireSegment {
    pub length: f64,
    pub layer: String,
}

/// Wiring length summary with per-segment detail
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WiringSummary {
    pub total_length: f64,
    pub segments: Vec<WireSegment>,
}

/// AI-derived insight block (empty unless the AI stage produced output)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiInsights {
    pub summary: String,
    pub observations: Vec<String>,
    pub suggestions: Vec<String>,
    /// AI self-reported confidence, 0.0 when absent
    pub confidence: f64,
}

impl AiInsights {
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty() && self.observations.is_empty() && self.suggestions.is_empty()
    }
}

/// Domain-specific analysis block (empty unless a domain model ran)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainAnalysis {
    /// Selected domain model (e.g. "electrical"), empty when none ran
    pub domain: String,
    pub findings: Vec<String>,
}

/// BIM-specific data block (populated only for IFC input)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BimData {
    /// IFC schema identifier (e.g. "IFC4"), empty when not BIM input
    pub schema: String,
    /// Element tallies keyed by IFC type (e.g. "IfcWall" -> 12)
    pub element_counts: std::collections::BTreeMap<String, u64>,
}

impl BimData {
    pub fn is_empty(&self) -> bool {
        self.schema.is_empty() && self.element_counts.is_empty()
    }
}

/// Uploaded-file descriptor echoed in the response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub session_id: Uuid,
    pub file_name: String,
    pub format: String,
    pub byte_size: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// **[DA-RES-010]** The assembled analysis result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CadAnalysisResult {
    pub file_info: FileInfo,
    pub entities: EntityCounts,
    /// Layer names in document order, deduplicated
    pub layers: Vec<String>,
    pub dimensions: BoundingBox,
    pub metadata: DrawingMetadata,
    pub devices: Vec<DetectedDevice>,
    pub wiring: WiringSummary,
    pub ai_analysis: AiInsights,
    pub domain_analysis: DomainAnalysis,
    pub bim_data: BimData,
    /// Deterministic complexity score, 0-100
    pub complexity_score: u32,
    /// Base64 SVG thumbnail when requested, omitted otherwise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub processing_time_ms: u64,
}
