//! Result assembler
//!
//! **[DA-RES-020]** Merges the normalized parser output with whatever
//! optional blocks the enrichment stages produced into the final
//! `CadAnalysisResult`, applying the "never null, default to empty" rule.
//! The complexity score is deterministic so regressions are testable.

use chrono::Utc;

use crate::models::{
    AiInsights, AnalysisSession, BimData, CadAnalysisResult, DomainAnalysis, FileInfo,
    WiringSummary,
};
use crate::parsers::NormalizedDrawing;

/// `min(100, round(entityCount * 0.05 + layerCount * 5))`
pub fn complexity_score(entity_count: u64, layer_count: usize) -> u32 {
    let raw = entity_count as f64 * 0.05 + layer_count as f64 * 5.0;
    (raw.round() as u32).min(100)
}

/// Optional blocks produced by the enrichment stages
#[derive(Debug, Default)]
pub struct EnrichmentBlocks {
    pub ai: Option<AiInsights>,
    pub domain: Option<DomainAnalysis>,
    pub wiring: Option<WiringSummary>,
    pub devices: Vec<crate::models::DetectedDevice>,
    pub thumbnail: Option<String>,
}

/// Assemble the final result for one session
pub fn assemble(
    session: &AnalysisSession,
    drawing: NormalizedDrawing,
    blocks: EnrichmentBlocks,
) -> CadAnalysisResult {
    let entity_total = drawing.entities.total();
    let layer_count = drawing.layers.len();

    CadAnalysisResult {
        file_info: FileInfo {
            session_id: session.session_id,
            file_name: session.file_name.clone(),
            format: session.format.clone(),
            byte_size: session.byte_size,
            uploaded_at: session.started_at,
        },
        entities: drawing.entities,
        layers: drawing.layers,
        dimensions: drawing.dimensions,
        metadata: drawing.metadata,
        devices: blocks.devices,
        wiring: blocks.wiring.unwrap_or_default(),
        ai_analysis: blocks.ai.unwrap_or_default(),
        domain_analysis: blocks.domain.unwrap_or_default(),
        bim_data: if drawing.bim.is_empty() {
            BimData::default()
        } else {
            drawing.bim
        },
        complexity_score: complexity_score(entity_total, layer_count),
        thumbnail: blocks.thumbnail,
        processing_time_ms: (Utc::now() - session.started_at).num_milliseconds().max(0) as u64,
    }
}
