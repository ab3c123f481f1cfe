//! Data models for drafter-da

pub mod result;
pub mod session;

pub use result::{
    AiInsights, BimData, BoundingBox, CadAnalysisResult, DetectedDevice, DomainAnalysis,
    DrawingMetadata, EntityCounts, FileInfo, WireSegment, WiringSummary,
};
pub use session::{
    AnalysisSession, AnalysisStatus, AnalysisType, Precision, StateTransition,
};
