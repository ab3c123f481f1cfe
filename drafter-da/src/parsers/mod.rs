//! Parser / converter dispatch
//!
//! **[DA-PAR-010]** Formats are a closed sum type with one handler per
//! strategy, so adding a format is a localized, exhaustively-checked
//! change. Every handler returns the same `NormalizedDrawing` shape; that
//! uniform contract is what lets the result assembler treat all formats
//! identically.
//!
//! **[DA-PAR-020]** A handler must raise a typed failure rather than
//! return a fabricated result when its prerequisites (configuration,
//! feature flag, reachable service) are not met.

pub mod converter;
pub mod dxf;
pub mod ifc;
pub mod kernel_bridge;
pub mod stl;

pub use converter::ConverterClient;
pub use kernel_bridge::KernelBridgeClient;

use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::error::{ApiError, ApiResult};
use crate::models::{
    BimData, BoundingBox, DrawingMetadata, EntityCounts, Precision, WireSegment,
};
use drafter_common::config::DaConfig;

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    /// 2D vector exchange format (text)
    Dxf,
    /// Opaque binary CAD format, no in-process parser
    Dwg,
    /// Parametric 3D exchange format (STEP AP203/AP214)
    Step,
    /// Parametric 3D surface exchange format
    Iges,
    /// Triangle mesh format (ASCII or binary)
    Stl,
    /// BIM exchange format (STEP-encoded)
    Ifc,
}

/// Extraction strategy for one format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    /// Parsed in-process from the file text/bytes
    DirectText,
    /// Uploaded to an external converter, result re-enters DirectText
    ExternalConversion,
    /// Handed to the geometry kernel bridge
    KernelBridge,
}

impl FileFormat {
    /// Map a declared extension (case-insensitive) to a format
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "dxf" => Some(FileFormat::Dxf),
            "dwg" => Some(FileFormat::Dwg),
            "step" | "stp" => Some(FileFormat::Step),
            "iges" | "igs" => Some(FileFormat::Iges),
            "stl" => Some(FileFormat::Stl),
            "ifc" => Some(FileFormat::Ifc),
            _ => None,
        }
    }

    /// Which handler services this format
    pub fn strategy(&self) -> ParseStrategy {
        match self {
            FileFormat::Dxf | FileFormat::Stl | FileFormat::Ifc => ParseStrategy::DirectText,
            FileFormat::Dwg => ParseStrategy::ExternalConversion,
            FileFormat::Step | FileFormat::Iges => ParseStrategy::KernelBridge,
        }
    }

    /// Canonical lowercase extension
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Dxf => "dxf",
            FileFormat::Dwg => "dwg",
            FileFormat::Step => "step",
            FileFormat::Iges => "iges",
            FileFormat::Stl => "stl",
            FileFormat::Ifc => "ifc",
        }
    }
}

/// The one shape every parser variant normalizes into
#[derive(Debug, Clone, Default)]
pub struct NormalizedDrawing {
    pub entities: EntityCounts,
    /// Layer names in document order, deduplicated
    pub layers: Vec<String>,
    pub dimensions: BoundingBox,
    pub metadata: DrawingMetadata,
    /// BIM block, populated only by the IFC handler
    pub bim: BimData,
    /// Block reference names, feed for domain analysis
    pub block_names: Vec<String>,
    /// Free text found in the drawing, feed for domain analysis
    pub text_fragments: Vec<String>,
    /// Line/polyline runs with lengths, feed for wiring summary
    pub segments: Vec<WireSegment>,
}

/// Polymorphic routing to a format-specific extraction strategy
pub struct ParserDispatch {
    converter: Option<ConverterClient>,
    bridge: Option<KernelBridgeClient>,
}

impl ParserDispatch {
    /// Build from service configuration; unconfigured collaborators stay
    /// `None` and their formats fail fast at parse time
    pub fn from_config(config: &DaConfig) -> Self {
        let converter = config.converter.base_url.as_deref().and_then(|url| {
            ConverterClient::new(url)
                .map_err(|e| tracing::warn!(error = %e, "Converter client init failed"))
                .ok()
        });
        let bridge = if config.kernel_bridge.enabled {
            config.kernel_bridge.url.as_deref().and_then(|url| {
                KernelBridgeClient::new(url)
                    .map_err(|e| tracing::warn!(error = %e, "Kernel bridge client init failed"))
                    .ok()
            })
        } else {
            None
        };
        Self { converter, bridge }
    }

    #[cfg(test)]
    pub fn disabled() -> Self {
        Self {
            converter: None,
            bridge: None,
        }
    }

    /// **[DA-PAR-010]** Route one stored upload through its strategy
    pub async fn parse(
        &self,
        path: &Path,
        format: FileFormat,
        precision: Precision,
        cancel: &CancellationToken,
    ) -> ApiResult<NormalizedDrawing> {
        match format.strategy() {
            ParseStrategy::DirectText => self.parse_direct(path, format, precision).await,
            ParseStrategy::ExternalConversion => {
                let Some(converter) = &self.converter else {
                    return Err(ApiError::unavailable(
                        "DWG conversion service is not configured",
                    ));
                };
                let dxf_text = converter.convert_to_dxf(path, cancel).await?;
                dxf::parse_dxf(&dxf_text, precision)
                    .map_err(|e| ApiError::FileProcessing(e.to_string()))
            }
            ParseStrategy::KernelBridge => {
                let Some(bridge) = &self.bridge else {
                    return Err(ApiError::unavailable(
                        "Geometry kernel bridge is disabled",
                    ));
                };
                bridge.extract(path, format, cancel).await
            }
        }
    }

    async fn parse_direct(
        &self,
        path: &Path,
        format: FileFormat,
        precision: Precision,
    ) -> ApiResult<NormalizedDrawing> {
        match format {
            FileFormat::Dxf => {
                let content = tokio::fs::read_to_string(path).await?;
                dxf::parse_dxf(&content, precision)
                    .map_err(|e| ApiError::FileProcessing(e.to_string()))
            }
            FileFormat::Stl => {
                let bytes = tokio::fs::read(path).await?;
                stl::parse_stl(&bytes).map_err(|e| ApiError::FileProcessing(e.to_string()))
            }
            FileFormat::Ifc => {
                let content = tokio::fs::read_to_string(path).await?;
                ifc::parse_ifc(&content).map_err(|e| ApiError::FileProcessing(e.to_string()))
            }
            // Exhaustiveness: these formats never route to DirectText
            FileFormat::Dwg | FileFormat::Step | FileFormat::Iges => Err(ApiError::Internal(
                format!("{} is not a direct-text format", format.as_str()),
            )),
        }
    }
}
