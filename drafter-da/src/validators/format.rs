//! Byte-level format signature validation
//!
//! **[DA-VAL-010]** Confirms a file's declared extension matches its actual
//! signature before any queue submission, so expensive work is never
//! scheduled for invalid input. Text-bearing formats are validated by
//! marker substrings in a fixed prefix; opaque binary formats fall back to
//! a printable-ratio heuristic.

use std::path::Path;
use tokio::io::AsyncReadExt;

use crate::error::ApiResult;
use crate::parsers::FileFormat;

/// How many leading bytes are inspected
const SIGNATURE_PREFIX_LEN: usize = 512;

/// Printable-ASCII ratio above which a prefix is considered text
const PRINTABLE_TEXT_THRESHOLD: f64 = 0.85;

/// Validates declared extensions against file signatures
#[derive(Debug, Clone, Default)]
pub struct FormatValidator;

impl FormatValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a stored upload against its declared extension
    ///
    /// Unknown extensions validate false; read failures propagate.
    pub async fn validate(&self, path: &Path, declared_ext: &str) -> ApiResult<bool> {
        let Some(format) = FileFormat::from_extension(declared_ext) else {
            return Ok(false);
        };

        let mut file = tokio::fs::File::open(path).await?;
        let mut prefix = vec![0u8; SIGNATURE_PREFIX_LEN];
        let n = file.read(&mut prefix).await?;
        prefix.truncate(n);

        Ok(Self::matches_signature(format, &prefix))
    }

    /// Check a prefix against one format's signature rules
    pub fn matches_signature(format: FileFormat, prefix: &[u8]) -> bool {
        if prefix.is_empty() {
            return false;
        }
        let text = String::from_utf8_lossy(prefix);
        let upper = text.to_uppercase();

        match format {
            // 2D exchange format: needs both structural markers
            FileFormat::Dxf => upper.contains("SECTION") && upper.contains("ENTITIES"),

            // Parametric exchange / BIM: standardized STEP header marker
            FileFormat::Step | FileFormat::Ifc => upper.contains("ISO-10303-21"),

            // IGES: fixed-width records carry 'S' in column 73
            FileFormat::Iges => prefix.get(72) == Some(&b'S'),

            // Mesh: ASCII variant declares itself; binary variant is opaque
            FileFormat::Stl => {
                upper.trim_start().starts_with("SOLID") || !Self::is_mostly_printable(prefix)
            }

            // Opaque binary CAD: version magic fast path, else heuristic
            FileFormat::Dwg => {
                prefix.starts_with(b"AC10") || !Self::is_mostly_printable(prefix)
            }
        }
    }

    /// Heuristic for opaque binary formats lacking a reliable text marker
    fn is_mostly_printable(prefix: &[u8]) -> bool {
        if prefix.is_empty() {
            return true;
        }
        let printable = prefix
            .iter()
            .filter(|&&b| (0x20..=0x7e).contains(&b) || b == b'\n' || b == b'\r' || b == b'\t')
            .count();
        (printable as f64 / prefix.len() as f64) >= PRINTABLE_TEXT_THRESHOLD
    }
}
