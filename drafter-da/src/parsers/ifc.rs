//! IFC (BIM) parser
//!
//! IFC files are STEP-encoded text; each data line instantiates one typed
//! element (`#12=IFCWALL(...)`). This handler tallies the architectural
//! element types into the BIM data block and reads the schema identifier
//! from the FILE_SCHEMA header.

use std::collections::BTreeMap;
use thiserror::Error;

use crate::parsers::NormalizedDrawing;

/// IFC element types worth reporting individually
const TRACKED_ELEMENTS: &[&str] = &[
    "IFCWALL",
    "IFCWALLSTANDARDCASE",
    "IFCDOOR",
    "IFCWINDOW",
    "IFCSLAB",
    "IFCCOLUMN",
    "IFCBEAM",
    "IFCSTAIR",
    "IFCROOF",
    "IFCSPACE",
    "IFCBUILDINGSTOREY",
    "IFCFLOWTERMINAL",
    "IFCLIGHTFIXTURE",
];

/// IFC parse errors
#[derive(Debug, Error)]
pub enum IfcError {
    #[error("Not a STEP-encoded IFC file (missing ISO-10303-21 header)")]
    NotStep,

    #[error("IFC file declares no schema")]
    MissingSchema,
}

/// Parse IFC text into the normalized drawing shape (BIM block populated)
pub fn parse_ifc(content: &str) -> Result<NormalizedDrawing, IfcError> {
    if !content.contains("ISO-10303-21") {
        return Err(IfcError::NotStep);
    }

    let mut drawing = NormalizedDrawing::default();
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut schema: Option<String> = None;

    for raw_line in content.lines() {
        let line = raw_line.trim();

        if line.starts_with("FILE_SCHEMA") {
            // FILE_SCHEMA(('IFC4'));
            schema = line
                .split('\'')
                .nth(1)
                .map(|s| s.to_string())
                .filter(|s| !s.is_empty());
            continue;
        }

        // Data lines: #<id>=<TYPE>(...)
        let Some(eq) = line.find('=') else { continue };
        if !line.starts_with('#') {
            continue;
        }
        let rest = line[eq + 1..].trim_start();
        let type_end = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        let type_name = rest[..type_end].to_uppercase();

        if TRACKED_ELEMENTS.contains(&type_name.as_str()) {
            *counts.entry(canonical_case(&type_name)).or_insert(0) += 1;
        }
        if type_name == "IFCBUILDINGSTOREY" {
            // Storeys double as layer-like grouping for the result shape.
            // Attribute order is GlobalId, OwnerHistory, Name; the Name is
            // the second quoted string on the line.
            if let Some(name) = line.split('\'').nth(3) {
                if !name.is_empty() && !drawing.layers.contains(&name.to_string()) {
                    drawing.layers.push(name.to_string());
                }
            }
        }
    }

    let schema = schema.ok_or(IfcError::MissingSchema)?;
    drawing.bim.schema = schema;
    drawing.bim.element_counts = counts;
    Ok(drawing)
}

/// "IFCWALL" -> "IfcWall" for reporting
fn canonical_case(upper: &str) -> String {
    let body = upper.strip_prefix("IFC").unwrap_or(upper);
    let mut out = String::from("Ifc");
    let mut first = true;
    for c in body.chars() {
        if first {
            out.push(c);
            first = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}
