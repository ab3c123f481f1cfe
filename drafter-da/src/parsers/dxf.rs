//! Direct-text DXF parser
//!
//! **[DA-PAR-030]** Entity counts are tallied from parsed-record type tags
//! in the ENTITIES section, layer names come from the TABLES layer table,
//! and the bounding box is derived from the $EXTMIN/$EXTMAX header
//! variables, defaulting to the fixed placeholder box when absent.
//!
//! DXF is a sequence of (group code, value) line pairs. The reader walks
//! the pairs once, tracking which section it is in; malformed pairs at the
//! tail are tolerated.

use thiserror::Error;

use crate::models::{BoundingBox, DrawingMetadata, Precision, WireSegment};
use crate::parsers::NormalizedDrawing;

/// DXF parse errors
#[derive(Debug, Error)]
pub enum DxfError {
    #[error("DXF document is empty")]
    Empty,

    #[error("DXF document has no ENTITIES section")]
    MissingEntities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Header,
    Tables,
    Entities,
    Other,
}

/// Geometry accumulated for the entity currently being read
#[derive(Debug, Default)]
struct PendingEntity {
    kind: String,
    layer: String,
    // LINE endpoints (codes 10/20 and 11/21)
    x1: Option<f64>,
    y1: Option<f64>,
    x2: Option<f64>,
    y2: Option<f64>,
    // Polyline vertices in order (repeated 10/20 pairs)
    vertices: Vec<(f64, f64)>,
    text: Option<String>,
    block_name: Option<String>,
}

/// Parse DXF text into the normalized drawing shape
pub fn parse_dxf(content: &str, precision: Precision) -> Result<NormalizedDrawing, DxfError> {
    if content.trim().is_empty() {
        return Err(DxfError::Empty);
    }

    let mut drawing = NormalizedDrawing::default();
    let mut section = Section::None;
    let mut saw_entities = false;

    // HEADER state
    let mut header_var = String::new();
    let mut ext_min: (Option<f64>, Option<f64>, Option<f64>) = (None, None, None);
    let mut ext_max: (Option<f64>, Option<f64>, Option<f64>) = (None, None, None);
    let mut insunits: Option<i64> = None;
    let mut acad_ver: Option<String> = None;
    let mut saved_by: Option<String> = None;
    let mut td_create: Option<f64> = None;
    let mut td_update: Option<f64> = None;

    // TABLES state: last type tag seen, so layer names are only taken from
    // LAYER records (the table head itself is (2, "LAYER") after (0, "TABLE"))
    let mut last_table_record = String::new();

    // ENTITIES state
    let mut pending: Option<PendingEntity> = None;

    let mut lines = content.lines();
    while let Some(code_line) = lines.next() {
        let Some(value_line) = lines.next() else {
            break; // trailing unpaired group code
        };
        let Ok(code) = code_line.trim().parse::<i32>() else {
            continue;
        };
        let value = value_line.trim();

        // Section bookkeeping
        if code == 0 && value.eq_ignore_ascii_case("ENDSEC") {
            if section == Section::Entities {
                finalize_entity(&mut drawing, pending.take(), precision);
            }
            section = Section::None;
            continue;
        }
        if code == 2 && section == Section::None {
            section = match value.to_uppercase().as_str() {
                "HEADER" => Section::Header,
                "TABLES" => Section::Tables,
                "ENTITIES" => {
                    saw_entities = true;
                    Section::Entities
                }
                _ => Section::Other,
            };
            continue;
        }

        match section {
            Section::Header => match code {
                9 => header_var = value.to_uppercase(),
                10 | 20 | 30 => {
                    let coord = value.parse::<f64>().ok();
                    let target = match header_var.as_str() {
                        "$EXTMIN" => Some(&mut ext_min),
                        "$EXTMAX" => Some(&mut ext_max),
                        _ => None,
                    };
                    if let Some(target) = target {
                        match code {
                            10 => target.0 = coord,
                            20 => target.1 = coord,
                            _ => target.2 = coord,
                        }
                    }
                }
                70 if header_var == "$INSUNITS" => insunits = value.parse().ok(),
                1 if header_var == "$ACADVER" => acad_ver = Some(value.to_string()),
                1 if header_var == "$LASTSAVEDBY" => saved_by = Some(value.to_string()),
                40 if header_var == "$TDCREATE" => td_create = value.parse().ok(),
                40 if header_var == "$TDUPDATE" => td_update = value.parse().ok(),
                _ => {}
            },
            Section::Tables => match code {
                0 => last_table_record = value.to_uppercase(),
                2 if last_table_record == "LAYER" => {
                    let name = value.to_string();
                    if !name.is_empty() && !drawing.layers.contains(&name) {
                        drawing.layers.push(name);
                    }
                }
                _ => {}
            },
            Section::Entities => {
                if code == 0 {
                    finalize_entity(&mut drawing, pending.take(), precision);
                    pending = Some(PendingEntity {
                        kind: value.to_uppercase(),
                        ..Default::default()
                    });
                } else if let Some(entity) = pending.as_mut() {
                    collect_entity_field(entity, code, value);
                }
            }
            Section::None | Section::Other => {}
        }
    }
    finalize_entity(&mut drawing, pending.take(), precision);

    if !saw_entities {
        return Err(DxfError::MissingEntities);
    }

    drawing.dimensions = bounding_box(ext_min, ext_max, insunits);
    drawing.metadata = metadata(acad_ver, saved_by, td_create, td_update);
    Ok(drawing)
}

fn collect_entity_field(entity: &mut PendingEntity, code: i32, value: &str) {
    match code {
        8 => entity.layer = value.to_string(),
        10 => {
            let x = value.parse().ok();
            if entity.kind == "LWPOLYLINE" || entity.kind == "VERTEX" {
                if let Some(x) = x {
                    entity.vertices.push((x, 0.0));
                }
            } else {
                entity.x1 = x;
            }
        }
        20 => {
            let y = value.parse::<f64>().ok();
            if entity.kind == "LWPOLYLINE" || entity.kind == "VERTEX" {
                if let (Some(last), Some(y)) = (entity.vertices.last_mut(), y) {
                    last.1 = y;
                }
            } else {
                entity.y1 = y;
            }
        }
        11 => entity.x2 = value.parse().ok(),
        21 => entity.y2 = value.parse().ok(),
        1 => entity.text = Some(value.to_string()),
        2 => entity.block_name = Some(value.to_string()),
        _ => {}
    }
}

/// Tally the finished entity and harvest domain-analysis feeds
fn finalize_entity(
    drawing: &mut NormalizedDrawing,
    entity: Option<PendingEntity>,
    precision: Precision,
) {
    let Some(entity) = entity else {
        return;
    };
    let counts = &mut drawing.entities;
    match entity.kind.as_str() {
        "LINE" => {
            counts.lines += 1;
            if precision != Precision::Low {
                if let (Some(x1), Some(y1), Some(x2), Some(y2)) =
                    (entity.x1, entity.y1, entity.x2, entity.y2)
                {
                    let length = ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt();
                    drawing.segments.push(WireSegment {
                        length,
                        layer: entity.layer.clone(),
                    });
                }
            }
        }
        "CIRCLE" => counts.circles += 1,
        "ARC" => counts.arcs += 1,
        "LWPOLYLINE" | "POLYLINE" => {
            counts.polylines += 1;
            if precision != Precision::Low && entity.vertices.len() >= 2 {
                let length: f64 = entity
                    .vertices
                    .windows(2)
                    .map(|w| ((w[1].0 - w[0].0).powi(2) + (w[1].1 - w[0].1).powi(2)).sqrt())
                    .sum();
                drawing.segments.push(WireSegment {
                    length,
                    layer: entity.layer.clone(),
                });
            }
        }
        "TEXT" | "MTEXT" => {
            counts.text += 1;
            if let Some(text) = entity.text {
                drawing.text_fragments.push(text);
            }
        }
        "DIMENSION" => counts.dimensions += 1,
        "INSERT" => {
            counts.blocks += 1;
            if let Some(name) = entity.block_name {
                drawing.block_names.push(name);
            }
        }
        // SEQEND, VERTEX bodies of classic POLYLINE, and anything exotic
        _ => {}
    }
}

fn bounding_box(
    ext_min: (Option<f64>, Option<f64>, Option<f64>),
    ext_max: (Option<f64>, Option<f64>, Option<f64>),
    insunits: Option<i64>,
) -> BoundingBox {
    match (ext_min, ext_max) {
        ((Some(x1), Some(y1), z1), (Some(x2), Some(y2), z2)) => BoundingBox {
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
            depth: match (z1, z2) {
                (Some(z1), Some(z2)) => (z2 - z1).abs(),
                _ => 0.0,
            },
            unit: unit_name(insunits).to_string(),
        },
        _ => BoundingBox::placeholder(),
    }
}

/// $INSUNITS code to unit name (drawing units default to millimeters)
fn unit_name(insunits: Option<i64>) -> &'static str {
    match insunits {
        Some(1) => "in",
        Some(2) => "ft",
        Some(4) => "mm",
        Some(5) => "cm",
        Some(6) => "m",
        _ => "mm",
    }
}

fn metadata(
    acad_ver: Option<String>,
    saved_by: Option<String>,
    td_create: Option<f64>,
    td_update: Option<f64>,
) -> DrawingMetadata {
    let mut meta = DrawingMetadata::default();
    if let Some(ver) = acad_ver {
        meta.software = software_name(&ver);
    }
    if let Some(author) = saved_by {
        if !author.trim().is_empty() {
            meta.author = author;
        }
    }
    if let Some(date) = td_create.and_then(julian_to_iso) {
        meta.created = date;
    }
    if let Some(date) = td_update.and_then(julian_to_iso) {
        meta.modified = date;
    }
    meta
}

/// Map $ACADVER codes to a readable producer name
fn software_name(ver: &str) -> String {
    let release = match ver.trim().to_uppercase().as_str() {
        "AC1015" => "AutoCAD 2000",
        "AC1018" => "AutoCAD 2004",
        "AC1021" => "AutoCAD 2007",
        "AC1024" => "AutoCAD 2010",
        "AC1027" => "AutoCAD 2013",
        "AC1032" => "AutoCAD 2018",
        other => return format!("AutoCAD ({})", other),
    };
    release.to_string()
}

/// DXF stores timestamps as julian day numbers
fn julian_to_iso(jd: f64) -> Option<String> {
    // Julian day 2440587.5 is the unix epoch
    let unix_secs = (jd - 2_440_587.5) * 86_400.0;
    if !unix_secs.is_finite() || !(0.0..=4_102_444_800.0).contains(&unix_secs) {
        return None;
    }
    chrono::DateTime::from_timestamp(unix_secs as i64, 0).map(|dt| dt.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal document: 2 layers, 3 lines, 1 circle
    fn fixture() -> String {
        let mut doc = String::new();
        let pairs: &[(&str, &str)] = &[
            ("0", "SECTION"),
            ("2", "HEADER"),
            ("9", "$ACADVER"),
            ("1", "AC1027"),
            ("9", "$EXTMIN"),
            ("10", "0.0"),
            ("20", "0.0"),
            ("9", "$EXTMAX"),
            ("10", "420.0"),
            ("20", "297.0"),
            ("9", "$INSUNITS"),
            ("70", "4"),
            ("0", "ENDSEC"),
            ("0", "SECTION"),
            ("2", "TABLES"),
            ("0", "TABLE"),
            ("2", "LAYER"),
            ("0", "LAYER"),
            ("2", "WALLS"),
            ("0", "LAYER"),
            ("2", "WIRING"),
            ("0", "ENDTAB"),
            ("0", "ENDSEC"),
            ("0", "SECTION"),
            ("2", "ENTITIES"),
            ("0", "LINE"),
            ("8", "WIRING"),
            ("10", "0.0"),
            ("20", "0.0"),
            ("11", "30.0"),
            ("21", "40.0"),
            ("0", "LINE"),
            ("8", "WALLS"),
            ("10", "0.0"),
            ("20", "0.0"),
            ("11", "100.0"),
            ("21", "0.0"),
            ("0", "LINE"),
            ("8", "WALLS"),
            ("10", "0.0"),
            ("20", "0.0"),
            ("11", "0.0"),
            ("21", "50.0"),
            ("0", "CIRCLE"),
            ("8", "WALLS"),
            ("10", "10.0"),
            ("20", "10.0"),
            ("40", "5.0"),
            ("0", "ENDSEC"),
            ("0", "EOF"),
        ];
        for (code, value) in pairs {
            doc.push_str(code);
            doc.push('\n');
            doc.push_str(value);
            doc.push('\n');
        }
        doc
    }

    #[test]
    fn test_entity_and_layer_tallies() {
        let drawing = parse_dxf(&fixture(), Precision::Standard).unwrap();
        assert_eq!(drawing.entities.lines, 3);
        assert_eq!(drawing.entities.circles, 1);
        assert_eq!(drawing.layers.len(), 2);
        assert_eq!(drawing.layers, vec!["WALLS", "WIRING"]);
    }

    #[test]
    fn test_extents_and_units() {
        let drawing = parse_dxf(&fixture(), Precision::Standard).unwrap();
        assert_eq!(drawing.dimensions.width, 420.0);
        assert_eq!(drawing.dimensions.height, 297.0);
        assert_eq!(drawing.dimensions.unit, "mm");
        assert_eq!(drawing.metadata.software, "AutoCAD 2013");
    }

    #[test]
    fn test_segments_collect_line_lengths() {
        let drawing = parse_dxf(&fixture(), Precision::Standard).unwrap();
        // 3-4-5 triangle line on WIRING layer: length 50
        let wiring: Vec<_> = drawing
            .segments
            .iter()
            .filter(|s| s.layer == "WIRING")
            .collect();
        assert_eq!(wiring.len(), 1);
        assert!((wiring[0].length - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_low_precision_skips_geometry_harvest() {
        let drawing = parse_dxf(&fixture(), Precision::Low).unwrap();
        assert_eq!(drawing.entities.lines, 3);
        assert!(drawing.segments.is_empty());
    }

    #[test]
    fn test_missing_extents_fall_back_to_placeholder() {
        let doc = "0\nSECTION\n2\nENTITIES\n0\nLINE\n0\nENDSEC\n0\nEOF\n";
        let drawing = parse_dxf(doc, Precision::Standard).unwrap();
        assert_eq!(drawing.dimensions, BoundingBox::placeholder());
        assert_eq!(drawing.metadata.author, "unknown");
    }

    #[test]
    fn test_empty_and_entityless_documents_error() {
        assert!(matches!(parse_dxf("  ", Precision::Standard), Err(DxfError::Empty)));
        let no_entities = "0\nSECTION\n2\nHEADER\n0\nENDSEC\n0\nEOF\n";
        assert!(matches!(
            parse_dxf(no_entities, Precision::Standard),
            Err(DxfError::MissingEntities)
        ));
    }

    #[test]
    fn test_julian_conversion() {
        // 2000-01-01T12:00:00Z is JD 2451545.0
        let iso = julian_to_iso(2_451_545.0).unwrap();
        assert!(iso.starts_with("2000-01-01T12:00:00"));
        assert!(julian_to_iso(f64::NAN).is_none());
    }
}
