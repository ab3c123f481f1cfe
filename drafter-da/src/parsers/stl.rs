//! STL mesh parser
//!
//! Handles both the ASCII variant ("solid ... facet ...") and the binary
//! variant (80-byte header, u32 triangle count, 50 bytes per triangle).
//! Mesh topology maps onto the normalized counts as faces/edges/vertices;
//! the bounding box is swept from the vertex coordinates.

use thiserror::Error;

use crate::models::BoundingBox;
use crate::parsers::NormalizedDrawing;

/// STL parse errors
#[derive(Debug, Error)]
pub enum StlError {
    #[error("STL file is too short ({0} bytes)")]
    TooShort(usize),

    #[error("Binary STL is truncated: header declares {declared} triangles, data holds {actual}")]
    Truncated { declared: u32, actual: u64 },
}

/// Parse STL bytes into the normalized drawing shape
pub fn parse_stl(bytes: &[u8]) -> Result<NormalizedDrawing, StlError> {
    if looks_ascii(bytes) {
        Ok(parse_ascii(bytes))
    } else {
        parse_binary(bytes)
    }
}

fn looks_ascii(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(16)];
    String::from_utf8_lossy(head)
        .trim_start()
        .to_ascii_lowercase()
        .starts_with("solid")
        // A binary file may still open with "solid" in its freeform header;
        // require an ASCII facet keyword somewhere in the first chunk
        && String::from_utf8_lossy(&bytes[..bytes.len().min(1024)]).contains("facet")
}

fn parse_ascii(bytes: &[u8]) -> NormalizedDrawing {
    let text = String::from_utf8_lossy(bytes);
    let mut drawing = NormalizedDrawing::default();
    let mut triangles = 0u64;
    let mut sweep = BboxSweep::default();

    for line in text.lines() {
        let line = line.trim();
        if line.starts_with("facet") {
            triangles += 1;
        } else if let Some(rest) = line.strip_prefix("vertex") {
            let mut coords = rest.split_whitespace().filter_map(|t| t.parse::<f64>().ok());
            if let (Some(x), Some(y), Some(z)) = (coords.next(), coords.next(), coords.next()) {
                sweep.push(x, y, z);
            }
        }
    }

    fill_mesh_counts(&mut drawing, triangles);
    drawing.dimensions = sweep.into_box();
    drawing
}

fn parse_binary(bytes: &[u8]) -> Result<NormalizedDrawing, StlError> {
    if bytes.len() < 84 {
        return Err(StlError::TooShort(bytes.len()));
    }
    let declared = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]);
    let actual = ((bytes.len() - 84) / 50) as u64;
    if (declared as u64) > actual {
        return Err(StlError::Truncated { declared, actual });
    }

    let mut sweep = BboxSweep::default();
    for i in 0..declared as usize {
        let base = 84 + i * 50;
        // Skip the 12-byte normal; three vertices of 3 f32 each follow
        for v in 0..3 {
            let off = base + 12 + v * 12;
            let coord = |k: usize| -> f64 {
                let o = off + k * 4;
                f32::from_le_bytes([bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]]) as f64
            };
            sweep.push(coord(0), coord(1), coord(2));
        }
    }

    let mut drawing = NormalizedDrawing::default();
    fill_mesh_counts(&mut drawing, declared as u64);
    drawing.dimensions = sweep.into_box();
    Ok(drawing)
}

/// Triangle soup topology: shared edges/vertices are not reconstructed
fn fill_mesh_counts(drawing: &mut NormalizedDrawing, triangles: u64) {
    drawing.entities.faces = triangles;
    drawing.entities.edges = triangles * 3;
    drawing.entities.vertices = triangles * 3;
    drawing.entities.shells = u64::from(triangles > 0);
}

#[derive(Debug, Default)]
struct BboxSweep {
    min: Option<(f64, f64, f64)>,
    max: Option<(f64, f64, f64)>,
}

impl BboxSweep {
    fn push(&mut self, x: f64, y: f64, z: f64) {
        let min = self.min.get_or_insert((x, y, z));
        min.0 = min.0.min(x);
        min.1 = min.1.min(y);
        min.2 = min.2.min(z);
        let max = self.max.get_or_insert((x, y, z));
        max.0 = max.0.max(x);
        max.1 = max.1.max(y);
        max.2 = max.2.max(z);
    }

    fn into_box(self) -> BoundingBox {
        match (self.min, self.max) {
            (Some(min), Some(max)) => BoundingBox {
                width: max.0 - min.0,
                height: max.1 - min.1,
                depth: max.2 - min.2,
                unit: "mm".to_string(),
            },
            _ => BoundingBox::placeholder(),
        }
    }
}
