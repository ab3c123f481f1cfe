//! Thumbnail preparation
//!
//! Deterministic SVG sketch of the drawing: outline proportional to the
//! bounding box plus an entity/layer caption. Returned base64-encoded so
//! the response stays pure JSON.

use base64::Engine;

use crate::parsers::NormalizedDrawing;

const CANVAS: f64 = 240.0;
const MARGIN: f64 = 16.0;

/// Render the drawing sketch and base64-encode it
pub fn render_base64(drawing: &NormalizedDrawing) -> String {
    let svg = render_svg(drawing);
    base64::engine::general_purpose::STANDARD.encode(svg.as_bytes())
}

fn render_svg(drawing: &NormalizedDrawing) -> String {
    let bbox = &drawing.dimensions;
    let (w, h) = if bbox.width > 0.0 && bbox.height > 0.0 {
        let scale = (CANVAS - 2.0 * MARGIN) / bbox.width.max(bbox.height);
        (bbox.width * scale, bbox.height * scale)
    } else {
        (CANVAS - 2.0 * MARGIN, CANVAS - 2.0 * MARGIN)
    };
    let x = (CANVAS - w) / 2.0;
    let y = (CANVAS - h) / 2.0;

    format!(
        concat!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{c}" height="{c}" viewBox="0 0 {c} {c}">"##,
            r##"<rect width="{c}" height="{c}" fill="#f8f8f8"/>"##,
            r##"<rect x="{x:.1}" y="{y:.1}" width="{w:.1}" height="{h:.1}" fill="none" stroke="#444" stroke-width="1.5"/>"##,
            r##"<text x="{cx}" y="{ty}" font-family="monospace" font-size="11" text-anchor="middle" fill="#333">{entities} entities / {layers} layers</text>"##,
            r##"<text x="{cx}" y="{by}" font-family="monospace" font-size="10" text-anchor="middle" fill="#777">{bw:.0} x {bh:.0} {unit}</text>"##,
            "</svg>"
        ),
        c = CANVAS,
        x = x,
        y = y,
        w = w,
        h = h,
        cx = CANVAS / 2.0,
        ty = MARGIN,
        by = CANVAS - 4.0,
        entities = drawing.entities.total(),
        layers = drawing.layers.len(),
        bw = bbox.width,
        bh = bbox.height,
        unit = bbox.unit,
    )
}
