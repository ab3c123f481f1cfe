//! Domain-specific drawing analysis
//!
//! Deterministic enrichment from the parsed drawing feeds: device
//! recognition from block names and free text, and a wiring length summary
//! from the collected line/polyline segments. Which keyword table applies
//! is selected by the requested domain model.

use std::collections::BTreeMap;

use crate::models::{DetectedDevice, DomainAnalysis, WiringSummary};
use crate::parsers::NormalizedDrawing;

/// Supported domain models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DomainModel {
    #[default]
    Electrical,
    Mechanical,
    Architectural,
}

impl DomainModel {
    /// Parse from the options blob (`domainModel` field)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "electrical" => Some(DomainModel::Electrical),
            "mechanical" => Some(DomainModel::Mechanical),
            "architectural" => Some(DomainModel::Architectural),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            DomainModel::Electrical => "electrical",
            DomainModel::Mechanical => "mechanical",
            DomainModel::Architectural => "architectural",
        }
    }

    /// (marker keyword, reported device type) pairs for this domain
    fn device_keywords(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            DomainModel::Electrical => &[
                ("OUTLET", "outlet"),
                ("RECEPTACLE", "outlet"),
                ("SWITCH", "switch"),
                ("PANEL", "panel"),
                ("LIGHT", "light fixture"),
                ("LAMP", "light fixture"),
                ("BREAKER", "breaker"),
                ("SOCKET", "outlet"),
            ],
            DomainModel::Mechanical => &[
                ("PUMP", "pump"),
                ("VALVE", "valve"),
                ("MOTOR", "motor"),
                ("FAN", "fan"),
                ("COMPRESSOR", "compressor"),
                ("BEARING", "bearing"),
            ],
            DomainModel::Architectural => &[
                ("DOOR", "door"),
                ("WINDOW", "window"),
                ("STAIR", "stair"),
                ("SINK", "fixture"),
                ("WC", "fixture"),
            ],
        }
    }

    /// Layers whose segments count as wiring/routing runs
    fn routing_layer_markers(&self) -> &'static [&'static str] {
        match self {
            DomainModel::Electrical => &["WIRE", "WIRING", "CABLE", "CONDUIT", "CIRCUIT"],
            DomainModel::Mechanical => &["PIPE", "PIPING", "DUCT"],
            DomainModel::Architectural => &[],
        }
    }
}

/// Runs one domain model over the parsed drawing
#[derive(Debug, Clone, Default)]
pub struct DomainAnalyzer {
    model: DomainModel,
}

impl DomainAnalyzer {
    pub fn new(model: DomainModel) -> Self {
        Self { model }
    }

    /// Recognize devices from block names and text fragments
    pub fn detect_devices(&self, drawing: &NormalizedDrawing) -> Vec<DetectedDevice> {
        // (device type, location) -> count, ordered for stable output
        let mut tally: BTreeMap<(String, String), u64> = BTreeMap::new();

        for name in &drawing.block_names {
            let upper = name.to_uppercase();
            for (keyword, device_type) in self.model.device_keywords() {
                if upper.contains(keyword) {
                    *tally
                        .entry((device_type.to_string(), format!("block:{}", name)))
                        .or_insert(0) += 1;
                    break;
                }
            }
        }
        for text in &drawing.text_fragments {
            let upper = text.to_uppercase();
            for (keyword, device_type) in self.model.device_keywords() {
                if upper.contains(keyword) {
                    *tally
                        .entry((device_type.to_string(), "annotation".to_string()))
                        .or_insert(0) += 1;
                    break;
                }
            }
        }

        tally
            .into_iter()
            .map(|((device_type, location), count)| DetectedDevice {
                device_type,
                count,
                location,
            })
            .collect()
    }

    /// Sum routing-layer segments into the wiring summary
    pub fn wiring_summary(&self, drawing: &NormalizedDrawing) -> WiringSummary {
        let markers = self.model.routing_layer_markers();
        let segments: Vec<_> = drawing
            .segments
            .iter()
            .filter(|s| {
                let upper = s.layer.to_uppercase();
                markers.iter().any(|m| upper.contains(m))
            })
            .cloned()
            .collect();
        let total_length = segments.iter().map(|s| s.length).sum();
        WiringSummary {
            total_length,
            segments,
        }
    }

    /// Assemble the domain findings block
    pub fn analyze(&self, drawing: &NormalizedDrawing) -> DomainAnalysis {
        let devices = self.detect_devices(drawing);
        let wiring = self.wiring_summary(drawing);

        let mut findings = Vec::new();
        if !devices.is_empty() {
            let total: u64 = devices.iter().map(|d| d.count).sum();
            findings.push(format!(
                "{} device(s) recognized across {} marker(s)",
                total,
                devices.len()
            ));
        }
        if wiring.total_length > 0.0 {
            findings.push(format!(
                "{:.1} {} of routing across {} segment(s)",
                wiring.total_length,
                drawing.dimensions.unit,
                wiring.segments.len()
            ));
        }

        DomainAnalysis {
            domain: self.model.name().to_string(),
            findings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WireSegment;

    fn drawing() -> NormalizedDrawing {
        let mut d = NormalizedDrawing::default();
        d.block_names = vec![
            "OUTLET_DUPLEX".to_string(),
            "OUTLET_DUPLEX".to_string(),
            "SWITCH_1P".to_string(),
            "TITLEBLOCK".to_string(),
        ];
        d.text_fragments = vec!["MAIN PANEL A".to_string(), "NOTES".to_string()];
        d.segments = vec![
            WireSegment {
                length: 120.0,
                layer: "E-WIRING".to_string(),
            },
            WireSegment {
                length: 45.5,
                layer: "E-WIRING".to_string(),
            },
            WireSegment {
                length: 300.0,
                layer: "WALLS".to_string(),
            },
        ];
        d
    }

    #[test]
    fn test_device_detection_from_blocks_and_text() {
        let analyzer = DomainAnalyzer::new(DomainModel::Electrical);
        let devices = analyzer.detect_devices(&drawing());

        let outlets: u64 = devices
            .iter()
            .filter(|d| d.device_type == "outlet")
            .map(|d| d.count)
            .sum();
        assert_eq!(outlets, 2);
        assert!(devices.iter().any(|d| d.device_type == "switch"));
        assert!(devices
            .iter()
            .any(|d| d.device_type == "panel" && d.location == "annotation"));
        // Unmatched blocks do not appear
        assert!(!devices.iter().any(|d| d.location.contains("TITLEBLOCK")));
    }

    #[test]
    fn test_wiring_sums_only_routing_layers() {
        let analyzer = DomainAnalyzer::new(DomainModel::Electrical);
        let wiring = analyzer.wiring_summary(&drawing());
        assert_eq!(wiring.segments.len(), 2);
        assert!((wiring.total_length - 165.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_drawing_yields_empty_blocks() {
        let analyzer = DomainAnalyzer::default();
        let analysis = analyzer.analyze(&NormalizedDrawing::default());
        assert_eq!(analysis.domain, "electrical");
        assert!(analysis.findings.is_empty());
        assert!(analyzer.detect_devices(&NormalizedDrawing::default()).is_empty());
    }

    #[test]
    fn test_mechanical_keywords() {
        let analyzer = DomainAnalyzer::new(DomainModel::Mechanical);
        let mut d = NormalizedDrawing::default();
        d.block_names = vec!["GATE_VALVE_2IN".to_string()];
        let devices = analyzer.detect_devices(&d);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].device_type, "valve");
    }
}
