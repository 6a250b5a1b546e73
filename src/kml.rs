//! KML boundary importer for zones drawn in Google My Maps.
//!
//! `parse_kml` walks the document once and extracts one zone candidate per
//! named placemark with a polygon. It never fails to the caller: per-
//! placemark problems are accumulated in the returned error list and the
//! batch continues. What the caller does with the (candidates, errors) pair
//! is import policy and lives in `rest`.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use serde_json::json;

use crate::geometry::{self, GeoJson};

/// A zone parsed out of a KML placemark, not yet persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneCandidate {
    pub name: String,
    pub description: Option<String>,
    pub geometry: GeoJson,
    pub color: Option<String>,
    pub metadata: serde_json::Value,
}

#[derive(Default)]
struct PlacemarkData {
    name: Option<String>,
    description: Option<String>,
    color_raw: Option<String>,
    coordinates_text: String,
}

/// Parse KML content and extract zone candidates.
///
/// Returns (candidates, errors). Placemarks without a name are dropped
/// silently; named placemarks without an extractable polygon produce an
/// error naming the placemark. A document with no placemarks at all, or
/// malformed markup, yields an empty candidate list and a single error.
pub fn parse_kml(kml_content: &str) -> (Vec<ZoneCandidate>, Vec<String>) {
    let mut candidates = Vec::new();
    let mut errors = Vec::new();

    let mut reader = Reader::from_str(kml_content);
    reader.config_mut().trim_text(true);

    // Path of local element names, namespace prefixes stripped
    let mut path: Vec<String> = Vec::new();
    let mut current: Option<PlacemarkData> = None;
    let mut placemarks_seen = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "Placemark" {
                    placemarks_seen += 1;
                    current = Some(PlacemarkData::default());
                }
                path.push(name);
            }
            Ok(Event::End(_)) => {
                let closed = path.pop();
                if closed.as_deref() == Some("Placemark") {
                    if let Some(pm) = current.take() {
                        finish_placemark(pm, &mut candidates, &mut errors);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(pm) = current.as_mut() {
                    let text = match t.unescape() {
                        Ok(text) => text.into_owned(),
                        Err(_) => continue,
                    };
                    collect_text(pm, &path, text);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                // Reject the whole document; partial candidates are discarded
                return (Vec::new(), vec![format!("Invalid KML format: {e}")]);
            }
        }
    }

    if placemarks_seen == 0 {
        errors.push("No placemarks found in KML file".to_string());
    } else if candidates.is_empty() && errors.is_empty() {
        errors.push("No valid zones found in KML file".to_string());
    }

    (candidates, errors)
}

fn path_ends_with(path: &[String], tail: &[&str]) -> bool {
    path.len() >= tail.len()
        && path[path.len() - tail.len()..]
            .iter()
            .zip(tail)
            .all(|(a, b)| a == b)
}

fn collect_text(pm: &mut PlacemarkData, path: &[String], text: String) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }

    if path_ends_with(path, &["Placemark", "name"]) {
        pm.name = Some(trimmed.to_string());
    } else if path_ends_with(path, &["Placemark", "description"]) {
        pm.description = Some(trimmed.to_string());
    } else if path_ends_with(path, &["Style", "PolyStyle", "color"]) {
        pm.color_raw = Some(trimmed.to_string());
    } else if path_ends_with(path, &["outerBoundaryIs", "LinearRing", "coordinates"]) {
        // First polygon wins; inner boundaries (holes) are not captured
        if pm.coordinates_text.is_empty() {
            pm.coordinates_text = text;
        }
    }
    // styleUrl references are not resolved: no color, not an error
}

fn finish_placemark(pm: PlacemarkData, candidates: &mut Vec<ZoneCandidate>, errors: &mut Vec<String>) {
    // Nameless placemarks are dropped without an error
    let Some(name) = pm.name else { return };

    let coordinates = parse_coordinates(&pm.coordinates_text);
    let ring = GeoJson::Polygon(vec![coordinates]);

    // Validation and ring auto-closing go through the shared codec
    let geometry = match geometry::decode_polygon(&ring) {
        Ok(polygon) => geometry::encode_polygon(&polygon),
        Err(_) => {
            errors.push(format!("Failed to parse placemark: {name}"));
            return;
        }
    };

    let color = pm.color_raw.as_deref().and_then(kml_color_to_hex);

    candidates.push(ZoneCandidate {
        name,
        description: pm.description.clone(),
        geometry,
        color,
        metadata: json!({
            "source": "kml_import",
            "original_description": pm.description,
        }),
    });
}

/// Parses whitespace-separated `lon,lat[,alt]` tokens. Unparsable tokens
/// are skipped, matching how map exports pad coordinate blocks.
fn parse_coordinates(coord_text: &str) -> Vec<Vec<f64>> {
    let mut coordinates = Vec::new();

    for token in coord_text.split_whitespace() {
        let mut parts = token.split(',');
        let (Some(lon_s), Some(lat_s)) = (parts.next(), parts.next()) else {
            continue;
        };
        if let (Ok(lon), Ok(lat)) = (lon_s.parse::<f64>(), lat_s.parse::<f64>()) {
            coordinates.push(vec![lon, lat]);
        }
    }

    coordinates
}

/// KML colors are aabbggrr (alpha, blue, green, red); displays want #rrggbb.
fn kml_color_to_hex(kml_color: &str) -> Option<String> {
    let c = kml_color.trim();
    if c.len() != 8 || !c.is_ascii() {
        return None;
    }
    Some(format!("#{}{}{}", &c[6..8], &c[4..6], &c[2..4]))
}
