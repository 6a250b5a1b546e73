//! Geometry codec for zone and completion-mark geometries.
//!
//! Converts between the GeoJSON-shaped interchange format used on the wire,
//! the `geo` types used for area/union math, and the WKT strings used for
//! persistence. All coordinates are lon/lat degrees (SRID 4326 equivalent);
//! areas are computed with the geodesic operator, in square meters.

use geo::{BooleanOps, Coord, Geometry, GeodesicArea, LineString, MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use wkt::{ToWkt, TryFromWkt};

use crate::error::{Error, Result};

/// Interchange geometry: `{"type": ..., "coordinates": ...}`,
/// longitude-before-latitude ordering.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "coordinates")]
pub enum GeoJson {
    Point(Vec<f64>),
    LineString(Vec<Vec<f64>>),
    Polygon(Vec<Vec<Vec<f64>>>),
}

impl GeoJson {
    pub fn type_name(&self) -> &'static str {
        match self {
            GeoJson::Point(_) => "Point",
            GeoJson::LineString(_) => "LineString",
            GeoJson::Polygon(_) => "Polygon",
        }
    }
}

fn coord_from(parts: &[f64]) -> Result<Coord<f64>> {
    if parts.len() < 2 {
        return Err(Error::InvalidGeometry(
            "coordinate needs at least longitude and latitude".into(),
        ));
    }
    // Extra elements (altitude) are dropped
    Ok(Coord {
        x: parts[0],
        y: parts[1],
    })
}

/// Builds a closed linear ring from interchange coordinates.
///
/// Rings with fewer than 3 distinct vertices fail; an unclosed ring
/// (first vertex != last vertex) is auto-closed by appending the first
/// vertex. The auto-close is a documented normalization, not an error.
fn decode_ring(coords: &[Vec<f64>]) -> Result<LineString<f64>> {
    let mut points = Vec::with_capacity(coords.len() + 1);
    for parts in coords {
        points.push(coord_from(parts)?);
    }

    let distinct: HashSet<(u64, u64)> = points
        .iter()
        .map(|c| (c.x.to_bits(), c.y.to_bits()))
        .collect();
    if distinct.len() < 3 {
        return Err(Error::InvalidGeometry(
            "a polygon ring needs at least 3 distinct vertices".into(),
        ));
    }

    if points.first() != points.last() {
        points.push(points[0]);
    }

    Ok(LineString::from(points))
}

/// Decodes an interchange Polygon into a zone polygon.
/// Only single-outer-ring polygons are accepted for zones.
pub fn decode_polygon(geojson: &GeoJson) -> Result<Polygon<f64>> {
    let rings = match geojson {
        GeoJson::Polygon(rings) => rings,
        other => {
            return Err(Error::InvalidGeometry(format!(
                "expected Polygon, got {}",
                other.type_name()
            )))
        }
    };

    if rings.len() != 1 {
        return Err(Error::InvalidGeometry(format!(
            "zone polygons must have exactly one outer ring, got {} rings",
            rings.len()
        )));
    }

    let exterior = decode_ring(&rings[0])?;
    Ok(Polygon::new(exterior, vec![]))
}

/// Decodes an interchange geometry for a completion mark.
/// Points, lines, and polygons are all valid coverage marks.
pub fn decode_geometry(geojson: &GeoJson) -> Result<Geometry<f64>> {
    match geojson {
        GeoJson::Point(parts) => Ok(Geometry::Point(Point::from(coord_from(parts)?))),
        GeoJson::LineString(coords) => {
            if coords.len() < 2 {
                return Err(Error::InvalidGeometry(
                    "a LineString needs at least 2 vertices".into(),
                ));
            }
            let points = coords
                .iter()
                .map(|parts| coord_from(parts))
                .collect::<Result<Vec<_>>>()?;
            Ok(Geometry::LineString(LineString::from(points)))
        }
        GeoJson::Polygon(_) => Ok(Geometry::Polygon(decode_polygon(geojson)?)),
    }
}

pub fn encode_polygon(polygon: &Polygon<f64>) -> GeoJson {
    let ring = polygon
        .exterior()
        .coords()
        .map(|c| vec![c.x, c.y])
        .collect();
    GeoJson::Polygon(vec![ring])
}

pub fn encode_geometry(geometry: &Geometry<f64>) -> Result<GeoJson> {
    match geometry {
        Geometry::Point(p) => Ok(GeoJson::Point(vec![p.x(), p.y()])),
        Geometry::LineString(line) => Ok(GeoJson::LineString(
            line.coords().map(|c| vec![c.x, c.y]).collect(),
        )),
        Geometry::Polygon(polygon) => Ok(encode_polygon(polygon)),
        other => Err(Error::InvalidGeometry(format!(
            "unsupported geometry type: {:?}",
            other
        ))),
    }
}

// WKT is the canonical textual form used for persistence round-trips,
// e.g. POLYGON((lon1 lat1,lon2 lat2,...,lon1 lat1)).

pub fn polygon_to_wkt(polygon: &Polygon<f64>) -> String {
    polygon.wkt_string()
}

pub fn wkt_to_polygon(wkt_str: &str) -> Result<Polygon<f64>> {
    Polygon::try_from_wkt_str(wkt_str)
        .map_err(|e| Error::InvalidGeometry(format!("bad WKT polygon: {e}")))
}

pub fn geometry_to_wkt(geometry: &Geometry<f64>) -> String {
    geometry.wkt_string()
}

pub fn wkt_to_geometry(wkt_str: &str) -> Result<Geometry<f64>> {
    Geometry::try_from_wkt_str(wkt_str)
        .map_err(|e| Error::InvalidGeometry(format!("bad WKT geometry: {e}")))
}

/// Geodesic area in square meters. Points and lines cover no ground.
pub fn geodesic_area(geometry: &Geometry<f64>) -> f64 {
    match geometry {
        Geometry::Polygon(polygon) => polygon.geodesic_area_unsigned(),
        Geometry::MultiPolygon(mp) => mp.geodesic_area_unsigned(),
        _ => 0.0,
    }
}

/// Merges possibly-overlapping coverage marks into a single shape.
/// Overlapping regions are counted once. Non-areal marks (points, lines)
/// contribute nothing to the merged shape.
pub fn union_marks(marks: &[Geometry<f64>]) -> MultiPolygon<f64> {
    let polygons: Vec<&Polygon<f64>> = marks
        .iter()
        .filter_map(|g| match g {
            Geometry::Polygon(p) => Some(p),
            _ => None,
        })
        .collect();

    let Some((first, rest)) = polygons.split_first() else {
        return MultiPolygon::new(vec![]);
    };

    let mut merged = MultiPolygon::new(vec![(*first).clone()]);
    for polygon in rest {
        merged = merged.union(&MultiPolygon::new(vec![(*polygon).clone()]));
    }
    merged
}

/// Geodesic area of the union of all marks, in square meters.
pub fn union_area(marks: &[Geometry<f64>]) -> f64 {
    union_marks(marks).geodesic_area_unsigned()
}
