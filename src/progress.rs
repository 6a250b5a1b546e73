//! Completion tracking: how much of a zone has actually been covered.
//!
//! Pure function over the zone polygon and the assignment's coverage
//! marks. Overlapping marks are merged by geometric union so no ground is
//! counted twice. Marks are not clipped to the zone boundary; coverage
//! slightly outside the zone is why the percentage is clamped at 100
//! instead of the geometry being rejected.

use geo::{Geometry, GeodesicArea, Polygon};
use serde::Serialize;

use crate::geometry;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Progress {
    pub total_area_sqm: f64,
    pub completed_area_sqm: f64,
    pub progress_percentage: f64,
    pub completion_count: usize,
}

/// Computes coverage progress for one assignment.
///
/// Returns the computed percentage always; a manual override on the
/// assignment is presentation-layer policy applied by the caller.
pub fn compute(zone: &Polygon<f64>, marks: &[Geometry<f64>]) -> Progress {
    let total_area = zone.geodesic_area_unsigned();

    if total_area == 0.0 || marks.is_empty() {
        return Progress {
            total_area_sqm: total_area,
            completed_area_sqm: 0.0,
            progress_percentage: 0.0,
            completion_count: marks.len(),
        };
    }

    let completed_area = geometry::union_area(marks);
    let percentage = (completed_area / total_area * 100.0).min(100.0);

    Progress {
        total_area_sqm: total_area,
        completed_area_sqm: completed_area,
        progress_percentage: (percentage * 100.0).round() / 100.0,
        completion_count: marks.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, Point};

    use crate::geometry::{decode_geometry, decode_polygon, GeoJson};

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> GeoJson {
        GeoJson::Polygon(vec![vec![
            vec![x0, y0],
            vec![x0, y1],
            vec![x1, y1],
            vec![x1, y0],
            vec![x0, y0],
        ]])
    }

    fn zone_square() -> Polygon<f64> {
        decode_polygon(&rect(0.0, 0.0, 10.0, 10.0)).unwrap()
    }

    #[test]
    fn test_full_coverage_is_exactly_100() {
        // One mark covering exactly the zone
        let zone = zone_square();
        let mark = decode_geometry(&rect(0.0, 0.0, 10.0, 10.0)).unwrap();
        let progress = compute(&zone, &[mark]);
        assert_eq!(progress.progress_percentage, 100.00);
        assert_eq!(progress.completion_count, 1);
        assert!((progress.completed_area_sqm - progress.total_area_sqm).abs() < 1e-3);
    }

    #[test]
    fn test_overlapping_rectangles_count_overlap_once() {
        // Two marks covering 60% each, overlapping by 30%: union is 90%,
        // not 120%. Longitude slices over the same latitude band keep
        // geodesic area linear in width, up to the geodesic-edge sliver.
        let zone = zone_square();
        let a = decode_geometry(&rect(0.0, 0.0, 6.0, 10.0)).unwrap();
        let b = decode_geometry(&rect(3.0, 0.0, 9.0, 10.0)).unwrap();
        let progress = compute(&zone, &[a, b]);
        assert!(
            (progress.progress_percentage - 90.0).abs() < 0.5,
            "got {}",
            progress.progress_percentage
        );
    }

    #[test]
    fn test_percentage_is_clamped_at_100() {
        // Mark spills well past the zone boundary
        let zone = zone_square();
        let oversized = decode_geometry(&rect(-5.0, -5.0, 15.0, 15.0)).unwrap();
        let progress = compute(&zone, &[oversized]);
        assert_eq!(progress.progress_percentage, 100.0);
        assert!(progress.completed_area_sqm > progress.total_area_sqm);
    }

    #[test]
    fn test_no_marks_means_zero_progress() {
        let progress = compute(&zone_square(), &[]);
        assert_eq!(progress.completed_area_sqm, 0.0);
        assert_eq!(progress.progress_percentage, 0.0);
        assert_eq!(progress.completion_count, 0);
        assert!(progress.total_area_sqm > 0.0);
    }

    #[test]
    fn test_degenerate_zone_divides_nothing() {
        let empty_zone = Polygon::new(LineString::new(vec![]), vec![]);
        let mark = decode_geometry(&rect(0.0, 0.0, 1.0, 1.0)).unwrap();
        let progress = compute(&empty_zone, &[mark]);
        assert_eq!(progress.total_area_sqm, 0.0);
        assert_eq!(progress.completed_area_sqm, 0.0);
        assert_eq!(progress.progress_percentage, 0.0);
    }

    #[test]
    fn test_adding_a_mark_never_decreases_coverage() {
        let zone = zone_square();
        let a = decode_geometry(&rect(0.0, 0.0, 4.0, 10.0)).unwrap();
        let b = decode_geometry(&rect(2.0, 0.0, 6.0, 10.0)).unwrap();
        let point = Geometry::Point(Point::new(5.0, 5.0));

        let one = compute(&zone, &[a.clone()]);
        let two = compute(&zone, &[a.clone(), b.clone()]);
        let with_point = compute(&zone, &[a, b, point]);

        assert!(two.completed_area_sqm >= one.completed_area_sqm);
        assert!(with_point.completed_area_sqm >= two.completed_area_sqm - 1e-6);
    }
}
