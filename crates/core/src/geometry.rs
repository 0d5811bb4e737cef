//! Geometry kernel over normalized page points
//!
//! Pure functions over point sequences in normalized page space. Results are in
//! normalized units (squared for area); callers apply the calibration scale.
//! Nothing here knows about pixels, zoom or calibration, which is what makes
//! measurement values zoom-invariant.

use crate::space::{GeometryError, NormalizedPoint};

/// Sum of distances between consecutive points. Zero for fewer than two points.
pub fn path_length(points: &[NormalizedPoint]) -> f64 {
    points.windows(2).map(|w| w[0].distance_to(&w[1])).sum()
}

/// Signed shoelace sum divided by two. Positive for counter-clockwise winding in a
/// y-up frame (clockwise on screen). Zero for fewer than three points.
pub fn signed_area(points: &[NormalizedPoint]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }

    let mut sum = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        sum += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    sum / 2.0
}

/// Polygon area via the shoelace formula, winding discarded.
pub fn polygon_area(points: &[NormalizedPoint]) -> f64 {
    signed_area(points).abs()
}

/// Path length including the closing edge back to the first point.
pub fn polygon_perimeter(points: &[NormalizedPoint]) -> f64 {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() >= 2 => {
            path_length(points) + last.distance_to(first)
        }
        _ => 0.0,
    }
}

/// Arithmetic mean of the vertices. Good enough for label placement.
pub fn centroid(points: &[NormalizedPoint]) -> Result<NormalizedPoint, GeometryError> {
    if points.is_empty() {
        return Err(GeometryError::TooFewPoints { needed: 1, got: 0 });
    }

    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|p| p.x).sum();
    let sum_y: f64 = points.iter().map(|p| p.y).sum();
    Ok(NormalizedPoint::new(sum_x / n, sum_y / n))
}

/// Point halfway along the path, used to anchor labels on linear measurements.
pub fn path_midpoint(points: &[NormalizedPoint]) -> Result<NormalizedPoint, GeometryError> {
    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Err(GeometryError::TooFewPoints { needed: 1, got: 0 }),
    };

    let half = path_length(points) / 2.0;
    if half == 0.0 {
        return Ok(first);
    }

    let mut accumulated = 0.0;
    for w in points.windows(2) {
        let segment = w[0].distance_to(&w[1]);
        if segment > 0.0 && accumulated + segment >= half {
            let t = (half - accumulated) / segment;
            return Ok(NormalizedPoint::new(
                w[0].x + t * (w[1].x - w[0].x),
                w[0].y + t * (w[1].y - w[0].y),
            ));
        }
        accumulated += segment;
    }

    Ok(last)
}

/// Rejects sequences containing NaN or infinite coordinates.
pub fn ensure_finite(points: &[NormalizedPoint]) -> Result<(), GeometryError> {
    points.iter().try_for_each(|p| p.checked().map(|_| ()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: &[(f64, f64)]) -> Vec<NormalizedPoint> {
        raw.iter().map(|&(x, y)| NormalizedPoint::new(x, y)).collect()
    }

    #[test]
    fn path_length_of_3_4_5_triangle_leg() {
        assert_eq!(path_length(&pts(&[(0.0, 0.0), (3.0, 4.0)])), 5.0);
    }

    #[test]
    fn path_length_is_zero_for_short_input() {
        assert_eq!(path_length(&[]), 0.0);
        assert_eq!(path_length(&pts(&[(0.4, 0.4)])), 0.0);
    }

    #[test]
    fn polyline_length_sums_segments() {
        let points = pts(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        assert_eq!(path_length(&points), 2.0);
    }

    #[test]
    fn unit_square_area_and_perimeter_any_start_or_winding() {
        let square = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        for start in 0..4 {
            let mut rotated: Vec<_> = square.iter().cycle().skip(start).take(4).copied().collect();
            for _ in 0..2 {
                let points = pts(&rotated);
                assert_eq!(polygon_area(&points), 1.0);
                assert_eq!(polygon_perimeter(&points), 4.0);
                rotated.reverse();
            }
        }
    }

    #[test]
    fn signed_area_flips_with_winding() {
        let ccw = pts(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        let cw: Vec<_> = ccw.iter().rev().copied().collect();
        assert_eq!(signed_area(&ccw), 0.5);
        assert_eq!(signed_area(&cw), -0.5);
    }

    #[test]
    fn area_needs_three_points() {
        assert_eq!(polygon_area(&pts(&[(0.0, 0.0), (1.0, 1.0)])), 0.0);
    }

    #[test]
    fn triangle_area() {
        let triangle = pts(&[(0.0, 0.0), (10.0, 0.0), (5.0, 10.0)]);
        assert!((polygon_area(&triangle) - 50.0).abs() < 1e-12);
    }

    #[test]
    fn centroid_is_vertex_mean() {
        let square = pts(&[(0.0, 0.0), (0.6, 0.0), (0.6, 0.6), (0.0, 0.6)]);
        let c = centroid(&square).unwrap();
        assert!((c.x - 0.3).abs() < 1e-12 && (c.y - 0.3).abs() < 1e-12);
        assert!(centroid(&[]).is_err());
    }

    #[test]
    fn midpoint_lands_on_junction() {
        let points = pts(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        let m = path_midpoint(&points).unwrap();
        assert_eq!((m.x, m.y), (1.0, 0.0));
    }

    #[test]
    fn midpoint_of_single_segment() {
        let m = path_midpoint(&pts(&[(0.0, 0.0), (0.5, 0.25)])).unwrap();
        assert_eq!((m.x, m.y), (0.25, 0.125));
    }

    #[test]
    fn non_finite_points_are_reported() {
        let points = pts(&[(0.0, 0.0), (f64::INFINITY, 0.0)]);
        assert!(ensure_finite(&points).is_err());
    }
}
