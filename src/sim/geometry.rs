//! Polygon helpers and convex decomposition
//!
//! Terrain polygons are concave, but physics colliders must be convex.
//! Decomposition sits behind [`PolygonDecomposer`] so the terrain generator
//! does not care which algorithm splits its polygons.

use glam::DVec2;

/// Area below which a part is treated as degenerate
const MIN_PART_AREA: f64 = 1e-6;

/// Splits a simple polygon into convex sub-polygons
pub trait PolygonDecomposer: Send + Sync {
    fn decompose(&self, polygon: &[DVec2]) -> Vec<Vec<DVec2>>;
}

/// Signed area (positive = counter-clockwise)
pub fn signed_area(polygon: &[DVec2]) -> f64 {
    let n = polygon.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        sum += a.perp_dot(b);
    }
    sum * 0.5
}

/// True if every turn of the polygon has the same winding
pub fn is_convex(polygon: &[DVec2]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0.0f64;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        let c = polygon[(i + 2) % n];
        let cross = (b - a).perp_dot(c - b);
        if cross.abs() < 1e-12 {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    sign != 0.0
}

/// Return a counter-clockwise copy of the polygon
pub fn to_ccw(polygon: &[DVec2]) -> Vec<DVec2> {
    let mut out = polygon.to_vec();
    if signed_area(&out) < 0.0 {
        out.reverse();
    }
    out
}

/// Point-in-triangle test (inclusive of edges) for a CCW triangle
fn point_in_triangle(p: DVec2, a: DVec2, b: DVec2, c: DVec2) -> bool {
    let d1 = (b - a).perp_dot(p - a);
    let d2 = (c - b).perp_dot(p - b);
    let d3 = (a - c).perp_dot(p - c);
    d1 >= 0.0 && d2 >= 0.0 && d3 >= 0.0
}

/// General ear-clipping triangulation. Works on any simple polygon.
#[derive(Debug, Clone, Copy, Default)]
pub struct EarClipDecomposer;

impl PolygonDecomposer for EarClipDecomposer {
    fn decompose(&self, polygon: &[DVec2]) -> Vec<Vec<DVec2>> {
        if polygon.len() < 3 {
            return Vec::new();
        }
        let points = to_ccw(polygon);
        if is_convex(&points) {
            return vec![points];
        }

        let mut remaining: Vec<usize> = (0..points.len()).collect();
        let mut triangles = Vec::with_capacity(points.len().saturating_sub(2));

        // Each pass removes one ear; a simple polygon always has one
        let mut guard = points.len() * points.len();
        while remaining.len() > 3 && guard > 0 {
            guard -= 1;
            let n = remaining.len();
            let mut clipped = false;
            for i in 0..n {
                let ia = remaining[(i + n - 1) % n];
                let ib = remaining[i];
                let ic = remaining[(i + 1) % n];
                let (a, b, c) = (points[ia], points[ib], points[ic]);

                // Reflex or collinear vertex can't be an ear
                if (b - a).perp_dot(c - b) <= 0.0 {
                    continue;
                }
                let contains_other = remaining.iter().any(|&j| {
                    j != ia && j != ib && j != ic && point_in_triangle(points[j], a, b, c)
                });
                if contains_other {
                    continue;
                }

                triangles.push(vec![a, b, c]);
                remaining.remove(i);
                clipped = true;
                break;
            }
            if !clipped {
                // Degenerate input (self-intersecting or all collinear)
                log::warn!(
                    "Ear clipping stalled with {} vertices left",
                    remaining.len()
                );
                break;
            }
        }
        if remaining.len() == 3 {
            let tri: Vec<DVec2> = remaining.iter().map(|&i| points[i]).collect();
            triangles.push(tri);
        }

        triangles.retain(|t| signed_area(t).abs() > MIN_PART_AREA);
        triangles
    }
}

/// Column decomposition for ground polygons.
///
/// Expects a top chain (left to right) followed by a bottom chain (right to
/// left) with the same number of vertices, the layout produced by the terrain
/// generator. Each pair of neighbouring columns becomes one convex quad.
/// Anything else is handed to [`EarClipDecomposer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StripDecomposer;

impl StripDecomposer {
    fn split_chains(polygon: &[DVec2]) -> Option<(&[DVec2], Vec<DVec2>)> {
        let n = polygon.len();
        if n < 4 || n % 2 != 0 {
            return None;
        }
        let half = n / 2;
        let top = &polygon[..half];
        let mut bottom: Vec<DVec2> = polygon[half..].to_vec();
        bottom.reverse();

        // Columns must line up and run strictly left to right
        for i in 0..half {
            if (top[i].x - bottom[i].x).abs() > 1e-9 || top[i].y <= bottom[i].y {
                return None;
            }
            if i > 0 && top[i].x <= top[i - 1].x {
                return None;
            }
        }
        Some((top, bottom))
    }
}

impl PolygonDecomposer for StripDecomposer {
    fn decompose(&self, polygon: &[DVec2]) -> Vec<Vec<DVec2>> {
        let Some((top, bottom)) = Self::split_chains(polygon) else {
            return EarClipDecomposer.decompose(polygon);
        };

        top.windows(2)
            .zip(bottom.windows(2))
            .map(|(t, b)| vec![b[0], b[1], t[1], t[0]])
            .filter(|quad| signed_area(quad).abs() > MIN_PART_AREA)
            .collect()
    }
}

/// Linear interpolation along a polyline sorted by x.
///
/// Clamps to the end points outside the covered range.
pub fn interpolate_height(vertices: &[DVec2], x: f64) -> Option<f64> {
    let first = vertices.first()?;
    let last = vertices.last()?;
    if x <= first.x {
        return Some(first.y);
    }
    if x >= last.x {
        return Some(last.y);
    }
    // partition_point gives the first vertex strictly right of x
    let idx = vertices.partition_point(|v| v.x <= x);
    let a = vertices[idx - 1];
    let b = vertices[idx];
    let span = b.x - a.x;
    if span <= 0.0 {
        return Some(a.y);
    }
    let t = (x - a.x) / span;
    Some(a.y + (b.y - a.y) * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn total_area(parts: &[Vec<DVec2>]) -> f64 {
        parts.iter().map(|p| signed_area(p).abs()).sum()
    }

    fn ground_polygon() -> Vec<DVec2> {
        // Bumpy top, flat-offset bottom
        let top = [
            DVec2::new(0.0, 10.0),
            DVec2::new(10.0, 30.0),
            DVec2::new(20.0, 5.0),
            DVec2::new(30.0, 25.0),
        ];
        let mut poly: Vec<DVec2> = top.to_vec();
        poly.extend(top.iter().rev().map(|p| DVec2::new(p.x, p.y - 50.0)));
        poly
    }

    #[test]
    fn test_signed_area_orientation() {
        let square = [
            DVec2::new(0.0, 0.0),
            DVec2::new(1.0, 0.0),
            DVec2::new(1.0, 1.0),
            DVec2::new(0.0, 1.0),
        ];
        assert_abs_diff_eq!(signed_area(&square), 1.0);
        let mut cw = square.to_vec();
        cw.reverse();
        assert_abs_diff_eq!(signed_area(&cw), -1.0);
    }

    #[test]
    fn test_strip_parts_are_convex_and_cover_polygon() {
        let poly = ground_polygon();
        assert!(!is_convex(&poly));
        let parts = StripDecomposer.decompose(&poly);
        assert_eq!(parts.len(), 3);
        for part in &parts {
            assert!(is_convex(part));
            assert!(signed_area(part) > 0.0, "quads should be CCW");
        }
        assert_abs_diff_eq!(total_area(&parts), signed_area(&poly).abs(), epsilon = 1e-9);
    }

    #[test]
    fn test_ear_clip_matches_area() {
        let poly = ground_polygon();
        let parts = EarClipDecomposer.decompose(&poly);
        assert!(parts.len() >= poly.len() - 2 - 1);
        for part in &parts {
            assert_eq!(part.len(), 3);
            assert!(is_convex(part));
        }
        assert_abs_diff_eq!(total_area(&parts), signed_area(&poly).abs(), epsilon = 1e-9);
    }

    #[test]
    fn test_ear_clip_keeps_convex_input_whole() {
        let tri = [DVec2::ZERO, DVec2::new(4.0, 0.0), DVec2::new(0.0, 3.0)];
        let parts = EarClipDecomposer.decompose(&tri);
        assert_eq!(parts.len(), 1);
    }

    #[test]
    fn test_strip_falls_back_for_odd_polygons() {
        // L-shape, 6 vertices but not a column layout
        let l_shape = [
            DVec2::new(0.0, 0.0),
            DVec2::new(2.0, 0.0),
            DVec2::new(2.0, 1.0),
            DVec2::new(1.0, 1.0),
            DVec2::new(1.0, 2.0),
            DVec2::new(0.0, 2.0),
        ];
        let parts = StripDecomposer.decompose(&l_shape);
        assert!(!parts.is_empty());
        assert_abs_diff_eq!(total_area(&parts), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_interpolate_height() {
        let line = [DVec2::new(0.0, 0.0), DVec2::new(10.0, 10.0), DVec2::new(20.0, 0.0)];
        assert_abs_diff_eq!(interpolate_height(&line, 5.0).unwrap(), 5.0);
        assert_abs_diff_eq!(interpolate_height(&line, 15.0).unwrap(), 5.0);
        assert_abs_diff_eq!(interpolate_height(&line, -3.0).unwrap(), 0.0);
        assert_abs_diff_eq!(interpolate_height(&line, 99.0).unwrap(), 0.0);
        assert!(interpolate_height(&[], 1.0).is_none());
    }
}
