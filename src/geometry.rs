//! Geometry kernel: polygon scaling, point-in-polygon, and line-crossing
//! predicates shared by the capability detector and the edge config loader.
//!
//! Pure functions, no I/O — mirrors the teacher's `performance/latency`
//! modules in keeping math isolated from anything that touches the network
//! or a database.

pub type Point = (f64, f64);
pub type Polygon = Vec<Point>;

/// Tolerance, in pixels, for "inside polygon" hysteresis against tracker jitter.
pub const INSIDE_TOLERANCE_PX: f64 = 5.0;

/// Minimum anti-noise dwell threshold shared by zone and shelf state machines.
pub const MIN_DWELL_SECONDS: f64 = 4.0;

/// Scale a polygon from a reference screenshot's coordinate system to a live
/// frame's coordinate system, clamping each axis to `[0, to_size - 1]`.
pub fn scale_polygon(points: &[(i32, i32)], from_size: (u32, u32), to_size: (u32, u32)) -> Vec<(i32, i32)> {
    let (fw, fh) = (from_size.0.max(1) as f64, from_size.1.max(1) as f64);
    let (tw, th) = (to_size.0 as f64, to_size.1 as f64);
    let scale_x = tw / fw;
    let scale_y = th / fh;
    let max_x = to_size.0.saturating_sub(1) as i32;
    let max_y = to_size.1.saturating_sub(1) as i32;

    points
        .iter()
        .map(|&(x, y)| {
            let sx = ((x as f64) * scale_x).round() as i32;
            let sy = ((y as f64) * scale_y).round() as i32;
            (sx.clamp(0, max_x), sy.clamp(0, max_y))
        })
        .collect()
}

/// Shortest signed distance from `p` to polygon edge `(a, b)`. Positive when
/// `p` sits to the left of the directed edge `a -> b` (ray-casting sign
/// convention used below is independent of this; this is only used for the
/// tolerance check).
fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let (px, py) = p;
    let (ax, ay) = a;
    let (bx, by) = b;
    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > 0.0 {
        (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (ax + t * dx, ay + t * dy);
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}

/// Ray-casting point-in-polygon test with a tolerance band: a point whose
/// nearest-edge distance is within [`INSIDE_TOLERANCE_PX`] of the boundary is
/// treated as inside even if the strict ray-cast says otherwise. This
/// matches `cv2.pointPolygonTest(..., measureDist=True) >= -tolerance` in the
/// reference edge runtime.
pub fn point_in_polygon(p: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let (x, y) = p;
    let mut inside = false;
    let n = polygon.len();
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = polygon[i];
        let (xj, yj) = polygon[j];
        if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }
    if inside {
        return true;
    }

    // Hysteresis band: near-boundary points count as inside too.
    let mut min_dist = f64::INFINITY;
    let mut k = n - 1;
    for i in 0..n {
        let d = point_segment_distance(p, polygon[k], polygon[i]);
        if d < min_dist {
            min_dist = d;
        }
        k = i;
    }
    min_dist <= INSIDE_TOLERANCE_PX
}

fn ccw(a: Point, b: Point, c: Point) -> bool {
    (c.1 - a.1) * (b.0 - a.0) > (b.1 - a.1) * (c.0 - a.0)
}

/// True if the segment `prev -> curr` crosses the segment `p1 -> p2`.
pub fn line_crossing(prev: Point, curr: Point, p1: Point, p2: Point) -> bool {
    ccw(prev, p1, p2) != ccw(curr, p1, p2) && ccw(prev, curr, p1) != ccw(prev, curr, p2)
}

/// Crossing direction: "in" is the side reached when the cross product of
/// the line vector and the movement vector is positive.
pub fn crossing_direction(prev: Point, curr: Point, p1: Point, p2: Point) -> &'static str {
    let line_vec = (p2.0 - p1.0, p2.1 - p1.1);
    let move_vec = (curr.0 - prev.0, curr.1 - prev.1);
    let cross = line_vec.0 * move_vec.1 - line_vec.1 * move_vec.0;
    if cross > 0.0 {
        "in"
    } else {
        "out"
    }
}

/// Shoelace-formula polygon area, used to reject degenerate operator-drawn
/// geometry at config-load time.
pub fn polygon_area(polygon: &[Point]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }
    let n = polygon.len();
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += polygon[i].0 * polygon[j].1;
        area -= polygon[j].0 * polygon[i].1;
    }
    (area / 2.0).abs()
}

/// Polygon centroid, used only for diagnostics/validation — not on the hot path.
pub fn polygon_centroid(polygon: &[Point]) -> Point {
    let area = polygon_area(polygon);
    if polygon.len() < 3 || area == 0.0 {
        return (0.0, 0.0);
    }
    let n = polygon.len();
    let (mut cx, mut cy) = (0.0, 0.0);
    for i in 0..n {
        let j = (i + 1) % n;
        let factor = polygon[i].0 * polygon[j].1 - polygon[j].0 * polygon[i].1;
        cx += (polygon[i].0 + polygon[j].0) * factor;
        cy += (polygon[i].1 + polygon[j].1) * factor;
    }
    (cx / (6.0 * area), cy / (6.0 * area))
}

/// Knee-height centroid of a detector bounding box: horizontal midpoint,
/// vertical point one quarter of the box height up from the bottom edge.
pub fn bbox_centroid(bbox: (f64, f64, f64, f64)) -> Point {
    let (x1, y1, x2, y2) = bbox;
    let cx = (x1 + x2) / 2.0;
    let cy = y2 - (y2 - y1) / 4.0;
    (cx, cy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Polygon {
        vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]
    }

    #[test]
    fn point_inside_square() {
        assert!(point_in_polygon((5.0, 5.0), &square()));
    }

    #[test]
    fn point_outside_square() {
        assert!(!point_in_polygon((50.0, 50.0), &square()));
    }

    #[test]
    fn point_just_outside_within_tolerance() {
        assert!(point_in_polygon((10.5, 5.0), &square()));
        assert!(!point_in_polygon((20.0, 5.0), &square()));
    }

    #[test]
    fn scale_polygon_clamps_to_target_bounds() {
        let scaled = scale_polygon(&[(0, 0), (1920, 1080)], (1920, 1080), (640, 360));
        assert_eq!(scaled, vec![(0, 0), (639, 359)]);
    }

    #[test]
    fn crossing_direction_flips_sign_with_movement() {
        let p1 = (0.0, 0.0);
        let p2 = (0.0, 10.0);
        // Moving left-to-right across a vertical line.
        let dir_in = crossing_direction((-5.0, 5.0), (5.0, 5.0), p1, p2);
        let dir_out = crossing_direction((5.0, 5.0), (-5.0, 5.0), p1, p2);
        assert_ne!(dir_in, dir_out);
    }

    #[test]
    fn line_crossing_detects_segment_intersection() {
        assert!(line_crossing((-5.0, 5.0), (5.0, 5.0), (0.0, 0.0), (0.0, 10.0)));
        assert!(!line_crossing((-5.0, 5.0), (-1.0, 5.0), (0.0, 0.0), (0.0, 10.0)));
    }

    #[test]
    fn degenerate_polygon_has_zero_area_and_is_never_inside() {
        let degenerate = vec![(0.0, 0.0), (1.0, 1.0)];
        assert_eq!(polygon_area(&degenerate), 0.0);
        assert!(!point_in_polygon((0.5, 0.5), &degenerate));
    }

    #[test]
    fn bbox_centroid_is_knee_height() {
        let (cx, cy) = bbox_centroid((0.0, 0.0, 10.0, 20.0));
        assert_eq!(cx, 5.0);
        assert_eq!(cy, 15.0);
    }
}
