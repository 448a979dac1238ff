//! Small geometric predicates shared by the triangulation and warping code.

use crate::types::{PixelRect, Point, Rect};

/// Returns true if `point` lies inside `rect`, boundary included.
pub fn point_in_rect(rect: &Rect, point: Point) -> bool {
    !(point.x < rect.x0 || point.y < rect.y0 || point.x > rect.x1 || point.y > rect.y1)
}

/// Clamp a point into the pixel grid of a `width` x `height` image.
pub fn clamp_point(point: Point, width: u32, height: u32) -> Point {
    let max_x = width.saturating_sub(1) as f32;
    let max_y = height.saturating_sub(1) as f32;
    Point::new(point.x.max(0.0).min(max_x), point.y.max(0.0).min(max_y))
}

/// Smallest integer rectangle covering all points.
///
/// The origin is the floor of the minimum coordinate and the far edge is the
/// floor of the maximum coordinate plus one, so every point falls in a pixel
/// of the rectangle.
pub fn bounding_rect(points: &[Point]) -> PixelRect {
    if points.is_empty() {
        return PixelRect {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
        };
    }

    let (min_x, max_x, min_y, max_y) = points.iter().fold(
        (f32::INFINITY, f32::NEG_INFINITY, f32::INFINITY, f32::NEG_INFINITY),
        |(min_x, max_x, min_y, max_y), p| {
            (min_x.min(p.x), max_x.max(p.x), min_y.min(p.y), max_y.max(p.y))
        },
    );

    let x = min_x.floor() as i64;
    let y = min_y.floor() as i64;
    PixelRect {
        x,
        y,
        width: (max_x.floor() as i64 - x + 1) as u32,
        height: (max_y.floor() as i64 - y + 1) as u32,
    }
}

/// Twice the signed area of triangle `abc`; positive when counter-clockwise
/// in a y-up frame.
pub fn signed_area2(a: Point, b: Point, c: Point) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Unsigned area of a triangle.
pub fn triangle_area(tri: &[Point; 3]) -> f32 {
    signed_area2(tri[0], tri[1], tri[2]).abs() / 2.0
}

/// Closed point-in-triangle test, independent of winding order.
///
/// `tolerance` widens each edge outward by roughly that many pixels, so points
/// lying on a shared edge count as inside both neighbours.
pub fn point_in_triangle(p: Point, tri: &[Point; 3], tolerance: f32) -> bool {
    let [a, b, c] = *tri;
    let area = signed_area2(a, b, c);
    if area == 0.0 {
        return false;
    }
    let sign = area.signum();

    for (u, v) in [(a, b), (b, c), (c, a)] {
        let edge_len = u.distance(&v);
        let side = signed_area2(u, v, p) * sign;
        if side < -tolerance * edge_len {
            return false;
        }
    }
    true
}
