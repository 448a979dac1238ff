//! Delaunay triangulation and triangle correspondence.
//!
//! [`Subdivision`] is an incremental Bowyer-Watson triangulation seeded with a
//! super triangle enclosing the canvas. Like a planar subdivision it reports
//! its triangles as vertex coordinates, including the ones still attached to
//! the super triangle. [`delaunay_triangles`] turns that coordinate list back
//! into index triples over the caller's point list.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::geometry::point_in_rect;
use crate::types::{Point, Rect, Triangle};

/// Vertices of a triangle must match an input point within this many pixels
/// on both axes.
pub const MATCH_TOLERANCE: f32 = 1.0;

/// How far the super triangle reaches beyond the canvas, in canvas sizes.
const SUPER_TRIANGLE_SCALE: f64 = 100.0;

/// Number of super triangle vertices at the front of the vertex list.
const NUM_SUPER_VERTICES: usize = 3;

#[derive(Debug, Clone, Copy)]
struct Vertex {
    x: f64,
    y: f64,
}

impl Vertex {
    fn distance(&self, other: &Vertex) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy)]
struct Face {
    v: [usize; 3],
    center: Vertex,
    radius: f64,
}

impl Face {
    fn new(v: [usize; 3], vertices: &[Vertex]) -> Self {
        let (center, radius) = circumcircle(&vertices[v[0]], &vertices[v[1]], &vertices[v[2]]);
        Self { v, center, radius }
    }

    fn circumcircle_contains(&self, p: &Vertex) -> bool {
        self.center.distance(p) < self.radius - 1e-10
    }

    fn edges(&self) -> [(usize, usize); 3] {
        let [a, b, c] = self.v;
        [edge_key(a, b), edge_key(b, c), edge_key(c, a)]
    }
}

fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

fn circumcircle(pa: &Vertex, pb: &Vertex, pc: &Vertex) -> (Vertex, f64) {
    let (ax, ay) = (pa.x, pa.y);
    let (bx, by) = (pb.x, pb.y);
    let (cx, cy) = (pc.x, pc.y);

    let d = 2.0 * (ax * (by - cy) + bx * (cy - ay) + cx * (ay - by));
    if d.abs() < 1e-10 {
        // Collinear: an infinite circle, so the face is always replaced.
        let center = Vertex {
            x: (ax + bx + cx) / 3.0,
            y: (ay + by + cy) / 3.0,
        };
        return (center, f64::INFINITY);
    }

    let a2 = ax * ax + ay * ay;
    let b2 = bx * bx + by * by;
    let c2 = cx * cx + cy * cy;
    let center = Vertex {
        x: (a2 * (by - cy) + b2 * (cy - ay) + c2 * (ay - by)) / d,
        y: (a2 * (cx - bx) + b2 * (ax - cx) + c2 * (bx - ax)) / d,
    };
    let radius = center.distance(pa);
    (center, radius)
}

/// Incremental Delaunay triangulation over a bounding rectangle.
#[derive(Debug, Clone)]
pub struct Subdivision {
    rect: Rect,
    vertices: Vec<Vertex>,
    faces: Vec<Face>,
}

impl Subdivision {
    /// Create an empty subdivision whose super triangle encloses `rect`.
    pub fn new(rect: Rect) -> Self {
        let mid_x = (rect.x0 as f64 + rect.x1 as f64) / 2.0;
        let mid_y = (rect.y0 as f64 + rect.y1 as f64) / 2.0;
        let delta = (rect.width() as f64).max(rect.height() as f64).max(1.0);
        let reach = SUPER_TRIANGLE_SCALE * delta;

        let vertices = vec![
            Vertex {
                x: mid_x - reach,
                y: mid_y - delta,
            },
            Vertex {
                x: mid_x,
                y: mid_y + reach,
            },
            Vertex {
                x: mid_x + reach,
                y: mid_y - delta,
            },
        ];
        let faces = vec![Face::new([0, 1, 2], &vertices)];

        Self {
            rect,
            vertices,
            faces,
        }
    }

    /// Number of points inserted so far.
    pub fn num_points(&self) -> usize {
        self.vertices.len() - NUM_SUPER_VERTICES
    }

    /// Insert a point. Points outside the rectangle and exact duplicates of an
    /// earlier point are ignored; returns whether the point was added.
    pub fn insert(&mut self, point: Point) -> bool {
        if !point_in_rect(&self.rect, point) {
            return false;
        }
        let (x, y) = point.to_f64();
        let p = Vertex { x, y };
        if self.vertices[NUM_SUPER_VERTICES..]
            .iter()
            .any(|v| v.distance(&p) < 1e-9)
        {
            return false;
        }

        let (bad, good): (Vec<Face>, Vec<Face>) = self
            .faces
            .iter()
            .copied()
            .partition(|face| face.circumcircle_contains(&p));
        if bad.is_empty() {
            return false;
        }

        // The cavity boundary is every edge used by exactly one bad face.
        let mut edge_count: HashMap<(usize, usize), usize> = HashMap::new();
        for face in &bad {
            for edge in face.edges() {
                *edge_count.entry(edge).or_insert(0) += 1;
            }
        }

        let idx = self.vertices.len();
        self.vertices.push(p);
        self.faces = good;
        for face in &bad {
            for (a, b) in face.edges() {
                if edge_count[&edge_key(a, b)] == 1 {
                    self.faces.push(Face::new([a, b, idx], &self.vertices));
                }
            }
        }
        true
    }

    /// All triangles as vertex coordinates, including those touching the
    /// super triangle.
    pub fn triangle_list(&self) -> Vec<[Point; 3]> {
        let to_point = |i: usize| {
            let v = self.vertices[i];
            Point::from_f64(v.x, v.y)
        };
        self.faces
            .iter()
            .map(|f| [to_point(f.v[0]), to_point(f.v[1]), to_point(f.v[2])])
            .collect()
    }
}

/// Index of the single point within [`MATCH_TOLERANCE`] of `p` on both axes.
///
/// Returns `None` when no point matches or when the match is ambiguous.
pub fn find_point_index(points: &[Point], p: Point) -> Option<usize> {
    let mut matches = points.iter().enumerate().filter(|(_, q)| {
        (q.x - p.x).abs() < MATCH_TOLERANCE && (q.y - p.y).abs() < MATCH_TOLERANCE
    });
    let first = matches.next()?.0;
    match matches.next() {
        Some(_) => None,
        None => Some(first),
    }
}

/// Delaunay triangulation of `points` inside `rect`, as index triples.
///
/// Triangles with a vertex outside the rectangle are discarded, as are
/// triangles whose vertices do not each resolve to a unique, distinct input
/// point. Triangle order is unspecified.
pub fn delaunay_triangles(rect: Rect, points: &[Point]) -> Vec<Triangle> {
    let mut subdiv = Subdivision::new(rect);
    for (i, &p) in points.iter().enumerate() {
        if !point_in_rect(&rect, p) {
            warn!(
                "Point {} at ({:.1}, {:.1}) lies outside the canvas; not triangulated",
                i, p.x, p.y
            );
            continue;
        }
        subdiv.insert(p);
    }

    let mut triangles = Vec::new();
    let mut unresolved = 0usize;
    for tri in subdiv.triangle_list() {
        if !tri.iter().all(|&v| point_in_rect(&rect, v)) {
            continue;
        }

        let resolved: Option<Vec<usize>> =
            tri.iter().map(|&v| find_point_index(points, v)).collect();
        match resolved.as_deref() {
            Some(&[a, b, c]) if a != b && b != c && a != c => {
                triangles.push(Triangle::new(a, b, c));
            }
            _ => unresolved += 1,
        }
    }

    if unresolved > 0 {
        debug!("Dropped {} triangles with unresolved vertices", unresolved);
    }
    debug!(
        "Triangulated {} points into {} triangles",
        subdiv.num_points(),
        triangles.len()
    );
    triangles
}
