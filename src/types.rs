use serde::{Deserialize, Serialize};

/// A landmark or vertex position in image coordinates, pixel centres at
/// integer values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ORIGIN: Point = Point::new(0.0, 0.0);

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// The centre of pixel `(x, y)`.
    pub fn from_pixel(x: u32, y: u32) -> Self {
        Self::new(x as f32, y as f32)
    }

    /// Narrow double-precision coordinates, as produced by the transform math.
    pub fn from_f64(x: f64, y: f64) -> Self {
        Self::new(x as f32, y as f32)
    }

    pub fn to_f64(self) -> (f64, f64) {
        (self.x as f64, self.y as f64)
    }

    pub fn distance(&self, other: &Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Component-wise point arithmetic.
macro_rules! point_op {
    ($trait:ident, $method:ident, $op:tt) => {
        impl std::ops::$trait for Point {
            type Output = Point;

            fn $method(self, rhs: Point) -> Point {
                Point::new(self.x $op rhs.x, self.y $op rhs.y)
            }
        }
    };
}

/// Scaling by a scalar.
macro_rules! scalar_op {
    ($trait:ident, $method:ident, $op:tt) => {
        impl std::ops::$trait<f32> for Point {
            type Output = Point;

            fn $method(self, k: f32) -> Point {
                Point::new(self.x $op k, self.y $op k)
            }
        }
    };
}

point_op!(Add, add, +);
point_op!(Sub, sub, -);
scalar_op!(Mul, mul, *);
scalar_op!(Div, div, /);

impl std::ops::AddAssign for Point {
    fn add_assign(&mut self, rhs: Point) {
        *self = *self + rhs;
    }
}

/// An axis-aligned rectangle given by its two corners `(x0, y0)` and `(x1, y1)`.
///
/// Containment is inclusive on all four sides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// The `(0, 0, width, height)` rectangle of a canvas.
    pub fn canvas(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}

/// Integer pixel rectangle: top-left corner plus size, as produced by
/// [`bounding_rect`](crate::geometry::bounding_rect).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// A correspondence triangle: three indices into the shared augmented point
/// index space. The same triple addresses every face and the average layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triangle(pub [usize; 3]);

impl Triangle {
    pub const fn new(a: usize, b: usize, c: usize) -> Self {
        Self([a, b, c])
    }

    pub fn indices(&self) -> [usize; 3] {
        self.0
    }

    /// Look up this triangle's vertices in a point list.
    ///
    /// Panics if an index is out of range for `points`.
    pub fn vertices(&self, points: &[Point]) -> [Point; 3] {
        [points[self.0[0]], points[self.0[1]], points[self.0[2]]]
    }
}

/// Number of border anchors appended to every landmark set.
pub const NUM_BOUNDARY_POINTS: usize = 8;

/// Corners and edge midpoints of a `width` x `height` canvas, clockwise from
/// the top-left corner.
pub fn boundary_points(width: u32, height: u32) -> [Point; NUM_BOUNDARY_POINTS] {
    let w = width as f32;
    let h = height as f32;
    [
        Point::new(0.0, 0.0),
        Point::new(w / 2.0, 0.0),
        Point::new(w - 1.0, 0.0),
        Point::new(w - 1.0, h / 2.0),
        Point::new(w - 1.0, h - 1.0),
        Point::new(w / 2.0, h - 1.0),
        Point::new(0.0, h - 1.0),
        Point::new(0.0, h / 2.0),
    ]
}

/// A facial shape represented as an ordered collection of landmark points.
/// Index `i` names the same anatomical feature in every shape of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub points: Vec<Point>,
}

impl Shape {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            points: Vec::with_capacity(n),
        }
    }

    pub fn num_landmarks(&self) -> usize {
        self.points.len()
    }

    /// Create a zeroed shape with n landmarks.
    pub fn zeros(n: usize) -> Self {
        Self {
            points: vec![Point::ORIGIN; n],
        }
    }

    /// Append the canvas boundary points, producing the augmented point set
    /// used for triangulation and warping.
    pub fn augmented(mut self, width: u32, height: u32) -> Self {
        self.points.extend_from_slice(&boundary_points(width, height));
        self
    }

    /// Add `other / divisor` to this shape point by point.
    pub fn add_scaled(&mut self, other: &Shape, divisor: f32) {
        debug_assert_eq!(self.points.len(), other.points.len());
        for (p, q) in self.points.iter_mut().zip(other.points.iter()) {
            *p += *q / divisor;
        }
    }
}

impl std::ops::Index<usize> for Shape {
    type Output = Point;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.points[idx]
    }
}

impl std::ops::IndexMut<usize> for Shape {
    fn index_mut(&mut self, idx: usize) -> &mut Self::Output {
        &mut self.points[idx]
    }
}
