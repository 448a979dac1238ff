//! 2D affine transforms and their estimation from point correspondences.

use serde::{Deserialize, Serialize};

use crate::types::{Point, Shape};

/// A 2x3 affine matrix mapping `(x, y)` to
/// `(m[0][0]*x + m[0][1]*y + m[0][2], m[1][0]*x + m[1][1]*y + m[1][2])`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub m: [[f64; 3]; 2],
}

impl AffineTransform {
    pub const fn new(m: [[f64; 3]; 2]) -> Self {
        Self { m }
    }

    /// Rotation by `angle` radians with uniform `scale`, then translation.
    pub fn similarity(scale: f64, angle: f64, tx: f64, ty: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self::new([[scale * c, -scale * s, tx], [scale * s, scale * c, ty]])
    }

    #[inline]
    pub fn apply_xy(&self, x: f64, y: f64) -> (f64, f64) {
        let m = &self.m;
        (
            m[0][0] * x + m[0][1] * y + m[0][2],
            m[1][0] * x + m[1][1] * y + m[1][2],
        )
    }

    pub fn apply(&self, p: Point) -> Point {
        let (x, y) = p.to_f64();
        let (x, y) = self.apply_xy(x, y);
        Point::from_f64(x, y)
    }

    pub fn apply_shape(&self, shape: &Shape) -> Shape {
        Shape::new(shape.points.iter().map(|&p| self.apply(p)).collect())
    }

    /// Determinant of the linear 2x2 part.
    pub fn determinant(&self) -> f64 {
        self.m[0][0] * self.m[1][1] - self.m[0][1] * self.m[1][0]
    }

    /// Returns `None` if the linear part is singular.
    pub fn inverse(&self) -> Option<Self> {
        let [[a, b, c], [d, e, f]] = self.m;
        let det = self.determinant();
        if det.abs() < 1e-12 {
            return None;
        }
        let ia = e / det;
        let ib = -b / det;
        let id = -d / det;
        let ie = a / det;
        Some(Self::new([
            [ia, ib, -(ia * c + ib * f)],
            [id, ie, -(id * c + ie * f)],
        ]))
    }

    /// The exact affine map taking triangle `src` onto triangle `dst`, vertex
    /// by vertex. Returns `None` when `src` is degenerate.
    pub fn from_triangles(src: &[Point; 3], dst: &[Point; 3]) -> Option<Self> {
        let a = src.map(|p| {
            let (x, y) = p.to_f64();
            [x, y, 1.0]
        });
        let dst = dst.map(Point::to_f64);
        let u = dst.map(|(x, _)| x);
        let v = dst.map(|(_, y)| y);

        let row_u = solve_3x3(&a, &u)?;
        let row_v = solve_3x3(&a, &v)?;
        Some(Self::new([row_u, row_v]))
    }
}

/// Solve 3x3 linear system `A x = b` via Gaussian elimination with partial pivoting.
/// Returns `None` if the system is singular (|pivot| < 1e-12).
#[allow(clippy::needless_range_loop)]
fn solve_3x3(a: &[[f64; 3]; 3], b: &[f64; 3]) -> Option<[f64; 3]> {
    let mut aug = [[0.0f64; 4]; 3];
    for i in 0..3 {
        aug[i][..3].copy_from_slice(&a[i]);
        aug[i][3] = b[i];
    }
    for col in 0..3 {
        let mut max_row = col;
        let mut max_val = aug[col][col].abs();
        for row in col + 1..3 {
            if aug[row][col].abs() > max_val {
                max_val = aug[row][col].abs();
                max_row = row;
            }
        }
        if max_val < 1e-12 {
            return None;
        }
        aug.swap(col, max_row);
        let pivot = aug[col][col];
        for row in col + 1..3 {
            let factor = aug[row][col] / pivot;
            for k in col..4 {
                let v = aug[col][k];
                aug[row][k] -= factor * v;
            }
        }
    }
    let mut x = [0.0f64; 3];
    for i in (0..3).rev() {
        x[i] = aug[i][3];
        for j in i + 1..3 {
            let v = aug[i][j];
            x[i] -= v * x[j];
        }
        x[i] /= aug[i][i];
    }
    Some(x)
}

/// Least-squares fit of a 4-DOF partial affine transform (rotation, uniform
/// scale, translation) mapping `src` onto `dst`.
///
/// Solves for `x' = a*x - b*y + tx`, `y' = b*x + a*y + ty` in closed form
/// around the centroids. Returns `None` for fewer than two correspondences,
/// mismatched lengths, or when either point set collapses to a single point.
pub fn fit_partial_affine(src: &[(f64, f64)], dst: &[(f64, f64)]) -> Option<AffineTransform> {
    if src.len() != dst.len() || src.len() < 2 {
        return None;
    }
    let n = src.len() as f64;

    let centroid = |pts: &[(f64, f64)]| {
        let (sx, sy) = pts
            .iter()
            .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x, sy + y));
        (sx / n, sy / n)
    };
    let (scx, scy) = centroid(src);
    let (dcx, dcy) = centroid(dst);

    let mut src_var = 0.0;
    let mut dot = 0.0;
    let mut cross = 0.0;
    for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst) {
        let (ux, uy) = (sx - scx, sy - scy);
        let (vx, vy) = (dx - dcx, dy - dcy);
        src_var += ux * ux + uy * uy;
        dot += ux * vx + uy * vy;
        cross += ux * vy - uy * vx;
    }

    if src_var < 1e-12 {
        return None;
    }
    let a = dot / src_var;
    let b = cross / src_var;
    if a * a + b * b < 1e-18 {
        return None;
    }

    let tx = dcx - (a * scx - b * scy);
    let ty = dcy - (b * scx + a * scy);
    Some(AffineTransform::new([[a, -b, tx], [b, a, ty]]))
}

/// Rotate `p0` by 60 degrees around `p1`.
fn equilateral_apex(p0: (f64, f64), p1: (f64, f64)) -> (f64, f64) {
    let (s60, c60) = 60f64.to_radians().sin_cos();
    let dx = p0.0 - p1.0;
    let dy = p0.1 - p1.1;
    (c60 * dx - s60 * dy + p1.0, s60 * dx + c60 * dy + p1.1)
}

/// Estimate the similarity transform taking two source points onto two
/// destination points.
///
/// Two correspondences alone leave the fit under-constrained for the solver,
/// so a third point is synthesized in each frame by rotating the first point
/// 60 degrees around the second. The resulting triangles are exactly similar
/// and the least-squares fit recovers the transform. Returns `None` when
/// either pair of points coincides.
pub fn similarity_transform(src: [Point; 2], dst: [Point; 2]) -> Option<AffineTransform> {
    let [s0, s1] = src.map(Point::to_f64);
    let [d0, d1] = dst.map(Point::to_f64);

    let src_pts = [s0, s1, equilateral_apex(s0, s1)];
    let dst_pts = [d0, d1, equilateral_apex(d0, d1)];

    fit_partial_affine(&src_pts, &dst_pts)
}
