//! Accumulators for the landmark average and the output canvas.
//!
//! The landmark average is built incrementally: each face adds its aligned
//! points divided by the face count (`avg += points / n`), and the result is
//! only released as an [`AverageLayout`] once all `n` faces are in. Only an
//! `AverageLayout` can be triangulated.

use image::Rgb32FImage;

use crate::delaunay::delaunay_triangles;
use crate::error::{Error, Result};
use crate::types::{Rect, Shape, Triangle};

/// Running average of augmented landmark sets.
#[derive(Debug, Clone)]
pub struct LandmarkAccumulator {
    average: Shape,
    expected: usize,
    added: usize,
}

impl LandmarkAccumulator {
    /// Start an average of `expected` shapes with `num_points` points each.
    pub fn new(num_points: usize, expected: usize) -> Self {
        Self {
            average: Shape::zeros(num_points),
            expected,
            added: 0,
        }
    }

    pub fn added(&self) -> usize {
        self.added
    }

    /// Add one shape's share to the average.
    pub fn add(&mut self, shape: &Shape) -> Result<()> {
        if shape.num_landmarks() != self.average.num_landmarks() {
            return Err(Error::LandmarkCount {
                name: format!("#{}", self.added),
                expected: self.average.num_landmarks(),
                found: shape.num_landmarks(),
            });
        }
        if self.added >= self.expected {
            return Err(Error::InvalidConfig(format!(
                "landmark average already holds all {} faces",
                self.expected
            )));
        }
        self.average.add_scaled(shape, self.expected as f32);
        self.added += 1;
        Ok(())
    }

    /// Finish the average. Fails unless exactly `expected` shapes were added.
    pub fn finish(self) -> Result<AverageLayout> {
        if self.expected == 0 || self.added != self.expected {
            return Err(Error::IncompleteAverage {
                expected: self.expected,
                added: self.added,
            });
        }
        Ok(AverageLayout {
            shape: self.average,
            num_faces: self.expected,
        })
    }
}

/// The finished average of all aligned augmented landmark sets.
#[derive(Debug, Clone, PartialEq)]
pub struct AverageLayout {
    shape: Shape,
    num_faces: usize,
}

impl AverageLayout {
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn into_shape(self) -> Shape {
        self.shape
    }

    pub fn num_faces(&self) -> usize {
        self.num_faces
    }

    /// Delaunay correspondence triangles of the average layout inside `rect`.
    pub fn triangulate(&self, rect: Rect) -> Result<Vec<Triangle>> {
        let triangles = delaunay_triangles(rect, &self.shape.points);
        if triangles.is_empty() {
            return Err(Error::EmptyTriangulation);
        }
        Ok(triangles)
    }
}

/// Sums warped face images and divides by the count at the end.
#[derive(Debug, Clone)]
pub struct Compositor {
    sum: Rgb32FImage,
    count: usize,
}

impl Compositor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            sum: Rgb32FImage::new(width, height),
            count: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Add a warped face. Its size must match the canvas.
    pub fn add(&mut self, image: &Rgb32FImage) -> Result<()> {
        if image.dimensions() != self.sum.dimensions() {
            return Err(Error::InvalidConfig(format!(
                "warped face is {}x{}, canvas is {}x{}",
                image.width(),
                image.height(),
                self.sum.width(),
                self.sum.height()
            )));
        }
        let sum: &mut [f32] = &mut self.sum;
        for (acc, v) in sum.iter_mut().zip(image.as_raw().iter()) {
            *acc += *v;
        }
        self.count += 1;
        Ok(())
    }

    /// The mean of all added images.
    pub fn finish(mut self) -> Result<Rgb32FImage> {
        if self.count == 0 {
            return Err(Error::IncompleteAverage {
                expected: 1,
                added: 0,
            });
        }
        let n = self.count as f32;
        let sum: &mut [f32] = &mut self.sum;
        for v in sum.iter_mut() {
            *v /= n;
        }
        Ok(self.sum)
    }
}
