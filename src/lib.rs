//! # average-face
//!
//! Composite "average face" images from a set of portraits and their facial
//! landmarks.
//!
//! This crate provides:
//! - **Alignment**: a similarity transform per face that puts the outer eye
//!   corners on fixed canvas positions
//! - **Correspondence**: a Delaunay triangulation of the average landmark
//!   layout, expressed as landmark index triples shared by every face
//! - **Warping**: piecewise-affine, triangle-by-triangle warping of each face
//!   onto the average layout with masked compositing
//! - **Averaging**: incremental landmark averaging and image accumulation
//!
//! ## Algorithm Overview
//!
//! 1. For each face, estimate a similarity transform from its two eye corners
//!    to the canonical eye positions; warp the image and landmarks with it
//! 2. Append eight canvas boundary points and accumulate the running average
//!    layout (`avg += points / n`)
//! 3. Triangulate the finished average layout
//! 4. Warp every face triangle by triangle onto the average layout
//! 5. Average the warped faces
//!
//! ## Quick Start
//!
//! ```rust
//! use average_face::{EyeCorners, FaceSample, Pipeline, PipelineConfig, Point, Shape};
//! use image::{Rgb, Rgb32FImage};
//!
//! let config = PipelineConfig {
//!     width: 120,
//!     height: 120,
//!     eye_corners: EyeCorners::new(0, 1),
//!     ..PipelineConfig::default()
//! };
//! let pipeline = Pipeline::new(config).unwrap();
//!
//! let landmarks = Shape::new(vec![
//!     Point::new(36.0, 40.0), // left eye corner
//!     Point::new(84.0, 40.0), // right eye corner
//!     Point::new(60.0, 70.0), // mouth
//! ]);
//! let faces = vec![
//!     FaceSample {
//!         name: "red".into(),
//!         image: Rgb32FImage::from_pixel(120, 120, Rgb([1.0, 0.0, 0.0])),
//!         landmarks: landmarks.clone(),
//!     },
//!     FaceSample {
//!         name: "blue".into(),
//!         image: Rgb32FImage::from_pixel(120, 120, Rgb([0.0, 0.0, 1.0])),
//!         landmarks,
//!     },
//! ];
//!
//! let average = pipeline.run(faces).unwrap();
//! let center = average.image.get_pixel(60, 60);
//! assert!((center[0] - 0.5).abs() < 1e-3 && (center[2] - 0.5).abs() < 1e-3);
//! ```
//!
//! Faces on disk are loaded with [`io::load_faces`]: one `<name>.txt` file of
//! `x y` landmark pairs per face next to its image.

pub mod average;
pub mod delaunay;
mod error;
pub mod geometry;
pub mod io;
pub mod pipeline;
pub mod transform;
mod types;
pub mod warp;

pub use average::{AverageLayout, Compositor, LandmarkAccumulator};
pub use delaunay::{delaunay_triangles, Subdivision};
pub use error::{Error, Result};
pub use pipeline::{
    AlignedFace, AverageFace, EyeCorners, FaceSample, Pipeline, PipelineConfig, LEFT_EYE_OUTER,
    RIGHT_EYE_OUTER,
};
pub use transform::{similarity_transform, AffineTransform};
pub use types::{boundary_points, PixelRect, Point, Rect, Shape, Triangle, NUM_BOUNDARY_POINTS};
pub use warp::{warp_triangle, BorderMode};
