//! The three-phase averaging pipeline.
//!
//! 1. Align every face: a similarity transform puts its outer eye corners on
//!    fixed canvas positions, and the image and landmarks are warped with it.
//!    The aligned landmark sets (plus canvas boundary points) are averaged.
//! 2. Triangulate the finished average layout.
//! 3. Warp every aligned face triangle by triangle onto the average layout and
//!    average the results.
//!
//! Phases 1 and 3 may run per face on the rayon pool; accumulation always
//! happens in input order, so a parallel run matches a sequential one exactly.

use image::Rgb32FImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::average::{AverageLayout, Compositor, LandmarkAccumulator};
use crate::error::{Error, Result};
use crate::geometry::clamp_point;
use crate::transform::similarity_transform;
use crate::types::{Point, Rect, Shape, Triangle};
use crate::warp::{warp_affine, warp_triangle, BorderMode};

/// Outer corner of the left eye in the 68-point iBUG annotation scheme.
pub const LEFT_EYE_OUTER: usize = 36;

/// Outer corner of the right eye in the 68-point iBUG annotation scheme.
pub const RIGHT_EYE_OUTER: usize = 45;

/// Landmark indices used as the two alignment anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EyeCorners {
    pub left: usize,
    pub right: usize,
}

impl EyeCorners {
    pub const fn new(left: usize, right: usize) -> Self {
        Self { left, right }
    }

    /// Canvas positions the anchors are mapped to: a third of the way down,
    /// at 30% and 70% of the width.
    pub fn targets(width: u32, height: u32) -> [Point; 2] {
        let w = width as f64;
        let y = (height as f64 / 3.0).floor() as f32;
        [
            Point::new((0.3 * w).floor() as f32, y),
            Point::new((0.7 * w).floor() as f32, y),
        ]
    }

    fn max_index(&self) -> usize {
        self.left.max(self.right)
    }
}

impl Default for EyeCorners {
    fn default() -> Self {
        Self::new(LEFT_EYE_OUTER, RIGHT_EYE_OUTER)
    }
}

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Output canvas width in pixels.
    pub width: u32,
    /// Output canvas height in pixels.
    pub height: u32,
    pub eye_corners: EyeCorners,
    /// Align and warp faces on the rayon thread pool. Row resampling inside
    /// each warp is parallel either way.
    pub parallel: bool,
    /// Skip faces that fail to load or align instead of aborting the run.
    pub skip_invalid: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            width: 600,
            height: 600,
            eye_corners: EyeCorners::default(),
            parallel: true,
            skip_invalid: false,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.width < 2 || self.height < 2 {
            return Err(Error::InvalidConfig(format!(
                "canvas must be at least 2x2, got {}x{}",
                self.width, self.height
            )));
        }
        if self.eye_corners.left == self.eye_corners.right {
            return Err(Error::InvalidConfig(format!(
                "eye corner indices must differ, both are {}",
                self.eye_corners.left
            )));
        }
        Ok(())
    }

    pub fn canvas(&self) -> Rect {
        Rect::canvas(self.width, self.height)
    }
}

/// One input face: an RGB image with channel values in `[0, 1]` and its
/// landmarks in image coordinates.
#[derive(Debug, Clone)]
pub struct FaceSample {
    pub name: String,
    pub image: Rgb32FImage,
    pub landmarks: Shape,
}

/// A face after phase 1: image and augmented landmarks in canvas coordinates.
#[derive(Debug, Clone)]
pub struct AlignedFace {
    pub name: String,
    pub image: Rgb32FImage,
    pub points: Shape,
}

/// Result of a pipeline run.
#[derive(Debug, Clone)]
pub struct AverageFace {
    /// The averaged face image.
    pub image: Rgb32FImage,
    /// Average augmented landmark layout (landmarks followed by boundary points).
    pub landmarks: Shape,
    /// Correspondence triangles over the layout's index space.
    pub triangles: Vec<Triangle>,
    /// Faces that contributed to the average.
    pub num_faces: usize,
    /// Names of faces dropped under the skip policy.
    pub skipped: Vec<String>,
}

/// Drives the alignment, triangulation, and compositing phases.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    fn map_faces<T, U, F>(&self, items: &[T], f: F) -> Vec<U>
    where
        T: Sync,
        U: Send,
        F: Fn(&T) -> U + Sync + Send,
    {
        if self.config.parallel {
            items.par_iter().map(f).collect()
        } else {
            items.iter().map(f).collect()
        }
    }

    /// Align one face to the canvas via its eye corners.
    pub fn align_face(&self, sample: &FaceSample) -> Result<AlignedFace> {
        let PipelineConfig {
            width,
            height,
            eye_corners,
            ..
        } = self.config;

        let found = sample.landmarks.num_landmarks();
        if found <= eye_corners.max_index() {
            return Err(Error::LandmarkCount {
                name: sample.name.clone(),
                expected: eye_corners.max_index() + 1,
                found,
            });
        }

        let anchors = [
            sample.landmarks[eye_corners.left],
            sample.landmarks[eye_corners.right],
        ];
        let tform = similarity_transform(anchors, EyeCorners::targets(width, height))
            .ok_or_else(|| Error::DegenerateTransform(sample.name.clone()))?;

        let image = warp_affine(&sample.image, &tform, width, height, BorderMode::Constant(0.0))
            .ok_or_else(|| Error::DegenerateTransform(sample.name.clone()))?;
        let points = tform.apply_shape(&sample.landmarks).augmented(width, height);

        debug!("Aligned {} (scale {:.3})", sample.name, tform.determinant().sqrt());
        Ok(AlignedFace {
            name: sample.name.clone(),
            image,
            points,
        })
    }

    /// Average the aligned layouts in order, `avg += points / n` per face.
    pub fn average_landmarks(&self, faces: &[AlignedFace]) -> Result<AverageLayout> {
        let num_points = faces.first().map_or(0, |f| f.points.num_landmarks());
        let mut acc = LandmarkAccumulator::new(num_points, faces.len());
        for face in faces {
            acc.add(&face.points)?;
            trace!("Averaged landmarks of {} ({} so far)", face.name, acc.added());
        }
        acc.finish()
    }

    /// Warp an aligned face onto the average layout, one triangle at a time,
    /// into a fresh black canvas.
    pub fn warp_face(
        &self,
        face: &AlignedFace,
        layout: &AverageLayout,
        triangles: &[Triangle],
    ) -> Rgb32FImage {
        let (width, height) = (self.config.width, self.config.height);
        let mut canvas = Rgb32FImage::new(width, height);
        let average = &layout.shape().points;

        for tri in triangles {
            let src = tri.vertices(&face.points.points).map(|p| clamp_point(p, width, height));
            let dst = tri.vertices(average).map(|p| clamp_point(p, width, height));
            warp_triangle(&face.image, &mut canvas, &src, &dst);
        }
        canvas
    }

    /// Run all three phases over `samples`.
    pub fn run(&self, samples: Vec<FaceSample>) -> Result<AverageFace> {
        let Some(first) = samples.first() else {
            return Err(Error::NoFaces);
        };
        let num_landmarks = first.landmarks.num_landmarks();
        let mut skipped = Vec::new();

        let mut candidates = Vec::with_capacity(samples.len());
        for sample in samples {
            if sample.landmarks.num_landmarks() == num_landmarks {
                candidates.push(sample);
                continue;
            }
            let err = Error::LandmarkCount {
                name: sample.name.clone(),
                expected: num_landmarks,
                found: sample.landmarks.num_landmarks(),
            };
            if !self.config.skip_invalid {
                return Err(err);
            }
            warn!("Skipping {}: {}", sample.name, err);
            skipped.push(sample.name);
        }

        info!("Aligning {} faces", candidates.len());
        let results = self.map_faces(&candidates, |s| self.align_face(s));
        let mut aligned = Vec::with_capacity(results.len());
        for (sample, result) in candidates.iter().zip(results) {
            match result {
                Ok(face) => aligned.push(face),
                Err(err) if self.config.skip_invalid => {
                    warn!("Skipping {}: {}", sample.name, err);
                    skipped.push(sample.name.clone());
                }
                Err(err) => return Err(err),
            }
        }
        drop(candidates);
        if aligned.is_empty() {
            return Err(Error::NoFaces);
        }

        let layout = self.average_landmarks(&aligned)?;

        let triangles = layout.triangulate(self.config.canvas())?;
        info!(
            "Triangulated average layout of {} points into {} triangles",
            layout.shape().num_landmarks(),
            triangles.len()
        );

        info!("Warping {} faces onto the average layout", aligned.len());
        let warped = self.map_faces(&aligned, |face| self.warp_face(face, &layout, &triangles));
        let mut compositor = Compositor::new(self.config.width, self.config.height);
        for image in &warped {
            compositor.add(image)?;
        }
        let image = compositor.finish()?;

        Ok(AverageFace {
            image,
            num_faces: layout.num_faces(),
            landmarks: layout.into_shape(),
            triangles,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            width: 120,
            height: 120,
            eye_corners: EyeCorners::new(0, 1),
            parallel: false,
            skip_invalid: false,
        }
    }

    /// Five landmarks with the eye corners already on their canvas targets.
    fn canonical_landmarks() -> Shape {
        Shape::new(vec![
            Point::new(36.0, 40.0),
            Point::new(84.0, 40.0),
            Point::new(60.0, 62.0),
            Point::new(44.0, 86.0),
            Point::new(76.0, 86.0),
        ])
    }

    fn sample(name: &str, color: [f32; 3]) -> FaceSample {
        FaceSample {
            name: name.to_string(),
            image: Rgb32FImage::from_pixel(120, 120, Rgb(color)),
            landmarks: canonical_landmarks(),
        }
    }

    #[test]
    fn eye_targets_for_default_canvas() {
        let [left, right] = EyeCorners::targets(600, 600);
        assert_eq!(left, Point::new(180.0, 200.0));
        assert_eq!(right, Point::new(420.0, 200.0));
    }

    #[test]
    fn default_eye_corners_follow_68_point_scheme() {
        let eyes = EyeCorners::default();
        assert_eq!(eyes.left, 36);
        assert_eq!(eyes.right, 45);
    }

    #[test]
    fn config_validation() {
        assert!(PipelineConfig::default().validate().is_ok());

        let tiny = PipelineConfig {
            width: 1,
            ..PipelineConfig::default()
        };
        assert!(matches!(tiny.validate(), Err(Error::InvalidConfig(_))));

        let same_eyes = PipelineConfig {
            eye_corners: EyeCorners::new(3, 3),
            ..PipelineConfig::default()
        };
        assert!(Pipeline::new(same_eyes).is_err());
    }

    #[test]
    fn align_maps_eye_corners_to_targets() {
        let pipeline = Pipeline::new(small_config()).unwrap();
        let mut s = sample("a", [1.0, 1.0, 1.0]);
        s.landmarks = Shape::new(vec![
            Point::new(20.0, 30.0),
            Point::new(50.0, 36.0),
            Point::new(35.0, 50.0),
        ]);

        let aligned = pipeline.align_face(&s).unwrap();
        let [left, right] = EyeCorners::targets(120, 120);
        assert!(aligned.points[0].distance(&left) < 1e-3);
        assert!(aligned.points[1].distance(&right) < 1e-3);
        assert_eq!(aligned.points.num_landmarks(), 3 + 8);
        assert_eq!(aligned.image.dimensions(), (120, 120));
    }

    #[test]
    fn align_rejects_coincident_eyes() {
        let pipeline = Pipeline::new(small_config()).unwrap();
        let mut s = sample("flat", [1.0, 1.0, 1.0]);
        s.landmarks[1] = s.landmarks[0];
        assert!(matches!(
            pipeline.align_face(&s),
            Err(Error::DegenerateTransform(name)) if name == "flat"
        ));
    }

    #[test]
    fn align_rejects_too_few_landmarks() {
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let s = sample("short", [1.0, 1.0, 1.0]);
        assert!(matches!(
            pipeline.align_face(&s),
            Err(Error::LandmarkCount { expected: 46, found: 5, .. })
        ));
    }

    #[test]
    fn run_without_faces_fails() {
        let pipeline = Pipeline::new(small_config()).unwrap();
        assert!(matches!(pipeline.run(Vec::new()), Err(Error::NoFaces)));
    }

    #[test]
    fn mismatched_landmark_counts_abort_by_default() {
        let pipeline = Pipeline::new(small_config()).unwrap();
        let mut odd = sample("odd", [0.0, 1.0, 0.0]);
        odd.landmarks.points.pop();
        let result = pipeline.run(vec![sample("a", [1.0, 0.0, 0.0]), odd]);
        assert!(matches!(result, Err(Error::LandmarkCount { .. })));
    }

    #[test]
    fn skip_policy_drops_bad_faces_from_the_count() {
        let config = PipelineConfig {
            skip_invalid: true,
            ..small_config()
        };
        let pipeline = Pipeline::new(config).unwrap();

        let mut flat = sample("flat", [0.0, 1.0, 0.0]);
        flat.landmarks[1] = flat.landmarks[0];
        let mut short = sample("short", [0.0, 1.0, 0.0]);
        short.landmarks.points.pop();

        let result = pipeline
            .run(vec![sample("red", [1.0, 0.0, 0.0]), flat, short])
            .unwrap();

        assert_eq!(result.num_faces, 1);
        assert_eq!(result.skipped, vec!["short".to_string(), "flat".to_string()]);
        let center = result.image.get_pixel(60, 60);
        assert!((center[0] - 1.0).abs() < 1e-3);
        assert!(center[1].abs() < 1e-3);
    }

    #[test]
    fn averaged_layout_keeps_canonical_points() {
        let pipeline = Pipeline::new(small_config()).unwrap();
        let result = pipeline
            .run(vec![sample("a", [1.0, 0.0, 0.0]), sample("b", [0.0, 0.0, 1.0])])
            .unwrap();

        assert_eq!(result.landmarks.num_landmarks(), 5 + 8);
        for (avg, orig) in result.landmarks.points.iter().zip(&canonical_landmarks().points) {
            assert!(avg.distance(orig) < 1e-3);
        }
        for t in &result.triangles {
            assert!(t.indices().iter().all(|&i| i < 13));
        }
    }

    #[test]
    fn parallel_and_sequential_runs_agree() {
        let faces = || {
            vec![
                sample("a", [1.0, 0.0, 0.0]),
                sample("b", [0.0, 0.5, 1.0]),
                sample("c", [0.2, 0.9, 0.1]),
            ]
        };
        let sequential = Pipeline::new(small_config()).unwrap().run(faces()).unwrap();
        let parallel = Pipeline::new(PipelineConfig {
            parallel: true,
            ..small_config()
        })
        .unwrap()
        .run(faces())
        .unwrap();

        assert_eq!(sequential.landmarks, parallel.landmarks);
        assert_eq!(sequential.image.as_raw(), parallel.image.as_raw());
    }
}
