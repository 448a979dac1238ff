use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed landmark file {path:?} at line {line}: {reason}")]
    MalformedLandmarks {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("No image found for landmark file {0:?}")]
    MissingImage(PathBuf),

    #[error("Face {name} has {found} landmarks, expected {expected}")]
    LandmarkCount {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Degenerate similarity transform for face {0}: anchor points coincide")]
    DegenerateTransform(String),

    #[error("Delaunay triangulation produced no triangles inside the canvas")]
    EmptyTriangulation,

    #[error("Landmark average is incomplete: {added} of {expected} faces accumulated")]
    IncompleteAverage { expected: usize, added: usize },

    #[error("No faces to average")]
    NoFaces,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
