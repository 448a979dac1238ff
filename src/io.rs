//! Reading faces from disk and writing results.
//!
//! An input directory holds one landmark file per face, `<name>.txt`, with one
//! `x y` pair per line, next to the face image. The image is either `<name>`
//! itself when it already ends in an image extension (`photo.jpg.txt` pairs
//! with `photo.jpg`), or `<name>.<ext>` for one of [`IMAGE_EXTENSIONS`].

use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use image::{Rgb32FImage, RgbImage};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::pipeline::FaceSample;
use crate::types::{Point, Shape};

/// Image extensions tried when pairing a landmark file with its image.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"];

const LANDMARK_EXTENSION: &str = "txt";

/// A landmark file and the image it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceFiles {
    pub name: String,
    pub landmarks: PathBuf,
    pub image: PathBuf,
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn is_image_path(path: &Path) -> bool {
    IMAGE_EXTENSIONS.iter().any(|ext| has_extension(path, ext))
}

/// Parse a landmark file: one whitespace-separated `x y` pair per line.
/// Blank lines are ignored.
pub fn read_landmarks<P: AsRef<Path>>(path: P) -> Result<Shape> {
    let path = path.as_ref();
    let reader = BufReader::new(fs::File::open(path)?);
    let malformed = |line: usize, reason: String| Error::MalformedLandmarks {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let mut shape = Shape::with_capacity(68);
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [] => continue,
            [x, y] => {
                let x: f32 = x
                    .parse()
                    .map_err(|_| malformed(i + 1, format!("invalid x coordinate {:?}", x)))?;
                let y: f32 = y
                    .parse()
                    .map_err(|_| malformed(i + 1, format!("invalid y coordinate {:?}", y)))?;
                if !x.is_finite() || !y.is_finite() {
                    return Err(malformed(i + 1, "non-finite coordinate".into()));
                }
                shape.points.push(Point::new(x, y));
            }
            _ => {
                return Err(malformed(
                    i + 1,
                    format!("expected 2 values, found {}", fields.len()),
                ))
            }
        }
    }

    if shape.points.is_empty() {
        return Err(malformed(0, "no landmarks".into()));
    }
    Ok(shape)
}

/// Find the image paired with a landmark file.
pub fn find_image_for(landmarks: &Path) -> Option<PathBuf> {
    let base = landmarks.with_extension("");
    if is_image_path(&base) {
        if base.is_file() {
            return Some(base);
        }
        // Pairing is case-insensitive on the file name.
        let dir = base.parent()?;
        let wanted = base.file_name()?.to_str()?.to_lowercase();
        return fs::read_dir(dir).ok()?.flatten().map(|e| e.path()).find(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.to_lowercase() == wanted)
        });
    }

    IMAGE_EXTENSIONS.iter().find_map(|ext| {
        [ext.to_string(), ext.to_uppercase()]
            .into_iter()
            .map(|e| append_extension(&base, &e))
            .find(|p| p.is_file())
    })
}

/// `base` with `.ext` appended; unlike `with_extension`, dots already in the
/// file name are kept.
fn append_extension(base: &Path, ext: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// List the faces in `dir`, sorted by landmark file name.
///
/// A landmark file without an image is an error unless `skip_missing` is set,
/// in which case it is logged and left out.
pub fn discover_faces<P: AsRef<Path>>(dir: P, skip_missing: bool) -> Result<Vec<FaceFiles>> {
    let dir = dir.as_ref();
    let mut landmark_files: Vec<PathBuf> = fs::read_dir(dir)?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && has_extension(p, LANDMARK_EXTENSION))
        .collect();
    landmark_files.sort();
    debug!("Found {} landmark files in {}", landmark_files.len(), dir.display());

    let mut faces = Vec::with_capacity(landmark_files.len());
    for landmarks in landmark_files {
        let name = landmarks
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match find_image_for(&landmarks) {
            Some(image) => faces.push(FaceFiles {
                name,
                landmarks,
                image,
            }),
            None if skip_missing => {
                warn!("Skipping {}: no image found", landmarks.display());
            }
            None => return Err(Error::MissingImage(landmarks)),
        }
    }
    Ok(faces)
}

/// Decode an image as RGB with channel values in `[0, 1]`.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Rgb32FImage> {
    Ok(image::open(path)?.to_rgb32f())
}

/// Load a face's image and landmarks.
pub fn load_face(files: &FaceFiles) -> Result<FaceSample> {
    let landmarks = read_landmarks(&files.landmarks)?;
    let image = load_image(&files.image)?;
    debug!(
        "Loaded {} ({}x{}, {} landmarks)",
        files.name,
        image.width(),
        image.height(),
        landmarks.num_landmarks()
    );
    Ok(FaceSample {
        name: files.name.clone(),
        image,
        landmarks,
    })
}

/// Load every face in `dir`.
///
/// With `skip_invalid`, faces whose files are missing or fail to load are
/// logged and skipped; their names are returned alongside the samples.
/// Otherwise the first failure aborts.
pub fn load_faces<P: AsRef<Path>>(
    dir: P,
    skip_invalid: bool,
) -> Result<(Vec<FaceSample>, Vec<String>)> {
    let dir = dir.as_ref();
    let files = discover_faces(dir, skip_invalid)?;
    let mut samples = Vec::with_capacity(files.len());
    let mut skipped = Vec::new();

    for f in &files {
        match load_face(f) {
            Ok(sample) => samples.push(sample),
            Err(err) if skip_invalid => {
                warn!("Skipping {}: {}", f.name, err);
                skipped.push(f.name.clone());
            }
            Err(err) => return Err(err),
        }
    }

    if samples.is_empty() {
        return Err(Error::NoFaces);
    }
    info!("Loaded {} faces from {}", samples.len(), dir.display());
    Ok((samples, skipped))
}

/// Convert a float image to 8 bits, clamping to `[0, 1]`.
pub fn to_rgb8(image: &Rgb32FImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y);
        image::Rgb(p.0.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8))
    })
}

/// Save a float image; the format follows the file extension. Missing parent
/// directories are created.
pub fn save_image<P: AsRef<Path>>(image: &Rgb32FImage, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    to_rgb8(image).save(path)?;
    Ok(())
}

/// Write a landmark layout: JSON for a `.json` path, otherwise one `x y` pair
/// per line.
pub fn write_landmarks<P: AsRef<Path>>(shape: &Shape, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(fs::File::create(path)?);
    if has_extension(path, "json") {
        serde_json::to_writer_pretty(&mut writer, shape)?;
    } else {
        for p in &shape.points {
            writeln!(writer, "{:.3} {:.3}", p.x, p.y)?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn parses_integer_and_decimal_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.txt", "10 20\n  30\t40 \n\n5.5 6.25\n");
        let shape = read_landmarks(&path).unwrap();
        assert_eq!(
            shape.points,
            vec![
                Point::new(10.0, 20.0),
                Point::new(30.0, 40.0),
                Point::new(5.5, 6.25)
            ]
        );
    }

    #[test]
    fn malformed_lines_report_their_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "bad.txt", "1 2\n3 4 5\n");
        match read_landmarks(&path) {
            Err(Error::MalformedLandmarks { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected MalformedLandmarks, got {:?}", other),
        }

        let path = write(dir.path(), "nan.txt", "1 x\n");
        assert!(matches!(
            read_landmarks(&path),
            Err(Error::MalformedLandmarks { line: 1, .. })
        ));

        let path = write(dir.path(), "empty.txt", "\n\n");
        assert!(read_landmarks(&path).is_err());
    }

    #[test]
    fn pairs_landmarks_with_images() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbImage::new(4, 4);
        img.save(dir.path().join("b.png")).unwrap();
        img.save(dir.path().join("a.jpg")).unwrap();
        write(dir.path(), "a.jpg.txt", "1 1\n");
        write(dir.path(), "b.txt", "1 1\n");

        let faces = discover_faces(dir.path(), false).unwrap();
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0].image, dir.path().join("a.jpg"));
        assert_eq!(faces[0].name, "a.jpg");
        assert_eq!(faces[1].image, dir.path().join("b.png"));
        assert_eq!(faces[1].name, "b");
    }

    #[test]
    fn dotted_names_keep_their_full_stem() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbImage::new(4, 4);
        img.save(dir.path().join("john.smith.jpg")).unwrap();
        write(dir.path(), "john.smith.txt", "1 1\n");

        assert_eq!(
            find_image_for(&dir.path().join("john.smith.txt")),
            Some(dir.path().join("john.smith.jpg"))
        );

        // A shorter name sharing the prefix must not steal the pairing.
        img.save(dir.path().join("john.jpg")).unwrap();
        write(dir.path(), "john.txt", "1 1\n");

        let faces = discover_faces(dir.path(), false).unwrap();
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0].name, "john.smith");
        assert_eq!(faces[0].image, dir.path().join("john.smith.jpg"));
        assert_eq!(faces[1].name, "john");
        assert_eq!(faces[1].image, dir.path().join("john.jpg"));
    }

    #[test]
    fn missing_image_is_fatal_unless_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "lonely.txt", "1 1\n");

        assert!(matches!(
            discover_faces(dir.path(), false),
            Err(Error::MissingImage(_))
        ));
        assert!(discover_faces(dir.path(), true).unwrap().is_empty());
        assert!(matches!(load_faces(dir.path(), true), Err(Error::NoFaces)));
    }

    #[test]
    fn load_faces_skips_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]))
            .save(dir.path().join("good.png"))
            .unwrap();
        write(dir.path(), "good.txt", "1 1\n2 2\n");
        write(dir.path(), "broken.png", "not an image");
        write(dir.path(), "broken.txt", "1 1\n2 2\n");

        assert!(load_faces(dir.path(), false).is_err());

        let (samples, skipped) = load_faces(dir.path(), true).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].name, "good");
        assert_eq!(samples[0].image.get_pixel(0, 0), &Rgb([1.0, 0.0, 0.0]));
        assert_eq!(skipped, vec!["broken".to_string()]);
    }

    #[test]
    fn saves_images_and_layouts() {
        let dir = tempfile::tempdir().unwrap();
        let img = Rgb32FImage::from_pixel(3, 2, Rgb([0.5, 1.5, -0.2]));
        let out = dir.path().join("nested/out.png");
        save_image(&img, &out).unwrap();
        let back = image::open(&out).unwrap().to_rgb8();
        assert_eq!(back.get_pixel(2, 1), &Rgb([128, 255, 0]));

        let shape = Shape::new(vec![Point::new(1.5, 2.0), Point::new(3.0, 4.25)]);
        let txt = dir.path().join("avg.txt");
        write_landmarks(&shape, &txt).unwrap();
        assert_eq!(read_landmarks(&txt).unwrap(), shape);

        let json = dir.path().join("avg.json");
        write_landmarks(&shape, &json).unwrap();
        let parsed: Shape = serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(parsed, shape);
    }
}
