//! Image resampling: whole-image affine warps and per-triangle warping with
//! masked compositing.
//!
//! Images are `Rgb32FImage` buffers with channel values in `[0, 1]`. Pixel
//! centres sit at integer coordinates and sampling is bilinear.

use image::imageops;
use image::Rgb32FImage;
use rayon::prelude::*;

use crate::geometry::{bounding_rect, point_in_triangle};
use crate::transform::AffineTransform;
use crate::types::{PixelRect, Point};

/// Distance in pixels by which the triangle mask reaches past each edge, so
/// pixel centres on a shared edge belong to both triangles.
const MASK_EDGE_TOLERANCE: f32 = 1e-3;

/// How samples outside the source image are produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BorderMode {
    /// Use the given value for every channel.
    Constant(f32),
    /// Mirror without repeating the edge pixel: `dcb|abcd|cba`.
    Reflect101,
}

fn map_coord(coord: i64, len: usize, mode: BorderMode) -> Option<usize> {
    let n = len as i64;
    if n <= 0 {
        return None;
    }

    match mode {
        BorderMode::Constant(_) => {
            if coord < 0 || coord >= n {
                None
            } else {
                Some(coord as usize)
            }
        }
        BorderMode::Reflect101 => {
            if n == 1 {
                return Some(0);
            }
            let period = 2 * n - 2;
            let mut c = coord % period;
            if c < 0 {
                c += period;
            }
            if c >= n {
                c = period - c;
            }
            Some(c as usize)
        }
    }
}

fn sample_pixel(img: &Rgb32FImage, x: i64, y: i64, border: BorderMode) -> [f32; 3] {
    let width = img.width() as usize;
    let height = img.height() as usize;

    match (map_coord(x, width, border), map_coord(y, height, border)) {
        (Some(ix), Some(iy)) => {
            let i = (iy * width + ix) * 3;
            let raw = img.as_raw();
            [raw[i], raw[i + 1], raw[i + 2]]
        }
        _ => match border {
            BorderMode::Constant(v) => [v; 3],
            _ => [0.0; 3],
        },
    }
}

/// Sample a pixel with bilinear interpolation for sub-pixel accuracy.
fn sample_bilinear(img: &Rgb32FImage, x: f64, y: f64, border: BorderMode) -> [f32; 3] {
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let p00 = sample_pixel(img, x0, y0, border);
    let p10 = sample_pixel(img, x0 + 1, y0, border);
    let p01 = sample_pixel(img, x0, y0 + 1, border);
    let p11 = sample_pixel(img, x0 + 1, y0 + 1, border);

    let mut out = [0.0f32; 3];
    for c in 0..3 {
        let top = p00[c] * (1.0 - fx) + p10[c] * fx;
        let bottom = p01[c] * (1.0 - fx) + p11[c] * fx;
        out[c] = top * (1.0 - fy) + bottom * fy;
    }
    out
}

/// Resample `src` into a `width` x `height` image. `dst_to_src` maps each
/// destination pixel centre to its source position.
pub fn remap_affine(
    src: &Rgb32FImage,
    dst_to_src: &AffineTransform,
    width: u32,
    height: u32,
    border: BorderMode,
) -> Rgb32FImage {
    let mut dst = Rgb32FImage::new(width, height);
    if width == 0 || height == 0 {
        return dst;
    }

    let row_len = width as usize * 3;
    let buf: &mut [f32] = &mut dst;
    buf.par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..width as usize {
                let (sx, sy) = dst_to_src.apply_xy(x as f64, y as f64);
                let px = sample_bilinear(src, sx, sy, border);
                row[x * 3..x * 3 + 3].copy_from_slice(&px);
            }
        });

    dst
}

/// Warp `src` by the forward transform `src_to_dst` into a `width` x `height`
/// image. Returns `None` if the transform is not invertible.
pub fn warp_affine(
    src: &Rgb32FImage,
    src_to_dst: &AffineTransform,
    width: u32,
    height: u32,
    border: BorderMode,
) -> Option<Rgb32FImage> {
    let inverse = src_to_dst.inverse()?;
    Some(remap_affine(src, &inverse, width, height, border))
}

/// Binary mask of a triangle, one value per pixel of a `width` x `height`
/// grid: 1.0 where the pixel centre lies in the closed triangle, else 0.0.
pub fn triangle_mask(tri: &[Point; 3], width: u32, height: u32) -> Vec<f32> {
    let mut mask = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            let inside = point_in_triangle(Point::from_pixel(x, y), tri, MASK_EDGE_TOLERANCE);
            mask.push(if inside { 1.0 } else { 0.0 });
        }
    }
    mask
}

/// Intersect a rectangle with the `width` x `height` image grid.
fn clip_rect(r: PixelRect, width: u32, height: u32) -> Option<PixelRect> {
    let x0 = r.x.max(0);
    let y0 = r.y.max(0);
    let x1 = (r.x + r.width as i64).min(width as i64);
    let y1 = (r.y + r.height as i64).min(height as i64);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(PixelRect {
        x: x0,
        y: y0,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
    })
}

fn offset_triangle(tri: &[Point; 3], r: &PixelRect) -> [Point; 3] {
    let origin = Point::new(r.x as f32, r.y as f32);
    [tri[0] - origin, tri[1] - origin, tri[2] - origin]
}

/// Warp the triangular region `src_tri` of `src` onto `dst_tri` in `dst`.
///
/// Works on the bounding boxes of both triangles: the source box is resampled
/// into the destination box through the affine map between the box-local
/// triangles (reflecting at the source box edges), then blended in through the
/// destination triangle mask as `dst * (1 - mask) + warped * mask`. Pixels of
/// `dst` outside the destination triangle are left untouched. A destination
/// triangle of zero area writes nothing.
pub fn warp_triangle(
    src: &Rgb32FImage,
    dst: &mut Rgb32FImage,
    src_tri: &[Point; 3],
    dst_tri: &[Point; 3],
) {
    let Some(r1) = clip_rect(bounding_rect(src_tri), src.width(), src.height()) else {
        return;
    };
    let Some(r2) = clip_rect(bounding_rect(dst_tri), dst.width(), dst.height()) else {
        return;
    };

    let src_local = offset_triangle(src_tri, &r1);
    let dst_local = offset_triangle(dst_tri, &r2);

    let Some(dst_to_src) = AffineTransform::from_triangles(&dst_local, &src_local) else {
        return;
    };

    let patch = imageops::crop_imm(src, r1.x as u32, r1.y as u32, r1.width, r1.height).to_image();
    let warped = remap_affine(&patch, &dst_to_src, r2.width, r2.height, BorderMode::Reflect101);
    let mask = triangle_mask(&dst_local, r2.width, r2.height);

    for j in 0..r2.height {
        for i in 0..r2.width {
            let m = mask[(j * r2.width + i) as usize];
            if m == 0.0 {
                continue;
            }
            let w = warped.get_pixel(i, j);
            let d = dst.get_pixel_mut(r2.x as u32 + i, r2.y as u32 + j);
            for c in 0..3 {
                d[c] = d[c] * (1.0 - m) + w[c] * m;
            }
        }
    }
}
