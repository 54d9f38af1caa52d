use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::edges::canny;
use imageproc::filter::{box_filter, gaussian_blur_f32};
use imageproc::hough::{detect_lines, LineDetectionOptions, PolarLine};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::types::{CanonicalImage, RawImage};

/// File extensions (lower-case, without the dot) picked up by [`discover_images`].
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff"];

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Image not readable: {0}")]
    NotReadable(#[from] image::ImageError),
    #[error("Image has no pixels ({width}x{height})")]
    Empty { width: u32, height: u32 },
    #[error("Deskew failed: {0}")]
    Deskew(String),
}

/// Tuning knobs for [`ImagePreprocessor`]. Defaults suit phone photos of
/// book covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessOptions {
    /// Longer side is scaled down to this when exceeded.
    pub max_side: u32,
    /// σ of the smoothing pass. 1.1 is the σ of a 5×5 Gaussian; imageproc
    /// samples it over radius ⌈2σ⌉, whose outer taps round to zero in u8.
    pub blur_sigma: f32,
    /// Half-width of the thresholding window (5 → 11×11 block).
    pub block_radius: u32,
    /// Subtracted from the local mean before comparing.
    pub threshold_offset: i32,
    pub canny_low: f32,
    pub canny_high: f32,
    pub hough_votes: u32,
    pub hough_suppression: u32,
    pub min_segment_len: u32,
    pub max_segment_gap: u32,
    /// Skew below this (degrees) is left alone.
    pub min_skew_degrees: f32,
    pub deskew: bool,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            max_side: 2000,
            blur_sigma: 1.1,
            block_radius: 5,
            threshold_offset: 2,
            canny_low: 50.0,
            canny_high: 150.0,
            hough_votes: 100,
            hough_suppression: 8,
            min_segment_len: 100,
            max_segment_gap: 10,
            min_skew_degrees: 0.5,
            deskew: true,
        }
    }
}

/// List the image files directly inside `dir`, sorted by path.
///
/// A missing or unreadable directory is logged and yields nothing.
pub fn discover_images(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            error!(dir = %dir.display(), "Cannot read image folder: {e}");
            return Vec::new();
        }
    };

    let mut images: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_supported_extension(path))
        .collect();
    images.sort();

    info!(dir = %dir.display(), count = images.len(), "Found image files");
    images
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Turns image files into [`CanonicalImage`]s.
#[derive(Debug, Clone, Default)]
pub struct ImagePreprocessor {
    options: PreprocessOptions,
}

impl ImagePreprocessor {
    pub fn new(options: PreprocessOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PreprocessOptions {
        &self.options
    }

    pub fn load(&self, path: &Path) -> Result<RawImage, PreprocessError> {
        let pixels = image::open(path)?;
        check_not_empty(&pixels)?;
        Ok(RawImage::new(path, pixels))
    }

    /// Decode `path` and run the full normalization chain.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn preprocess(&self, path: &Path) -> Result<CanonicalImage, PreprocessError> {
        let raw = self.load(path)?;
        Ok(self.normalize(&raw))
    }

    /// Same as [`preprocess`](Self::preprocess) for an encoded in-memory image.
    pub fn preprocess_bytes(&self, data: &[u8]) -> Result<CanonicalImage, PreprocessError> {
        let pixels = image::load_from_memory(data)?;
        check_not_empty(&pixels)?;
        Ok(self.normalize(&RawImage::new(PathBuf::new(), pixels)))
    }

    /// Resize → grayscale → blur → binarize → deskew. The raw image is left untouched.
    pub fn normalize(&self, raw: &RawImage) -> CanonicalImage {
        let opts = &self.options;

        let gray = match downscale(&raw.pixels, opts.max_side) {
            Some(resized) => {
                debug!(
                    from_width = raw.width(),
                    from_height = raw.height(),
                    to_width = resized.width(),
                    to_height = resized.height(),
                    "Downscaled oversized image"
                );
                resized.to_luma8()
            }
            None => raw.pixels.to_luma8(),
        };

        let blurred = gaussian_blur_f32(&gray, opts.blur_sigma);
        let binary = adaptive_mean_threshold(&blurred, opts.block_radius, opts.threshold_offset);

        if !opts.deskew {
            return CanonicalImage::new(binary);
        }

        match self.deskew(&binary) {
            Ok(Some(rotated)) => CanonicalImage::new(rotated),
            Ok(None) => CanonicalImage::new(binary),
            Err(e) => {
                warn!("Could not deskew image, keeping it unrotated: {e}");
                CanonicalImage::new(binary)
            }
        }
    }

    /// Rotate `image` level if its dominant line angle exceeds the skew
    /// threshold. `Ok(None)` means no rotation was needed.
    pub fn deskew(&self, image: &GrayImage) -> Result<Option<GrayImage>, PreprocessError> {
        let (width, height) = image.dimensions();
        if width < 3 || height < 3 {
            return Err(PreprocessError::Deskew(format!("image too small ({width}x{height})")));
        }

        let Some(angle) = estimate_skew(image, &self.options) else {
            return Ok(None);
        };
        if !angle.is_finite() {
            return Err(PreprocessError::Deskew(format!("non-finite skew angle {angle}")));
        }
        if angle.abs() <= self.options.min_skew_degrees {
            return Ok(None);
        }

        debug!(angle, "Correcting skew");
        Ok(Some(rotate_about_center(image, angle)))
    }
}

fn check_not_empty(img: &DynamicImage) -> Result<(), PreprocessError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(PreprocessError::Empty { width: img.width(), height: img.height() });
    }
    Ok(())
}

// ── Resize ────────────────────────────────────────────────────────────────────

/// Dimensions after fitting the longer side to `max_side`, or `None` when the
/// image already fits.
pub fn target_dimensions(width: u32, height: u32, max_side: u32) -> Option<(u32, u32)> {
    if width.max(height) <= max_side {
        return None;
    }
    let scale = f64::from(max_side) / f64::from(width.max(height));
    let w = ((f64::from(width) * scale) as u32).clamp(1, max_side);
    let h = ((f64::from(height) * scale) as u32).clamp(1, max_side);
    Some((w, h))
}

/// Shrink with a triangle filter; when downsampling `image` widens the filter
/// support by the scale ratio, which averages over the covered source area.
fn downscale(img: &DynamicImage, max_side: u32) -> Option<DynamicImage> {
    let (w, h) = target_dimensions(img.width(), img.height(), max_side)?;
    Some(img.resize_exact(w, h, FilterType::Triangle))
}

// ── Binarization ──────────────────────────────────────────────────────────────

/// Local-mean threshold: a pixel turns white when it is brighter than the mean
/// of its `(2r+1)²` neighbourhood minus `offset`, black otherwise. Borders are
/// padded by repeating edge pixels.
pub fn adaptive_mean_threshold(gray: &GrayImage, block_radius: u32, offset: i32) -> GrayImage {
    let means = box_filter(gray, block_radius, block_radius);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = i32::from(gray.get_pixel(x, y)[0]);
        let mean = i32::from(means.get_pixel(x, y)[0]);
        if value > mean - offset {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

// ── Skew estimation ───────────────────────────────────────────────────────────

/// A run of edge pixels along a detected line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: (i64, i64),
    pub end: (i64, i64),
}

impl Segment {
    pub fn length(&self) -> f32 {
        let dx = (self.end.0 - self.start.0) as f32;
        let dy = (self.end.1 - self.start.1) as f32;
        dx.hypot(dy)
    }

    /// Angle in degrees, `atan2(dy, dx)` in image coordinates (y grows downwards).
    pub fn angle_degrees(&self) -> f32 {
        let dx = (self.end.0 - self.start.0) as f32;
        let dy = (self.end.1 - self.start.1) as f32;
        dy.atan2(dx).to_degrees()
    }
}

/// Median angle of the line segments found in `image`, or `None` when no
/// segment is long enough.
pub fn estimate_skew(image: &GrayImage, opts: &PreprocessOptions) -> Option<f32> {
    let edges = canny(image, opts.canny_low, opts.canny_high);
    let lines = detect_lines(
        &edges,
        LineDetectionOptions {
            vote_threshold: opts.hough_votes,
            suppression_radius: opts.hough_suppression,
        },
    );

    let mut angles: Vec<f32> = lines
        .iter()
        .flat_map(|line| line_segments(&edges, line, opts.min_segment_len, opts.max_segment_gap))
        .map(|segment| segment.angle_degrees())
        .collect();

    debug!(lines = lines.len(), segments = angles.len(), "Skew candidates");
    median(&mut angles)
}

/// Walk along `line` and split the edge pixels lying on it into segments at
/// gaps wider than `max_gap`, keeping those at least `min_len` long.
///
/// Segment direction is normalized to point rightwards (or downwards for
/// vertical lines) so angles fall in `(-90, 90]`.
pub fn line_segments(edges: &GrayImage, line: &PolarLine, min_len: u32, max_gap: u32) -> Vec<Segment> {
    let (width, height) = edges.dimensions();
    let theta = (line.angle_in_degrees as f32).to_radians();
    let normal = (theta.cos(), theta.sin());
    let mut dir = (-normal.1, normal.0);
    if dir.0 < 0.0 || (dir.0 == 0.0 && dir.1 < 0.0) {
        dir = (-dir.0, -dir.1);
    }
    let origin = (line.r * normal.0, line.r * normal.1);
    let reach = (width + height) as i64;

    let is_edge = |x: f32, y: f32| -> Option<(i64, i64)> {
        // Tolerate one pixel of rasterization error across the line.
        for k in [0.0f32, 1.0, -1.0] {
            let px = (x + k * normal.0).round();
            let py = (y + k * normal.1).round();
            if px < 0.0 || py < 0.0 || px >= width as f32 || py >= height as f32 {
                continue;
            }
            if edges.get_pixel(px as u32, py as u32)[0] > 0 {
                return Some((px as i64, py as i64));
            }
        }
        None
    };

    let mut segments = Vec::new();
    let mut current: Option<(Segment, i64)> = None;

    for t in -reach..=reach {
        let x = origin.0 + t as f32 * dir.0;
        let y = origin.1 + t as f32 * dir.1;
        let Some(hit) = is_edge(x, y) else {
            continue;
        };

        current = match current {
            Some((mut seg, last_t)) if t - last_t <= i64::from(max_gap) + 1 => {
                seg.end = hit;
                Some((seg, t))
            }
            Some((seg, _)) => {
                if seg.length() >= min_len as f32 {
                    segments.push(seg);
                }
                Some((Segment { start: hit, end: hit }, t))
            }
            None => Some((Segment { start: hit, end: hit }, t)),
        };
    }

    if let Some((seg, _)) = current {
        if seg.length() >= min_len as f32 {
            segments.push(seg);
        }
    }
    segments
}

fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f32::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

// ── Rotation ──────────────────────────────────────────────────────────────────

/// Rotate so that a line at `angle_degrees` becomes horizontal, keeping the
/// canvas size. Bicubic sampling; out-of-range source pixels repeat the nearest
/// edge pixel.
pub fn rotate_about_center(image: &GrayImage, angle_degrees: f32) -> GrayImage {
    let (width, height) = image.dimensions();
    let (sin, cos) = angle_degrees.to_radians().sin_cos();
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;

    GrayImage::from_fn(width, height, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        let sx = cx + cos * dx - sin * dy;
        let sy = cy + sin * dx + cos * dy;
        Luma([sample_bicubic(image, sx, sy)])
    })
}

fn cubic_weight(distance: f32) -> f32 {
    const A: f32 = -0.75;
    let d = distance.abs();
    if d <= 1.0 {
        ((A + 2.0) * d - (A + 3.0)) * d * d + 1.0
    } else if d < 2.0 {
        ((A * d - 5.0 * A) * d + 8.0 * A) * d - 4.0 * A
    } else {
        0.0
    }
}

fn sample_bicubic(image: &GrayImage, x: f32, y: f32) -> u8 {
    let (width, height) = image.dimensions();
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let clamp_x = |v: i64| v.clamp(0, width as i64 - 1) as u32;
    let clamp_y = |v: i64| v.clamp(0, height as i64 - 1) as u32;

    let mut acc = 0.0f32;
    for m in -1i64..=2 {
        let wy = cubic_weight(m as f32 - fy);
        let sy = clamp_y(y0 as i64 + m);
        for n in -1i64..=2 {
            let wx = cubic_weight(n as f32 - fx);
            let sx = clamp_x(x0 as i64 + n);
            acc += wx * wy * f32::from(image.get_pixel(sx, sy)[0]);
        }
    }
    acc.round().clamp(0.0, 255.0) as u8
}

// ── Tests ─────────────────────────────────────────────────────────────────────
