use image::{DynamicImage, GrayImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// A decoded image file, before any normalization.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub path: PathBuf,
    pub pixels: DynamicImage,
}

impl RawImage {
    pub fn new(path: impl Into<PathBuf>, pixels: DynamicImage) -> Self {
        Self { path: path.into(), pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// File name component, used as the source label in reports.
    pub fn file_name(&self) -> String {
        file_label(&self.path)
    }
}

/// Single-channel, resized, binarized and deskewed buffer handed to text
/// recognition.
#[derive(Debug, Clone)]
pub struct CanonicalImage {
    pixels: GrayImage,
}

impl CanonicalImage {
    pub fn new(pixels: GrayImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.pixels
    }

    pub fn into_gray(self) -> GrayImage {
        self.pixels
    }

    /// Encode as PNG for engines that only accept encoded images.
    pub fn to_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(self.pixels.clone())
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
        Ok(buf)
    }
}

pub(crate) fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
