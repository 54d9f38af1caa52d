use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

use crate::types::CanonicalImage;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image encode error: {0}")]
    ImageEncode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("OCR engine not available: {0}")]
    NotAvailable(String),
}

/// Tesseract `--oem` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    LegacyOnly,
    LstmOnly,
    LegacyAndLstm,
    /// Whatever the installed engine supports, legacy and LSTM combined.
    #[default]
    Default,
}

impl EngineMode {
    pub fn code(self) -> u8 {
        match self {
            EngineMode::LegacyOnly => 0,
            EngineMode::LstmOnly => 1,
            EngineMode::LegacyAndLstm => 2,
            EngineMode::Default => 3,
        }
    }
}

/// Tesseract `--psm` values used for cover scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSegmentation {
    Auto,
    SingleColumn,
    #[default]
    SingleBlock,
    SingleLine,
    SparseText,
}

impl PageSegmentation {
    pub fn code(self) -> u8 {
        match self {
            PageSegmentation::Auto => 3,
            PageSegmentation::SingleColumn => 4,
            PageSegmentation::SingleBlock => 6,
            PageSegmentation::SingleLine => 7,
            PageSegmentation::SparseText => 11,
        }
    }
}

/// Characters that can appear in a printed ISBN.
pub const ISBN_WHITELIST: &str = "0123456789X-";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub whitelist: String,
    pub engine_mode: EngineMode,
    pub page_segmentation: PageSegmentation,
    pub language: String,
    /// Directory holding `*.traineddata`; the engine default when unset.
    pub data_path: Option<PathBuf>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            whitelist: ISBN_WHITELIST.to_string(),
            engine_mode: EngineMode::Default,
            page_segmentation: PageSegmentation::SingleBlock,
            language: "eng".to_string(),
            data_path: None,
        }
    }
}

/// Abstraction over a text recognition engine.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image: &CanonicalImage, config: &RecognitionConfig) -> Result<String, OcrError>;
}

impl<T: OcrBackend + ?Sized> OcrBackend for Box<T> {
    fn recognize(&self, image: &CanonicalImage, config: &RecognitionConfig) -> Result<String, OcrError> {
        (**self).recognize(image, config)
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set string, for exercising the pipeline without an engine.
pub struct MockRecognizer {
    pub text: String,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image: &CanonicalImage, _config: &RecognitionConfig) -> Result<String, OcrError> {
        Ok(self.text.clone())
    }
}

// ── Tesseract command-line backend ────────────────────────────────────────────

/// Runs the `tesseract` executable, feeding the image on stdin and reading
/// text from stdout.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: PathBuf,
}

impl TesseractCli {
    pub fn new() -> Self {
        Self { binary: PathBuf::from("tesseract") }
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }

    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new()
    }
}

/// Command-line options after the `stdin stdout` positional arguments.
pub fn tesseract_args(config: &RecognitionConfig) -> Vec<String> {
    let mut args = vec![
        "-l".to_string(),
        config.language.clone(),
        "--oem".to_string(),
        config.engine_mode.code().to_string(),
        "--psm".to_string(),
        config.page_segmentation.code().to_string(),
    ];
    if let Some(dir) = &config.data_path {
        args.push("--tessdata-dir".to_string());
        args.push(dir.display().to_string());
    }
    if !config.whitelist.is_empty() {
        args.push("-c".to_string());
        args.push(format!("tessedit_char_whitelist={}", config.whitelist));
    }
    args
}

impl OcrBackend for TesseractCli {
    fn recognize(&self, image: &CanonicalImage, config: &RecognitionConfig) -> Result<String, OcrError> {
        let png = image.to_png().map_err(|e| OcrError::ImageEncode(e.to_string()))?;

        let mut child = Command::new(&self.binary)
            .arg("stdin")
            .arg("stdout")
            .args(tesseract_args(config))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => OcrError::NotAvailable(format!(
                    "{} not found (install tesseract-ocr)",
                    self.binary.display()
                )),
                _ => OcrError::Engine(e.to_string()),
            })?;

        // Tesseract reads the whole image before writing anything, so writing
        // stdin to completion first cannot block on a full stdout pipe.
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(&png) {
                drop(stdin);
                let _ = child.kill();
                let _ = child.wait();
                return Err(OcrError::Engine(format!("cannot send image to tesseract: {e}")));
            }
        }

        let output = child.wait_with_output().map_err(|e| OcrError::Engine(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(format!("tesseract failed: {}", stderr.trim())));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(chars = text.len(), "tesseract finished");
        Ok(text)
    }
}

// ── Tesseract library backend (optional, gated behind `tesseract` feature) ────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{CanonicalImage, EngineMode, OcrBackend, OcrError, RecognitionConfig};
    use leptess::{LepTess, Variable};
    use tracing::warn;

    /// In-process Tesseract through libtesseract.
    ///
    /// leptess initializes the engine without an `--oem` choice, so
    /// `RecognitionConfig::engine_mode` is not applied; a non-default mode is
    /// reported once per image with a warning.
    #[derive(Debug, Default)]
    pub struct TesseractRecognizer;

    impl TesseractRecognizer {
        pub fn new() -> Self {
            Self
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&self, image: &CanonicalImage, config: &RecognitionConfig) -> Result<String, OcrError> {
            if let Some(mode) = ignored_engine_mode(config) {
                warn!(?mode, "leptess backend cannot select an engine mode; using the engine default");
            }
            let data_path = config.data_path.as_ref().map(|p| p.display().to_string());
            let mut lt = LepTess::new(data_path.as_deref(), &config.language)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_variable(Variable::TesseditPagesegMode, &config.page_segmentation.code().to_string())
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            if !config.whitelist.is_empty() {
                lt.set_variable(Variable::TesseditCharWhitelist, &config.whitelist)
                    .map_err(|e| OcrError::Engine(e.to_string()))?;
            }

            let png = image.to_png().map_err(|e| OcrError::ImageEncode(e.to_string()))?;
            lt.set_image_from_mem(&png)
                .map_err(|e| OcrError::ImageEncode(e.to_string()))?;
            lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }
    }

    /// The requested engine mode when it differs from what leptess will use.
    pub fn ignored_engine_mode(config: &RecognitionConfig) -> Option<EngineMode> {
        (config.engine_mode != EngineMode::Default).then_some(config.engine_mode)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn only_non_default_engine_mode_is_flagged() {
            assert_eq!(ignored_engine_mode(&RecognitionConfig::default()), None);
            let lstm = RecognitionConfig { engine_mode: EngineMode::LstmOnly, ..RecognitionConfig::default() };
            assert_eq!(ignored_engine_mode(&lstm), Some(EngineMode::LstmOnly));
        }
    }
}
