use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

use isbnscan_core::Identifier;

use crate::extract::IsbnExtractor;
use crate::preprocess::{ImagePreprocessor, PreprocessError};
use crate::recognizer::{OcrBackend, OcrError, RecognitionConfig};
use crate::types::file_label;

/// Why a single file contributed nothing. Never fatal for a run.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("Unreadable image: {0}")]
    UnreadableImage(#[from] PreprocessError),
    #[error("Text recognition failed: {0}")]
    Recognition(#[from] OcrError),
    #[error("No text recognized")]
    EmptyText,
}

/// The result of scanning one image.
#[derive(Debug, Clone)]
pub struct FileScan {
    /// File name used as the source label.
    pub file_name: String,
    /// Raw recognized text.
    pub text: String,
    /// Valid identifiers found in the text; may be empty.
    pub identifiers: BTreeSet<Identifier>,
}

/// Per-file work: preprocess → recognize → extract.
pub struct IsbnPipeline<R: OcrBackend> {
    preprocessor: ImagePreprocessor,
    recognizer: R,
    config: RecognitionConfig,
}

impl<R: OcrBackend> IsbnPipeline<R> {
    pub fn new(preprocessor: ImagePreprocessor, recognizer: R, config: RecognitionConfig) -> Self {
        Self { preprocessor, recognizer, config }
    }

    pub fn recognition_config(&self) -> &RecognitionConfig {
        &self.config
    }

    /// Process a file on disk. Blocking and CPU-heavy.
    #[instrument(skip_all, fields(file = %file_label(path)))]
    pub fn process_file(&self, path: &Path) -> Result<FileScan, FileError> {
        let canonical = self.preprocessor.preprocess(path)?;
        let text = self.recognizer.recognize(&canonical, &self.config)?;
        drop(canonical);
        self.finish(file_label(path), text)
    }

    /// Process an encoded image held in memory.
    pub fn process_bytes(&self, file_name: &str, data: &[u8]) -> Result<FileScan, FileError> {
        let canonical = self.preprocessor.preprocess_bytes(data)?;
        let text = self.recognizer.recognize(&canonical, &self.config)?;
        self.finish(file_name.to_string(), text)
    }

    fn finish(&self, file_name: String, text: String) -> Result<FileScan, FileError> {
        if text.trim().is_empty() {
            return Err(FileError::EmptyText);
        }
        let identifiers = IsbnExtractor::extract(&text);
        debug!(file = %file_name, found = identifiers.len(), "Extracted identifiers");
        Ok(FileScan { file_name, text, identifiers })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
