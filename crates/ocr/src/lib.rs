pub mod extract;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod types;

pub use extract::{Candidate, IsbnExtractor};
pub use pipeline::{FileError, FileScan, IsbnPipeline};
pub use preprocess::{discover_images, ImagePreprocessor, PreprocessError, PreprocessOptions};
pub use recognizer::{
    EngineMode, MockRecognizer, OcrBackend, OcrError, PageSegmentation, RecognitionConfig,
    TesseractCli,
};
pub use types::{CanonicalImage, RawImage};
