//! Run configuration: built-in defaults, optionally overlaid by a TOML file,
//! then by command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use isbnscan_catalog::{GoogleBooksConfig, GOOGLE_BOOKS_ENDPOINT};
use isbnscan_ocr::recognizer::ISBN_WHITELIST;
use isbnscan_ocr::{PreprocessOptions, RecognitionConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::Cli;
use crate::orchestrator::RunSettings;

pub const DEFAULT_OUTPUT: &str = "book_information.csv";
pub const DEFAULT_LOG_FILE: &str = "isbnscan.log";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Text recognition engine used for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// The `tesseract` executable on PATH.
    #[default]
    TesseractCli,
    /// libtesseract linked in-process (needs the `tesseract` feature).
    Leptess,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineSection,
    pub recognition: RecognitionSection,
    pub metadata: MetadataSection,
    pub output: OutputSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub workers: usize,
    pub deskew: bool,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self { workers: default_workers(), deskew: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionSection {
    pub backend: Backend,
    pub language: String,
    pub tessdata: Option<PathBuf>,
    pub whitelist: String,
}

impl Default for RecognitionSection {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            language: "eng".to_string(),
            tessdata: None,
            whitelist: ISBN_WHITELIST.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataSection {
    pub endpoint: String,
    pub user_agent: String,
    pub api_delay_secs: f64,
    pub timeout_secs: f64,
}

impl Default for MetadataSection {
    fn default() -> Self {
        Self {
            endpoint: GOOGLE_BOOKS_ENDPOINT.to_string(),
            user_agent: concat!("isbnscan/", env!("CARGO_PKG_VERSION")).to_string(),
            api_delay_secs: 1.0,
            timeout_secs: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub path: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self { path: PathBuf::from(DEFAULT_OUTPUT) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub file: PathBuf,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self { file: PathBuf::from(DEFAULT_LOG_FILE) }
    }
}

/// Available parallelism, at least one.
pub fn default_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Defaults, or the contents of `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            None => Ok(Self::default()),
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
                Self::from_toml_str(&text)
            }
        }
    }

    /// Overlay the flags the user actually passed.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(output) = &cli.output {
            self.output.path = output.clone();
        }
        if let Some(delay) = cli.api_delay {
            self.metadata.api_delay_secs = delay;
        }
        if let Some(timeout) = cli.timeout {
            self.metadata.timeout_secs = timeout;
        }
        if let Some(workers) = cli.workers {
            self.pipeline.workers = workers;
        }
        if let Some(file) = &cli.log_file {
            self.logging.file = file.clone();
        }
        if let Some(backend) = cli.backend {
            self.recognition.backend = backend;
        }
        if let Some(lang) = &cli.lang {
            self.recognition.language = lang.clone();
        }
        if let Some(dir) = &cli.tessdata {
            self.recognition.tessdata = Some(dir.clone());
        }
        if cli.no_deskew {
            self.pipeline.deskew = false;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let delay = self.metadata.api_delay_secs;
        if Duration::try_from_secs_f64(delay).is_err() {
            return Err(ConfigError::Invalid {
                key: "metadata.api_delay_secs",
                reason: format!("must be a representable non-negative number of seconds, got {delay}"),
            });
        }
        let timeout = self.metadata.timeout_secs;
        if timeout <= 0.0 || Duration::try_from_secs_f64(timeout).is_err() {
            return Err(ConfigError::Invalid {
                key: "metadata.timeout_secs",
                reason: format!("must be a representable positive number of seconds, got {timeout}"),
            });
        }
        if self.pipeline.workers == 0 {
            return Err(ConfigError::Invalid {
                key: "pipeline.workers",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.recognition.language.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "recognition.language",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn preprocess_options(&self) -> PreprocessOptions {
        PreprocessOptions { deskew: self.pipeline.deskew, ..PreprocessOptions::default() }
    }

    pub fn recognition_config(&self) -> RecognitionConfig {
        RecognitionConfig {
            whitelist: self.recognition.whitelist.clone(),
            language: self.recognition.language.clone(),
            data_path: self.recognition.tessdata.clone(),
            ..RecognitionConfig::default()
        }
    }

    pub fn google_books_config(&self) -> GoogleBooksConfig {
        GoogleBooksConfig {
            endpoint: self.metadata.endpoint.clone(),
            user_agent: self.metadata.user_agent.clone(),
            timeout: Duration::from_secs_f64(self.metadata.timeout_secs),
        }
    }

    /// Call after [`validate`](Self::validate); `from_secs_f64` panics on the values it rejects.
    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            workers: self.pipeline.workers,
            api_delay: Duration::from_secs_f64(self.metadata.api_delay_secs),
            output: self.output.path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("isbnscan").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let c = Config::default();
        assert_eq!(c.output.path, PathBuf::from("book_information.csv"));
        assert_eq!(c.logging.file, PathBuf::from("isbnscan.log"));
        assert_eq!(c.metadata.api_delay_secs, 1.0);
        assert_eq!(c.metadata.timeout_secs, 30.0);
        assert_eq!(c.recognition.backend, Backend::TesseractCli);
        assert!(c.pipeline.workers >= 1);
        assert!(c.pipeline.deskew);
        c.validate().unwrap();
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let c = Config::from_toml_str(
            r#"
            [metadata]
            api_delay_secs = 2.5

            [recognition]
            backend = "leptess"
            tessdata = "/usr/share/tessdata"
            "#,
        )
        .unwrap();
        assert_eq!(c.metadata.api_delay_secs, 2.5);
        assert_eq!(c.metadata.timeout_secs, 30.0);
        assert_eq!(c.recognition.backend, Backend::Leptess);
        assert_eq!(c.recognition.tessdata, Some(PathBuf::from("/usr/share/tessdata")));
        assert_eq!(c.recognition.language, "eng");
        assert_eq!(c.output, OutputSection::default());
    }

    #[test]
    fn malformed_toml_is_rejected() {
        let err = Config::from_toml_str("[metadata\napi_delay_secs = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        let err = Config::from_toml_str("[pipeline]\nworkers = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Config::load(Some(Path::new("/nonexistent/isbnscan.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("isbnscan.toml");
        std::fs::write(&path, "[output]\npath = \"out/books.csv\"\n").unwrap();
        let c = Config::load(Some(&path)).unwrap();
        assert_eq!(c.output.path, PathBuf::from("out/books.csv"));
    }

    #[test]
    fn cli_flags_override_file() {
        let mut c = Config::from_toml_str("[metadata]\napi_delay_secs = 3.0\n[pipeline]\nworkers = 2").unwrap();
        c.apply_cli(&cli(&["scans", "--api-delay", "0.25", "-o", "x.csv", "--no-deskew", "--lang", "deu"]));
        assert_eq!(c.metadata.api_delay_secs, 0.25);
        assert_eq!(c.output.path, PathBuf::from("x.csv"));
        assert_eq!(c.pipeline.workers, 2);
        assert!(!c.pipeline.deskew);
        assert_eq!(c.recognition.language, "deu");
        assert!(!c.preprocess_options().deskew);
        assert_eq!(c.recognition_config().language, "deu");
    }

    #[test]
    fn validation_rejects_bad_numbers() {
        let mut c = Config::default();
        c.metadata.api_delay_secs = -1.0;
        assert!(matches!(c.validate(), Err(ConfigError::Invalid { key: "metadata.api_delay_secs", .. })));

        let mut c = Config::default();
        c.metadata.api_delay_secs = f64::NAN;
        assert!(c.validate().is_err());

        let mut c = Config::default();
        c.metadata.timeout_secs = 0.0;
        assert!(matches!(c.validate(), Err(ConfigError::Invalid { key: "metadata.timeout_secs", .. })));

        let mut c = Config::default();
        c.pipeline.workers = 0;
        assert!(matches!(c.validate(), Err(ConfigError::Invalid { key: "pipeline.workers", .. })));
    }

    #[test]
    fn durations_too_large_for_duration_are_rejected() {
        let mut c = Config::default();
        c.metadata.api_delay_secs = 1e30;
        assert!(matches!(c.validate(), Err(ConfigError::Invalid { key: "metadata.api_delay_secs", .. })));

        let mut c = Config::default();
        c.metadata.timeout_secs = 1e30;
        assert!(matches!(c.validate(), Err(ConfigError::Invalid { key: "metadata.timeout_secs", .. })));

        let mut c = Config::default();
        c.apply_cli(&cli(&["scans", "--api-delay", "1e20"]));
        assert!(c.validate().is_err());
    }

    #[test]
    fn large_valid_delay_converts_without_panic() {
        let mut c = Config::default();
        c.metadata.api_delay_secs = 1e12;
        c.validate().unwrap();
        assert_eq!(c.run_settings().api_delay, Duration::from_secs(1_000_000_000_000));
    }

    #[test]
    fn zero_delay_is_allowed() {
        let mut c = Config::default();
        c.metadata.api_delay_secs = 0.0;
        c.validate().unwrap();
        assert_eq!(c.run_settings().api_delay, Duration::ZERO);
    }
}
