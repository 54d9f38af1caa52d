use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
pub enum LogInitError {
    #[error("Cannot open log file: {0}")]
    File(#[from] std::io::Error),
    #[error("Logging already initialized: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "isbnscan=debug,isbnscan_ocr=debug,isbnscan_catalog=debug"
    } else {
        "isbnscan=info,isbnscan_ocr=info,isbnscan_catalog=info"
    }
}

/// Console on stderr plus an append-only plain-text file. `RUST_LOG`
/// overrides the default filter.
pub fn init(log_file: &Path, verbose: bool) -> Result<(), LogInitError> {
    if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(log_file)?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose).into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_level() {
        assert!(default_filter(false).contains("isbnscan=info"));
        assert!(default_filter(true).contains("isbnscan_catalog=debug"));
    }

    #[test]
    fn unopenable_log_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = init(dir.path(), false).unwrap_err();
        assert!(matches!(err, LogInitError::File(_)));
    }
}
