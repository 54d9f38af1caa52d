use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use isbnscan::{logging, Backend, Cli, Config, Orchestrator};
use isbnscan_catalog::GoogleBooksClient;
use isbnscan_ocr::{ImagePreprocessor, IsbnPipeline, OcrBackend, TesseractCli};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if tracing::dispatcher::has_been_set() {
                error!("{e:#}");
            } else {
                eprintln!("error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.apply_cli(&cli);
    config.validate()?;

    logging::init(&config.logging.file, cli.verbose).context("Failed to initialize logging")?;
    info!(folder = %cli.folder.display(), output = %config.output.path.display(), "Starting ISBN extraction");

    let recognizer = recognizer(config.recognition.backend)?;
    let pipeline = IsbnPipeline::new(
        ImagePreprocessor::new(config.preprocess_options()),
        recognizer,
        config.recognition_config(),
    );
    let source = GoogleBooksClient::new(config.google_books_config())
        .context("Failed to create HTTP client")?;

    let summary = Orchestrator::new(pipeline, source, config.run_settings())
        .run(&cli.folder)
        .await?;

    match &summary.output_path {
        Some(path) => info!(
            records = summary.records_written,
            path = %path.display(),
            "Book information saved"
        ),
        None => info!("Nothing to report"),
    }
    Ok(())
}

fn recognizer(backend: Backend) -> anyhow::Result<Box<dyn OcrBackend>> {
    match backend {
        Backend::TesseractCli => {
            let cli = TesseractCli::new();
            if !cli.is_available() {
                warn!("tesseract executable not found on PATH; images will be skipped");
            }
            Ok(Box::new(cli))
        }
        #[cfg(feature = "tesseract")]
        Backend::Leptess => Ok(Box::new(isbnscan_ocr::recognizer::tesseract_backend::TesseractRecognizer::new())),
        #[cfg(not(feature = "tesseract"))]
        Backend::Leptess => anyhow::bail!("the leptess backend needs a build with the `tesseract` feature"),
    }
}
