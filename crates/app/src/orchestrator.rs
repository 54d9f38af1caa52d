//! Drives one extraction run over a folder of images.
//!
//! A run moves forward through [`RunStage`]s exactly once each:
//! scan the folder, process files on a bounded blocking pool, merge their
//! identifiers in discovery order, enrich each identifier from the catalog
//! with paced sequential fetches, and write the report.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use isbnscan_catalog::{CsvReportWriter, FetchPacer, Lookup, MetadataSource, ReportError};
use isbnscan_core::{BookRecord, ExtractionResult};
use isbnscan_ocr::{discover_images, FileError, FileScan, IsbnPipeline, OcrBackend};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use crate::config::{default_workers, DEFAULT_OUTPUT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunStage {
    Scanning,
    PerFileProcessing,
    IdentifierAggregation,
    MetadataEnrichment,
    ReportEmission,
    Done,
}

/// Failures that abort a run. Everything else is logged and absorbed.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Input folder not found: {0}")]
    DirectoryNotFound(PathBuf),
    #[error("Failed to write report {path}: {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: ReportError,
    },
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub workers: usize,
    pub api_delay: Duration,
    pub output: PathBuf,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            api_delay: Duration::from_secs(1),
            output: PathBuf::from(DEFAULT_OUTPUT),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub images_found: usize,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub unique_identifiers: usize,
    pub records_written: usize,
    pub records_enriched: usize,
    /// Set only when a report was written.
    pub output_path: Option<PathBuf>,
    pub stages: Vec<RunStage>,
    pub records: Vec<BookRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    fn start(run_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            images_found: 0,
            files_processed: 0,
            files_skipped: 0,
            unique_identifiers: 0,
            records_written: 0,
            records_enriched: 0,
            output_path: None,
            stages: Vec::new(),
            records: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    fn enter(&mut self, stage: RunStage) {
        let from = self.stages.last().copied();
        debug_assert!(from.map_or(true, |f| f < stage), "run stages only move forward");
        info!(from = ?from, to = ?stage, "Run stage");
        self.stages.push(stage);
    }

    fn finish(mut self) -> Self {
        self.enter(RunStage::Done);
        self.finished_at = Utc::now();
        info!(
            images = self.images_found,
            processed = self.files_processed,
            skipped = self.files_skipped,
            identifiers = self.unique_identifiers,
            enriched = self.records_enriched,
            written = self.records_written,
            elapsed_ms = (self.finished_at - self.started_at).num_milliseconds(),
            "Run finished"
        );
        self
    }

    pub fn current_stage(&self) -> Option<RunStage> {
        self.stages.last().copied()
    }
}

pub struct Orchestrator<R: OcrBackend, M: MetadataSource> {
    pipeline: Arc<IsbnPipeline<R>>,
    source: M,
    writer: CsvReportWriter,
    settings: RunSettings,
}

impl<R, M> Orchestrator<R, M>
where
    R: OcrBackend + 'static,
    M: MetadataSource,
{
    pub fn new(pipeline: IsbnPipeline<R>, source: M, settings: RunSettings) -> Self {
        Self { pipeline: Arc::new(pipeline), source, writer: CsvReportWriter::new(), settings }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Process every image in `dir` and write the report.
    pub async fn run(&self, dir: &Path) -> Result<RunSummary, RunError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id, dir = %dir.display());
        self.run_stages(dir, run_id).instrument(span).await
    }

    async fn run_stages(&self, dir: &Path, run_id: Uuid) -> Result<RunSummary, RunError> {
        let mut summary = RunSummary::start(run_id);

        summary.enter(RunStage::Scanning);
        if !dir.is_dir() {
            error!(dir = %dir.display(), "Input folder does not exist");
            return Err(RunError::DirectoryNotFound(dir.to_path_buf()));
        }
        let files = discover_images(dir);
        summary.images_found = files.len();
        if files.is_empty() {
            warn!(dir = %dir.display(), "No image files found");
            return Ok(summary.finish());
        }

        summary.enter(RunStage::PerFileProcessing);
        let results = self.scan_files(&files).await;

        summary.enter(RunStage::IdentifierAggregation);
        let mut aggregate = ExtractionResult::new();
        for (path, result) in files.iter().zip(results) {
            match result {
                Some(Ok(scan)) => {
                    summary.files_processed += 1;
                    if scan.identifiers.is_empty() {
                        info!(file = %scan.file_name, "No ISBN found");
                    } else {
                        info!(file = %scan.file_name, count = scan.identifiers.len(), "Found ISBNs");
                    }
                    aggregate.record_all(scan.identifiers, &scan.file_name);
                }
                Some(Err(e)) => {
                    summary.files_skipped += 1;
                    warn!(file = %path.display(), "Skipping file: {e}");
                }
                None => summary.files_skipped += 1,
            }
        }
        summary.unique_identifiers = aggregate.len();
        info!(count = aggregate.len(), "Unique ISBNs");
        if aggregate.is_empty() {
            warn!("No valid ISBNs found in any image");
            return Ok(summary.finish());
        }

        summary.enter(RunStage::MetadataEnrichment);
        let records = self.enrich(aggregate).await;
        summary.records_enriched = records.iter().filter(|r| r.is_found()).count();

        summary.enter(RunStage::ReportEmission);
        let output = &self.settings.output;
        summary.records_written = self.writer.write(&records, output).map_err(|source| {
            error!(path = %output.display(), "Cannot write report: {source}");
            RunError::ReportWrite { path: output.clone(), source }
        })?;
        summary.output_path = Some(output.clone());
        summary.records = records;

        Ok(summary.finish())
    }

    /// Run the per-file pipeline on at most `workers` blocking threads.
    /// Results come back in the order of `files`; `None` marks a worker
    /// that panicked.
    pub async fn scan_files(&self, files: &[PathBuf]) -> Vec<Option<Result<FileScan, FileError>>> {
        let semaphore = Arc::new(Semaphore::new(self.settings.workers.max(1)));
        let mut tasks = JoinSet::new();

        for (index, path) in files.iter().cloned().enumerate() {
            let pipeline = Arc::clone(&self.pipeline);
            let semaphore = Arc::clone(&semaphore);
            let span = Span::current();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let joined = tokio::task::spawn_blocking(move || {
                    span.in_scope(|| pipeline.process_file(&path))
                })
                .await;
                (index, joined)
            });
        }

        let mut slots: Vec<Option<Result<FileScan, FileError>>> = files.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(result))) => slots[index] = Some(result),
                Ok((index, Err(e))) => {
                    error!(file = %files[index].display(), "File worker failed: {e}");
                }
                Err(e) => error!("File task failed: {e}"),
            }
        }
        slots
    }

    /// One paced lookup per identifier, in aggregation order.
    pub async fn enrich(&self, aggregate: ExtractionResult) -> Vec<BookRecord> {
        let mut pacer = FetchPacer::new(self.settings.api_delay);
        let mut records = Vec::with_capacity(aggregate.len());
        for (identifier, sources) in aggregate {
            pacer.wait().await;
            let record = match self.source.fetch(&identifier).await {
                Lookup::Found(metadata) => BookRecord::found(identifier, metadata, sources),
                Lookup::NotFound => BookRecord::not_found(identifier, sources),
            };
            records.push(record);
        }
        records
    }
}
