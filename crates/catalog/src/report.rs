use std::fs;
use std::io::Write;
use std::path::Path;

use isbnscan_core::BookRecord;
use thiserror::Error;
use tracing::info;

/// Column order of the report.
pub const REPORT_HEADER: [&str; 9] = [
    "isbn",
    "title",
    "authors",
    "publisher",
    "published_date",
    "description",
    "page_count",
    "language",
    "source_files",
];

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Writes book records as a UTF-8 CSV table, one row per record.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvReportWriter;

impl CsvReportWriter {
    pub fn new() -> Self {
        Self
    }

    /// Write `records` to `path`, creating parent directories. Returns the
    /// number of data rows written.
    pub fn write(&self, records: &[BookRecord], path: &Path) -> Result<usize, ReportError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(path)?;
        let rows = self.write_to(records, file)?;
        info!(path = %path.display(), rows, "Report written");
        Ok(rows)
    }

    pub fn write_to<W: Write>(&self, records: &[BookRecord], sink: W) -> Result<usize, ReportError> {
        let mut writer = csv::Writer::from_writer(sink);
        writer.write_record(REPORT_HEADER)?;
        for record in records {
            writer.write_record([
                record.identifier.as_str(),
                record.title(),
                record.authors().as_str(),
                record.publisher(),
                record.published_date(),
                record.description(),
                record.page_count().as_str(),
                record.language(),
                record.joined_sources().as_str(),
            ])?;
        }
        writer.flush()?;
        Ok(records.len())
    }
}
