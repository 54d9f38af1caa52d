pub mod google;
pub mod pacer;
pub mod report;

pub use google::{
    parse_volumes, FetchError, GoogleBooksClient, GoogleBooksConfig, Lookup, MetadataSource,
    GOOGLE_BOOKS_ENDPOINT,
};
pub use pacer::FetchPacer;
pub use report::{CsvReportWriter, ReportError, REPORT_HEADER};
