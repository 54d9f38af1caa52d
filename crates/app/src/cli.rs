use clap::Parser;
use std::path::PathBuf;

use crate::config::Backend;

/// Read ISBNs from photos of books and look them up in Google Books
#[derive(Parser, Debug)]
#[command(name = "isbnscan", version, about)]
pub struct Cli {
    /// Folder containing the book images
    pub folder: PathBuf,

    /// Output CSV file [default: book_information.csv]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Seconds between catalog requests [default: 1.0]
    #[arg(long, value_name = "SECONDS")]
    pub api_delay: Option<f64>,

    /// Images processed in parallel [default: available cores]
    #[arg(long)]
    pub workers: Option<usize>,

    /// Per-request catalog timeout in seconds [default: 30]
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<f64>,

    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Append the run log here [default: isbnscan.log]
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Text recognition engine
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Tesseract language code
    #[arg(long)]
    pub lang: Option<String>,

    /// Directory holding Tesseract traineddata files
    #[arg(long)]
    pub tessdata: Option<PathBuf>,

    /// Skip skew correction
    #[arg(long, default_value_t = false)]
    pub no_deskew: bool,

    /// Debug-level logging
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}
