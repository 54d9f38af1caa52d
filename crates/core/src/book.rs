use serde::{Deserialize, Serialize};

use crate::isbn::Identifier;

/// Placeholder for any descriptive field the catalog did not supply.
pub const UNKNOWN: &str = "Unknown";
/// Title used for identifiers the catalog could not resolve.
pub const NOT_FOUND_TITLE: &str = "Information not found";
/// Descriptions longer than this many characters are cut and marked.
pub const DESCRIPTION_LIMIT: usize = 500;
pub const CONTINUATION_MARKER: &str = "...";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub title: String,
    pub authors: Vec<String>,
    pub publisher: String,
    pub published_date: String,
    /// At most [`DESCRIPTION_LIMIT`] characters plus the continuation marker.
    pub description: String,
    pub page_count: Option<u32>,
    pub language: String,
}

impl Default for BookMetadata {
    fn default() -> Self {
        Self {
            title: UNKNOWN.to_string(),
            authors: vec![UNKNOWN.to_string()],
            publisher: UNKNOWN.to_string(),
            published_date: UNKNOWN.to_string(),
            description: String::new(),
            page_count: None,
            language: UNKNOWN.to_string(),
        }
    }
}

/// Cut a description to [`DESCRIPTION_LIMIT`] characters, appending
/// [`CONTINUATION_MARKER`] only when something was removed.
pub fn truncate_description(text: &str) -> String {
    match text.char_indices().nth(DESCRIPTION_LIMIT) {
        Some((byte_idx, _)) => format!("{}{CONTINUATION_MARKER}", &text[..byte_idx]),
        None => text.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BookDetails {
    Found(BookMetadata),
    /// Sentinel for a failed or empty lookup.
    NotFound,
}

/// One report row: an identifier, what the catalog said about it, and every
/// file it was read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub identifier: Identifier,
    pub details: BookDetails,
    pub source_files: Vec<String>,
}

impl BookRecord {
    pub fn found(identifier: Identifier, metadata: BookMetadata, source_files: Vec<String>) -> Self {
        Self { identifier, details: BookDetails::Found(metadata), source_files }
    }

    pub fn not_found(identifier: Identifier, source_files: Vec<String>) -> Self {
        Self { identifier, details: BookDetails::NotFound, source_files }
    }

    pub fn is_found(&self) -> bool {
        matches!(self.details, BookDetails::Found(_))
    }

    pub fn title(&self) -> &str {
        match &self.details {
            BookDetails::Found(m) => &m.title,
            BookDetails::NotFound => NOT_FOUND_TITLE,
        }
    }

    pub fn authors(&self) -> String {
        match &self.details {
            BookDetails::Found(m) => m.authors.join(", "),
            BookDetails::NotFound => UNKNOWN.to_string(),
        }
    }

    pub fn publisher(&self) -> &str {
        match &self.details {
            BookDetails::Found(m) => &m.publisher,
            BookDetails::NotFound => UNKNOWN,
        }
    }

    pub fn published_date(&self) -> &str {
        match &self.details {
            BookDetails::Found(m) => &m.published_date,
            BookDetails::NotFound => UNKNOWN,
        }
    }

    pub fn description(&self) -> &str {
        match &self.details {
            BookDetails::Found(m) => &m.description,
            BookDetails::NotFound => "",
        }
    }

    pub fn page_count(&self) -> String {
        match &self.details {
            BookDetails::Found(BookMetadata { page_count: Some(n), .. }) => n.to_string(),
            _ => UNKNOWN.to_string(),
        }
    }

    pub fn language(&self) -> &str {
        match &self.details {
            BookDetails::Found(m) => &m.language,
            BookDetails::NotFound => UNKNOWN,
        }
    }

    pub fn joined_sources(&self) -> String {
        self.source_files.join(", ")
    }
}
