pub mod aggregate;
pub mod book;
pub mod isbn;

pub use aggregate::ExtractionResult;
pub use book::{
    truncate_description, BookDetails, BookMetadata, BookRecord, NOT_FOUND_TITLE, UNKNOWN,
};
pub use isbn::{normalize, validate, Identifier, IdentifierKind, IsbnError};
