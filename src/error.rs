use std::num::ParseIntError;

use thiserror::Error;

/// A raw dump whose filename does not follow `<prefix>-<date>-<hour>.<ext>`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagError {
    #[error("filename '{name}' has {found} hyphen-separated tokens, expected at least 3")]
    MissingTokens { name: String, found: usize },
    /// Raised rather than tagging lines with an empty hour.
    #[error("hour token '{token}' in '{name}' is shorter than its 3 character suffix")]
    ShortHour { name: String, token: String },
}

/// A tagged line that cannot be turned into a record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("line has {found} fields, expected at least 6: '{line}'")]
    TooFewFields { line: String, found: usize },
    #[error("field '{field}' is not an integer ('{value}'): {source}")]
    BadNumber {
        field: &'static str,
        value: String,
        source: ParseIntError,
    },
    #[error("{field} '{value}' contains the key delimiter '-'")]
    KeyDelimiter { field: &'static str, value: String },
}
