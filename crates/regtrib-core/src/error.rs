//! Error types for the regtrib-core library.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for the regtrib library.
///
/// Only [`RegtribError::Archive`] terminates a pipeline run. Per-document
/// failures are [`DocumentError`]s and are absorbed by the coordinator.
#[derive(Error, Debug)]
pub enum RegtribError {
    /// The uploaded archive could not be expanded.
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// The spreadsheet report could not be rendered.
    #[error("report error: {0}")]
    Report(#[from] rust_xlsxwriter::XlsxError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while expanding an archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The buffer is not a decodable zip container.
    #[error("not a valid zip archive: {0}")]
    Format(#[from] zip::result::ZipError),

    /// The archive exceeds a configured resource limit.
    #[error("archive exceeds limit: {0}")]
    Limit(String),

    /// Writing the expanded tree failed.
    #[error("failed to expand archive: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to a single candidate document.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The document could not be read from disk.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not well-formed XML.
    #[error("malformed XML: {0}")]
    Parse(String),

    /// A required emitter field is absent.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The document is larger than the configured limit.
    #[error("document is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    /// A field does not fit in a worksheet cell.
    #[error("{field} is {length} characters, a cell holds at most {limit}")]
    FieldTooLong {
        field: &'static str,
        length: usize,
        limit: usize,
    },

    /// Parsing did not finish within the configured time.
    #[error("extraction timed out after {0:?}")]
    Timeout(Duration),

    /// The extraction task panicked or was aborted.
    #[error("extraction worker failed: {0}")]
    Worker(String),
}

impl DocumentError {
    /// Whether this failure should be reported to the caller.
    ///
    /// Missing fields are expected for non-NF-e XML and are only counted.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, DocumentError::MissingField(_))
    }
}

impl From<quick_xml::Error> for DocumentError {
    fn from(err: quick_xml::Error) -> Self {
        DocumentError::Parse(err.to_string())
    }
}

/// Result type for the regtrib library.
pub type Result<T> = std::result::Result<T, RegtribError>;
