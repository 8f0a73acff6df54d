//! Data models shared across the pipeline.

pub mod config;
pub mod record;

pub use config::{ArchiveConfig, ExtractionConfig, RegtribConfig, ReportConfig};
pub use record::{Diagnostic, ExtractionRecord, ExtractionSummary};
