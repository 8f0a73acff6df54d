//! Core library for NF-e tax regime extraction.
//!
//! This crate provides:
//! - Zip archive expansion into a scoped working directory
//! - Recursive discovery of XML documents
//! - Concurrent NF-e emitter extraction (CNPJ, xNome, CRT)
//! - Tax ID canonicalization and record deduplication
//! - XLSX report rendering with a summary band and a styled table

pub mod archive;
pub mod error;
pub mod models;
pub mod nfe;
pub mod pipeline;
pub mod report;

pub use error::{ArchiveError, DocumentError, RegtribError, Result};
pub use models::{Diagnostic, ExtractionRecord, ExtractionSummary, RegtribConfig};
pub use nfe::rules::{format_tax_id, regime_label, Regime};
pub use nfe::{EmitterExtractor, NfeEmitterParser, NFE_NAMESPACE};
pub use pipeline::{Pipeline, PipelineOutcome, PipelineState, ReportArtifact, RunReport};
pub use report::{ReportGenerator, XLSX_MIME_TYPE};
