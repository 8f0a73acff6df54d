//! NF-e emitter extraction.

mod parser;
pub mod rules;

pub use parser::NfeEmitterParser;

use std::path::Path;

use crate::error::DocumentError;
use crate::models::ExtractionRecord;

/// Namespace URI of Brazilian NF-e documents.
pub const NFE_NAMESPACE: &str = "http://www.portalfiscal.inf.br/nfe";

/// Result type for per-document extraction.
pub type Result<T> = std::result::Result<T, DocumentError>;

/// Trait for emitter record extractors.
pub trait EmitterExtractor: Send + Sync {
    /// Extract the emitter record from an XML string.
    fn extract(&self, xml: &str) -> Result<ExtractionRecord>;

    /// Extract the emitter record from a file on disk.
    fn extract_file(&self, path: &Path) -> Result<ExtractionRecord>;
}
