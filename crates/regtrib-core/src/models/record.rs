//! Extracted emitter records and run counters.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::nfe::rules::{format_tax_id, Regime};

/// One row of extracted emitter data.
///
/// Equality covers every field and is what deduplication compares.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtractionRecord {
    /// Emitter tax ID (CNPJ), verbatim until canonicalized.
    pub tax_id: String,

    /// Emitter legal name (xNome).
    pub legal_name: String,

    /// Tax regime decoded from CRT.
    pub regime: Regime,
}

impl ExtractionRecord {
    pub fn new(tax_id: impl Into<String>, legal_name: impl Into<String>, regime: Regime) -> Self {
        Self {
            tax_id: tax_id.into(),
            legal_name: legal_name.into(),
            regime,
        }
    }

    /// Rewrite the tax ID into its punctuated display form.
    pub fn into_canonical(mut self) -> Self {
        self.tax_id = format_tax_id(&self.tax_id);
        self
    }

    /// Report cells in column order: tax ID, legal name, regime label.
    pub fn cells(&self) -> [&str; 3] {
        [&self.tax_id, &self.legal_name, self.regime.label()]
    }
}

/// Counters describing one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionSummary {
    /// Documents that yielded a record, before deduplication.
    pub total_read: usize,

    /// Records dropped as duplicates.
    pub duplicates_removed: usize,

    /// Records left after deduplication.
    pub total_final: usize,
}

impl ExtractionSummary {
    pub fn new(total_read: usize, total_final: usize) -> Self {
        Self {
            total_read,
            duplicates_removed: total_read.saturating_sub(total_final),
            total_final,
        }
    }
}

/// Non-fatal per-document failure surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Path of the document relative to the archive root.
    pub path: PathBuf,

    /// Failure reason.
    pub reason: String,
}

impl Diagnostic {
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
