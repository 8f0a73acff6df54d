//! Tax ID canonicalization and record deduplication.

use std::collections::HashSet;

use crate::models::ExtractionRecord;

/// Records left after deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deduplicated {
    /// Unique records, in first-occurrence order.
    pub records: Vec<ExtractionRecord>,
    /// Input length minus output length.
    pub duplicates_removed: usize,
}

/// Canonicalize every tax ID, then keep one record per distinct
/// (tax ID, legal name, regime) tuple.
pub fn normalize_and_dedup(records: Vec<ExtractionRecord>) -> Deduplicated {
    let total = records.len();
    let mut seen = HashSet::with_capacity(total);

    let records: Vec<ExtractionRecord> = records
        .into_iter()
        .map(ExtractionRecord::into_canonical)
        .filter(|record| seen.insert(record.clone()))
        .collect();

    Deduplicated {
        duplicates_removed: total - records.len(),
        records,
    }
}
