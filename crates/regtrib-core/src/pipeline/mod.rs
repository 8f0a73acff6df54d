//! End-to-end run: expand, scan, extract, deduplicate, render.

mod coordinator;
mod dedup;
mod state;

pub use coordinator::{Extraction, ExtractionCoordinator};
pub use dedup::{normalize_and_dedup, Deduplicated};
pub use state::PipelineState;

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::archive::{self, ExpandedArchive};
use crate::error::{ArchiveError, RegtribError, Result};
use crate::models::{Diagnostic, ExtractionRecord, ExtractionSummary, RegtribConfig};
use crate::nfe::{EmitterExtractor, NfeEmitterParser};
use crate::report::{ReportGenerator, MAX_DATA_ROWS, XLSX_MIME_TYPE};

/// What happened during a run, independent of whether a report was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Counters before and after deduplication.
    pub summary: ExtractionSummary,

    /// Non-fatal per-document problems.
    pub diagnostics: Vec<Diagnostic>,

    /// Candidate documents found in the archive.
    pub documents_found: usize,

    /// Final state of the run.
    pub state: PipelineState,

    /// When the run finished.
    pub finished_at: DateTime<Utc>,

    /// Wall-clock duration in milliseconds.
    pub elapsed_ms: u64,
}

/// A rendered report ready for download.
#[derive(Debug, Clone)]
pub struct ReportArtifact {
    /// XLSX bytes.
    pub bytes: Vec<u8>,

    /// Suggested download file name.
    pub file_name: String,

    /// MIME type of `bytes`.
    pub mime_type: &'static str,

    /// The deduplicated rows written to the report.
    pub records: Vec<ExtractionRecord>,

    /// Run counters and diagnostics.
    pub run: RunReport,
}

/// Non-error result of a run.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// At least one record survived; a report was rendered.
    Report(ReportArtifact),

    /// Nothing was extracted; no report was rendered.
    NoData(RunReport),
}

impl PipelineOutcome {
    /// Counters and diagnostics of the run.
    pub fn run_report(&self) -> &RunReport {
        match self {
            PipelineOutcome::Report(artifact) => &artifact.run,
            PipelineOutcome::NoData(run) => run,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, PipelineOutcome::NoData(_))
    }
}

/// Tracks the state machine of a single run.
struct RunTracker {
    state: PipelineState,
    started: Instant,
}

impl RunTracker {
    fn new() -> Self {
        Self {
            state: PipelineState::Idle,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {}",
            self.state,
            next
        );
        debug!("Pipeline {} -> {}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, err: impl Into<RegtribError>) -> RegtribError {
        let err = err.into();
        warn!("Pipeline failed while {}: {}", self.state, err);
        self.advance(PipelineState::Failed);
        err
    }

    fn finish(
        &mut self,
        summary: ExtractionSummary,
        diagnostics: Vec<Diagnostic>,
        documents_found: usize,
    ) -> RunReport {
        self.advance(PipelineState::Done);
        RunReport {
            summary,
            diagnostics,
            documents_found,
            state: self.state,
            finished_at: Utc::now(),
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}

/// Batch extraction pipeline over one archive.
///
/// Each call to [`Pipeline::run`] is independent: the archive is expanded
/// into a private working directory that is removed before `run` returns.
pub struct Pipeline<E = NfeEmitterParser> {
    config: RegtribConfig,
    extractor: Arc<E>,
}

impl Pipeline<NfeEmitterParser> {
    /// Create a pipeline using the NF-e emitter parser.
    pub fn new(config: RegtribConfig) -> Self {
        let parser = NfeEmitterParser::new().with_max_bytes(config.extraction.max_document_bytes);
        Self::with_extractor(config, parser)
    }
}

impl<E: EmitterExtractor + 'static> Pipeline<E> {
    /// Create a pipeline with a custom extractor.
    pub fn with_extractor(config: RegtribConfig, extractor: E) -> Self {
        Self {
            config,
            extractor: Arc::new(extractor),
        }
    }

    pub fn config(&self) -> &RegtribConfig {
        &self.config
    }

    /// Process an archive held in memory.
    ///
    /// Returns `Err` when the archive cannot be expanded or the workbook
    /// writer fails. Per-document problems end up in
    /// [`RunReport::diagnostics`].
    pub async fn run(&self, archive_bytes: &[u8]) -> Result<PipelineOutcome> {
        let mut tracker = RunTracker::new();

        tracker.advance(PipelineState::Expanding);
        let expanded = match self.expand(archive_bytes).await {
            Ok(expanded) => expanded,
            Err(e) => return Err(tracker.fail(e)),
        };

        tracker.advance(PipelineState::Scanning);
        let documents = archive::locate_documents(
            expanded.root(),
            &self.config.archive.document_extension,
        );
        let documents_found = documents.len();
        info!("Found {} candidate documents", documents_found);

        tracker.advance(PipelineState::Extracting);
        let extraction = ExtractionCoordinator::new(Arc::clone(&self.extractor))
            .with_config(&self.config.extraction)
            .run(expanded.root(), documents)
            .await;

        // Workers are done with the tree.
        drop(expanded);

        tracker.advance(PipelineState::Aggregating);
        let mut total_read = extraction.total_read();
        let mut diagnostics = extraction.diagnostics;
        let mut deduplicated = normalize_and_dedup(extraction.records);

        let overflow = deduplicated.records.len().saturating_sub(MAX_DATA_ROWS);
        if overflow > 0 {
            warn!("{} records exceed the worksheet row limit", overflow);
            deduplicated.records.truncate(MAX_DATA_ROWS);
            total_read -= overflow;
            diagnostics.push(Diagnostic::new(
                ".",
                format!("{overflow} records beyond the worksheet limit of {MAX_DATA_ROWS} rows were left out"),
            ));
        }

        let summary = ExtractionSummary::new(total_read, deduplicated.records.len());
        info!(
            "Total read: {}, duplicates removed: {}, total final: {}",
            summary.total_read, summary.duplicates_removed, summary.total_final
        );

        tracker.advance(PipelineState::Rendering);
        if deduplicated.records.is_empty() {
            warn!("No data extracted from {} documents", documents_found);
            let run = tracker.finish(summary, diagnostics, documents_found);
            return Ok(PipelineOutcome::NoData(run));
        }

        let generator = ReportGenerator::new(self.config.report.clone());
        let bytes = match generator.render(&deduplicated.records, &summary) {
            Ok(bytes) => bytes,
            Err(e) => return Err(tracker.fail(e)),
        };

        let run = tracker.finish(summary, diagnostics, documents_found);
        Ok(PipelineOutcome::Report(ReportArtifact {
            bytes,
            file_name: generator.file_name().to_string(),
            mime_type: XLSX_MIME_TYPE,
            records: deduplicated.records,
            run,
        }))
    }

    async fn expand(&self, archive_bytes: &[u8]) -> std::result::Result<ExpandedArchive, ArchiveError> {
        let data = archive_bytes.to_vec();
        let config = self.config.archive.clone();

        tokio::task::spawn_blocking(move || archive::expand(&data, &config))
            .await
            .map_err(|e| ArchiveError::Io(std::io::Error::other(e.to_string())))?
    }
}
