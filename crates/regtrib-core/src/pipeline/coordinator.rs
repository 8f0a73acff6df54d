//! Concurrent fan-out of the emitter extractor over candidate documents.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::DocumentError;
use crate::models::{Diagnostic, ExtractionConfig, ExtractionRecord};
use crate::nfe::rules::validate_tax_id;
use crate::nfe::EmitterExtractor;
use crate::report::MAX_CELL_CHARS;

/// Aggregated result of one extraction pass.
#[derive(Debug, Default)]
pub struct Extraction {
    /// Records in document discovery order.
    pub records: Vec<ExtractionRecord>,
    /// Reportable per-document failures and warnings.
    pub diagnostics: Vec<Diagnostic>,
    /// Documents attempted.
    pub attempted: usize,
    /// Documents skipped because a required field was absent.
    pub missing_fields: usize,
}

impl Extraction {
    /// Documents that yielded a record.
    pub fn total_read(&self) -> usize {
        self.records.len()
    }
}

/// Runs an [`EmitterExtractor`] over many documents with bounded parallelism.
///
/// Each document is parsed on the blocking pool and owned by exactly one
/// task. Results are only aggregated after every task has finished.
pub struct ExtractionCoordinator<E> {
    extractor: Arc<E>,
    workers: usize,
    timeout: Option<Duration>,
    validate_tax_id: bool,
}

impl<E: EmitterExtractor + 'static> ExtractionCoordinator<E> {
    pub fn new(extractor: Arc<E>) -> Self {
        Self {
            extractor,
            workers: 4,
            timeout: None,
            validate_tax_id: false,
        }
    }

    /// Apply worker count, timeout and validation settings.
    pub fn with_config(mut self, config: &ExtractionConfig) -> Self {
        self.workers = config.effective_workers();
        self.timeout = match config.document_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        self.validate_tax_id = config.validate_tax_id;
        self
    }

    /// Set the number of parallel workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the per-document timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Extract every document. Paths in diagnostics are made relative to `root`.
    pub async fn run(&self, root: &Path, documents: Vec<PathBuf>) -> Extraction {
        let attempted = documents.len();
        debug!("Extracting {} documents with {} workers", attempted, self.workers);

        let permits = Arc::new(Semaphore::new(self.workers.max(1)));

        let mut outcomes: Vec<(usize, PathBuf, Result<ExtractionRecord, DocumentError>)> =
            stream::iter(documents.into_iter().enumerate())
                .map(|(index, path)| self.extract_one(index, path, Arc::clone(&permits)))
                .buffer_unordered(self.workers.max(1))
                .collect()
                .await;

        // Join barrier passed: aggregate on this task only.
        outcomes.sort_by_key(|(index, _, _)| *index);

        let mut extraction = Extraction {
            attempted,
            ..Extraction::default()
        };

        for (_, path, outcome) in outcomes {
            let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();

            match outcome.and_then(fit_worksheet_cells) {
                Ok(record) => {
                    if self.validate_tax_id && !validate_tax_id(&record.tax_id) {
                        warn!("Invalid tax ID check digits in {}: {}", relative.display(), record.tax_id);
                        extraction.diagnostics.push(Diagnostic::new(
                            &relative,
                            format!("tax ID {} has invalid check digits", record.tax_id),
                        ));
                    }
                    extraction.records.push(record);
                }
                Err(e) if !e.is_reportable() => {
                    debug!("Skipping {}: {}", relative.display(), e);
                    extraction.missing_fields += 1;
                }
                Err(e) => {
                    warn!("Failed to process {}: {}", relative.display(), e);
                    extraction.diagnostics.push(Diagnostic::new(relative, e.to_string()));
                }
            }
        }

        debug!(
            "Extraction finished: {} records from {} documents",
            extraction.total_read(),
            attempted
        );

        extraction
    }

    /// The permit moves into the blocking closure, so a thread left running
    /// after a timeout keeps its worker slot until it returns.
    async fn extract_one(
        &self,
        index: usize,
        path: PathBuf,
        permits: Arc<Semaphore>,
    ) -> (usize, PathBuf, Result<ExtractionRecord, DocumentError>) {
        let permit = match permits.acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => return (index, path, Err(DocumentError::Worker(e.to_string()))),
        };

        let extractor = Arc::clone(&self.extractor);
        let task_path = path.clone();
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            extractor.extract_file(&task_path)
        });

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => return (index, path, Err(DocumentError::Timeout(limit))),
            },
            None => task.await,
        };

        let outcome = joined.unwrap_or_else(|e| Err(DocumentError::Worker(e.to_string())));
        (index, path, outcome)
    }
}

/// Reject records whose fields cannot be written to a worksheet cell.
fn fit_worksheet_cells(record: ExtractionRecord) -> Result<ExtractionRecord, DocumentError> {
    for (field, value) in [("CNPJ", &record.tax_id), ("xNome", &record.legal_name)] {
        let length = value.chars().count();
        if length > MAX_CELL_CHARS {
            return Err(DocumentError::FieldTooLong {
                field,
                length,
                limit: MAX_CELL_CHARS,
            });
        }
    }
    Ok(record)
}
