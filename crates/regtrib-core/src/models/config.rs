//! Configuration structures for the extraction pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main configuration for the regtrib pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegtribConfig {
    /// Archive expansion configuration.
    pub archive: ArchiveConfig,

    /// Emitter extraction configuration.
    pub extraction: ExtractionConfig,

    /// Spreadsheet report configuration.
    pub report: ReportConfig,
}

/// Archive expansion limits and document discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Maximum number of entries accepted in one archive.
    pub max_entries: usize,

    /// Maximum total uncompressed size in bytes.
    pub max_total_bytes: u64,

    /// File extension of candidate documents (matched case-insensitively).
    pub document_extension: String,

    /// Parent of the per-run working directory (system temp dir if unset).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_total_bytes: 512 * 1024 * 1024,
            document_extension: "xml".to_string(),
            work_dir: None,
        }
    }
}

/// Concurrent extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Number of parallel workers (0 = available parallelism).
    pub workers: usize,

    /// Per-document parse timeout in seconds.
    pub document_timeout_secs: u64,

    /// Documents above this size are skipped.
    pub max_document_bytes: u64,

    /// Report tax IDs whose check digits do not match.
    pub validate_tax_id: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            document_timeout_secs: 30,
            max_document_bytes: 16 * 1024 * 1024,
            validate_tax_id: true,
        }
    }
}

impl ExtractionConfig {
    /// Worker count with the `0 = auto` rule applied.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }
}

/// Spreadsheet report layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Download file name.
    pub file_name: String,

    /// Worksheet name.
    pub sheet_name: String,

    /// Name of the table object covering the data range.
    pub table_name: String,

    /// Characters added to the longest value of each column.
    pub column_padding: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            file_name: "Regime_Tributario.xlsx".to_string(),
            sheet_name: "Regime".to_string(),
            table_name: "RegimeTributario".to_string(),
            column_padding: 2,
        }
    }
}

impl RegtribConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RegtribConfig =
            serde_json::from_str(r#"{"extraction": {"workers": 3}}"#).unwrap();

        assert_eq!(config.extraction.workers, 3);
        assert_eq!(config.extraction.document_timeout_secs, 30);
        assert_eq!(config.archive.document_extension, "xml");
        assert_eq!(config.report.file_name, "Regime_Tributario.xlsx");
    }

    #[test]
    fn test_effective_workers() {
        let mut config = ExtractionConfig::default();
        assert!(config.effective_workers() >= 1);

        config.workers = 7;
        assert_eq!(config.effective_workers(), 7);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = RegtribConfig::default();
        config.report.sheet_name = "Emitentes".to_string();
        config.save(&path).unwrap();

        let loaded = RegtribConfig::from_file(&path).unwrap();
        assert_eq!(loaded.report.sheet_name, "Emitentes");
    }
}
