//! Pipeline run states.

use serde::{Deserialize, Serialize};

/// Stage of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Run created but not started
    Idle,
    /// Unpacking the archive
    Expanding,
    /// Looking for candidate documents
    Scanning,
    /// Parsing documents concurrently
    Extracting,
    /// Normalizing and deduplicating records
    Aggregating,
    /// Writing the report
    Rendering,
    /// Run finished, with or without data
    Done,
    /// Run aborted
    Failed,
}

impl PipelineState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, target: PipelineState) -> bool {
        use PipelineState::*;

        match (self, target) {
            (Idle, Expanding) => true,
            (Expanding, Scanning) => true,
            (Expanding, Failed) => true,
            (Scanning, Extracting) => true,
            (Extracting, Aggregating) => true,
            (Aggregating, Rendering) => true,
            (Rendering, Done) => true,
            // Only reachable through an internal workbook error.
            (Rendering, Failed) => true,

            (Done, _) | (Failed, _) => false,
            _ => false,
        }
    }

    /// Check if the run is over
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Expanding => "expanding",
            Self::Scanning => "scanning",
            Self::Extracting => "extracting",
            Self::Aggregating => "aggregating",
            Self::Rendering => "rendering",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}
