use std::path::PathBuf;

use serde::Serialize;

use crate::services::merge::UnitFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStage {
    Backup,
    ServiceCall,
    Parse,
    Save,
}

/// A batch whose units were not persisted. `batch` is 0 when the failure
/// happened before the first batch.
#[derive(Debug, Serialize)]
pub struct BatchFailure {
    pub batch: usize,
    pub units: usize,
    pub stage: BatchStage,
    pub error: String,
    pub artifact: Option<PathBuf>,
}

#[derive(Debug, Default, Serialize)]
pub struct FileReport {
    pub catalog: PathBuf,
    pub language: String,
    pub pending: usize,
    pub batches: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub compiled: bool,
    pub dry_run: bool,
    pub batch_failures: Vec<BatchFailure>,
    pub unit_failures: Vec<UnitFailure>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WorkOutcome {
    Translated(FileReport),
    BuiltFromSource {
        language: String,
        instruction: String,
    },
    Failed {
        catalog: PathBuf,
        language: String,
        error: String,
    },
}

#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub succeeded: usize,
    pub failed: usize,
    pub files_failed: usize,
    pub outcomes: Vec<WorkOutcome>,
}

impl RunReport {
    pub fn from_outcomes(outcomes: Vec<WorkOutcome>) -> Self {
        let mut report = RunReport::default();

        for o in &outcomes {
            match o {
                WorkOutcome::Translated(file) => {
                    report.succeeded += file.succeeded;
                    report.failed += file.failed;
                }
                WorkOutcome::Failed { .. } => report.files_failed += 1,
                WorkOutcome::BuiltFromSource { .. } => {}
            }
        }

        report.outcomes = outcomes;
        report
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.files_failed == 0
    }
}
