use serde::{Deserialize, Serialize};

use super::Entity;

/// Per-item pipeline stage at which an image can fail.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureStage {
    Fetch,
    Decode,
    Extract,
    Classify,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch => write!(f, "FETCH"),
            Self::Decode => write!(f, "DECODE"),
            Self::Extract => write!(f, "EXTRACT"),
            Self::Classify => write!(f, "CLASSIFY"),
        }
    }
}

/// Findings for one image that made it through every stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessedRecord {
    pub image_name: String,
    pub detected_text: String,
    /// In the order the classifier returned them
    pub entities: Vec<Entity>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessingFailure {
    pub image_name: String,
    pub stage: FailureStage,
    pub message: String,
}

impl ProcessingFailure {
    pub fn new(image_name: &str, stage: FailureStage, message: impl Into<String>) -> Self {
        Self {
            image_name: image_name.to_string(),
            stage,
            message: message.into(),
        }
    }
}

/// Outcome of one batch run, handed as a whole to a report assembler.
///
/// Both sequences are in enumeration order. Every enumerated image is
/// accounted for exactly once: as a record, as a failure, or (only when the
/// run was cancelled) in `skipped`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BatchResult {
    pub records: Vec<ProcessedRecord>,
    pub failures: Vec<ProcessingFailure>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: bool,
}

impl BatchResult {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub(crate) fn push_record(&mut self, record: ProcessedRecord) {
        self.records.push(record);
        self.succeeded += 1;
    }

    pub(crate) fn push_failure(&mut self, failure: ProcessingFailure) {
        self.failures.push(failure);
        self.failed += 1;
    }

    pub(crate) fn mark_skipped(&mut self) {
        self.skipped += 1;
        self.cancelled = true;
    }

    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn is_accounted(&self) -> bool {
        self.records.len() + self.failures.len() + self.skipped == self.total
    }

    pub fn entity_count(&self) -> usize {
        self.records.iter().map(|r| r.entities.len()).sum()
    }

    pub fn failures_at(&self, stage: FailureStage) -> impl Iterator<Item = &ProcessingFailure> {
        self.failures.iter().filter(move |f| f.stage == stage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Succeeded,
    Failed(FailureStage),
}

/// Reported once per attempted item, in enumeration order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    pub image_name: String,
    pub status: ItemStatus,
}

impl BatchProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f64 / self.total as f64
    }

    pub fn is_finished(&self) -> bool {
        self.completed == self.total
    }
}
