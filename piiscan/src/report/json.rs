use serde::Serialize;

use crate::config::ReportConfig;
use crate::error::Result;
use crate::models::{BatchResult, ProcessedRecord, ProcessingFailure, ReportArtifact};

use super::{ReportAssembler, ReportFormat, ReportOutline, ReportSettings};

#[derive(Serialize)]
struct JsonReport<'a> {
    title: &'a str,
    summary: &'a str,
    total: usize,
    succeeded: usize,
    failed: usize,
    skipped: usize,
    cancelled: bool,
    records: &'a [ProcessedRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    failures: Option<&'a [ProcessingFailure]>,
}

/// Machine-readable report: batch counts plus the full records.
pub struct JsonReportAssembler {
    settings: ReportSettings,
}

impl JsonReportAssembler {
    pub fn new(config: &ReportConfig) -> Self {
        Self {
            settings: ReportSettings::from_config(config),
        }
    }
}

impl ReportAssembler for JsonReportAssembler {
    fn assemble(&self, result: &BatchResult) -> Result<ReportArtifact> {
        let outline = ReportOutline::from_result(result, self.settings.include_failures)?;

        let report = JsonReport {
            title: &outline.title,
            summary: &outline.summary,
            total: result.total,
            succeeded: result.succeeded,
            failed: result.failed,
            skipped: result.skipped,
            cancelled: result.cancelled,
            records: &result.records,
            failures: self
                .settings
                .include_failures
                .then_some(result.failures.as_slice()),
        };

        let bytes = serde_json::to_vec_pretty(&report)?;
        Ok(self.settings.artifact(self.format(), bytes))
    }

    fn format(&self) -> ReportFormat {
        ReportFormat::Json
    }
}
