//! Report assembly.
//!
//! Every assembler renders the same [`ReportOutline`]: a title, a one-line
//! summary, one section per processed image and an optional failure
//! appendix. Only the container format differs.

mod docx;
mod json;
mod text;

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::config::ReportConfig;
use crate::error::{PiiScanError, Result};
use crate::models::{BatchResult, Entity, ReportArtifact};

pub use docx::DocxReportAssembler;
pub use json::JsonReportAssembler;
pub use text::TextReportAssembler;

pub const REPORT_TITLE: &str = "PII Detection Report";

/// Turns a batch result into a single downloadable artifact.
///
/// Fails with `PiiScanError::EmptyInput` when the batch has no records.
pub trait ReportAssembler: Send + Sync {
    fn assemble(&self, result: &BatchResult) -> Result<ReportArtifact>;

    fn format(&self) -> ReportFormat;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Docx,
    Json,
    Text,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Json => "json",
            Self::Text => "txt",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Json => "application/json",
            Self::Text => "text/plain; charset=utf-8",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Docx => write!(f, "docx"),
            Self::Json => write!(f, "json"),
            Self::Text => write!(f, "text"),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "docx" | "word" => Ok(Self::Docx),
            "json" => Ok(Self::Json),
            "text" | "txt" => Ok(Self::Text),
            _ => Err(format!("Unknown report format: {s}")),
        }
    }
}

/// Assembler for the configured format.
pub fn assembler_for(config: &ReportConfig) -> Box<dyn ReportAssembler> {
    match config.format {
        ReportFormat::Docx => Box::new(DocxReportAssembler::new(config)),
        ReportFormat::Json => Box::new(JsonReportAssembler::new(config)),
        ReportFormat::Text => Box::new(TextReportAssembler::new(config)),
    }
}

/// Settings every assembler shares.
#[derive(Debug, Clone)]
pub(crate) struct ReportSettings {
    pub label: String,
    pub include_failures: bool,
}

impl ReportSettings {
    pub(crate) fn from_config(config: &ReportConfig) -> Self {
        let label = config.batch_label.trim();
        Self {
            label: if label.is_empty() {
                "report".to_string()
            } else {
                label.to_string()
            },
            include_failures: config.include_failures,
        }
    }

    pub(crate) fn artifact(&self, format: ReportFormat, bytes: Vec<u8>) -> ReportArtifact {
        ReportArtifact {
            bytes,
            filename: format!("{}.{}", self.label, format.extension()),
            content_type: format.content_type().to_string(),
        }
    }
}

/// One image's part of the report.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSection {
    pub image_name: String,
    pub detected_text: String,
    pub entity_lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutline {
    pub title: String,
    pub summary: String,
    pub sections: Vec<ImageSection>,
    /// Empty unless failures were requested and some exist
    pub failure_lines: Vec<String>,
}

impl ReportOutline {
    pub fn from_result(result: &BatchResult, include_failures: bool) -> Result<Self> {
        if result.records.is_empty() {
            return Err(PiiScanError::EmptyInput);
        }

        let mut summary = format!(
            "Images: {}, processed: {}, failed: {}, entities found: {}",
            result.total,
            result.succeeded,
            result.failed,
            result.entity_count()
        );
        if result.cancelled {
            summary.push_str(&format!(", skipped: {} (run cancelled)", result.skipped));
        }

        let sections = result
            .records
            .iter()
            .map(|record| ImageSection {
                image_name: record.image_name.clone(),
                detected_text: record.detected_text.clone(),
                entity_lines: record.entities.iter().map(entity_line).collect(),
            })
            .collect();

        let failure_lines = if include_failures {
            result
                .failures
                .iter()
                .map(|f| format!("{} [{}]: {}", f.image_name, f.stage, f.message))
                .collect()
        } else {
            Vec::new()
        };

        Ok(Self {
            title: REPORT_TITLE.to_string(),
            summary,
            sections,
            failure_lines,
        })
    }
}

pub fn entity_line(entity: &Entity) -> String {
    format!(
        "Type: {}, Text: {}, Confidence: {:.2}",
        entity.entity_type, entity.text, entity.score
    )
}


#[cfg(test)]
mod tests {
    use super::test_support::sample_result;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_entity_line_format() {
        let result = sample_result();
        assert_eq!(
            entity_line(&result.records[0].entities[0]),
            "Type: PERSON, Text: John Doe, Confidence: 0.85"
        );
    }

    #[test]
    fn test_outline_requires_records() {
        let err = ReportOutline::from_result(&BatchResult::new(0), false).unwrap_err();
        assert!(matches!(err, PiiScanError::EmptyInput));
    }

    #[test]
    fn test_outline_failure_appendix_is_optional() {
        let result = sample_result();
        let without = ReportOutline::from_result(&result, false).unwrap();
        assert!(without.failure_lines.is_empty());

        let with = ReportOutline::from_result(&result, true).unwrap();
        assert_eq!(
            with.failure_lines,
            vec!["c.jpg [DECODE]: unrecognized image format"]
        );
        assert_eq!(with.sections.len(), 2);
        assert_eq!(
            with.summary,
            "Images: 3, processed: 2, failed: 1, entities found: 2"
        );
    }

    #[test]
    fn test_report_format_parsing() {
        assert_eq!("DOCX".parse::<ReportFormat>(), Ok(ReportFormat::Docx));
        assert_eq!("txt".parse::<ReportFormat>(), Ok(ReportFormat::Text));
        assert!("pdf".parse::<ReportFormat>().is_err());
        assert_eq!(ReportFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_assembler_for_matches_format() {
        for format in [ReportFormat::Docx, ReportFormat::Json, ReportFormat::Text] {
            let config = ReportConfig {
                format,
                ..ReportConfig::default()
            };
            assert_eq!(assembler_for(&config).format(), format);
        }
    }

    #[test]
    fn test_blank_label_falls_back_to_report() {
        let config = ReportConfig {
            batch_label: "  ".to_string(),
            ..ReportConfig::default()
        };
        let artifact = ReportSettings::from_config(&config).artifact(ReportFormat::Json, vec![]);
        assert_eq!(artifact.filename, "report.json");
    }
}
