use crate::config::ReportConfig;
use crate::error::Result;
use crate::models::{BatchResult, ReportArtifact};

use super::{ReportAssembler, ReportFormat, ReportOutline, ReportSettings};

/// Plain-text report with the same layout as the Word document.
pub struct TextReportAssembler {
    settings: ReportSettings,
}

impl TextReportAssembler {
    pub fn new(config: &ReportConfig) -> Self {
        Self {
            settings: ReportSettings::from_config(config),
        }
    }
}

fn render(outline: &ReportOutline) -> String {
    let mut out = String::new();
    out.push_str(&outline.title);
    out.push('\n');
    out.push_str(&"=".repeat(outline.title.len()));
    out.push('\n');
    out.push_str(&outline.summary);
    out.push('\n');

    for section in &outline.sections {
        out.push_str(&format!("\nImage: {}\n", section.image_name));
        out.push_str("Detected Text:\n");
        if section.detected_text.trim().is_empty() {
            out.push_str("(no text detected)\n");
        } else {
            for line in section.detected_text.lines() {
                out.push_str(&format!("  {line}\n"));
            }
        }
        out.push_str("Detected Entities:\n");
        if section.entity_lines.is_empty() {
            out.push_str("  No PII detected\n");
        } else {
            for line in &section.entity_lines {
                out.push_str(&format!("  {line}\n"));
            }
        }
    }

    if !outline.failure_lines.is_empty() {
        out.push_str("\nFailures:\n");
        for line in &outline.failure_lines {
            out.push_str(&format!("  {line}\n"));
        }
    }

    out
}

impl ReportAssembler for TextReportAssembler {
    fn assemble(&self, result: &BatchResult) -> Result<ReportArtifact> {
        let outline = ReportOutline::from_result(result, self.settings.include_failures)?;
        Ok(self
            .settings
            .artifact(self.format(), render(&outline).into_bytes()))
    }

    fn format(&self) -> ReportFormat {
        ReportFormat::Text
    }
}
