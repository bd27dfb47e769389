use std::io::Cursor;

use docx_rs::{Docx, Paragraph, Run};

use crate::config::ReportConfig;
use crate::error::{PiiScanError, Result};
use crate::models::{BatchResult, ReportArtifact};

use super::{ReportAssembler, ReportFormat, ReportOutline, ReportSettings};

// Run sizes are in half-points
const TITLE_SIZE: usize = 32;
const HEADING_SIZE: usize = 26;

/// Word document report.
pub struct DocxReportAssembler {
    settings: ReportSettings,
}

impl DocxReportAssembler {
    pub fn new(config: &ReportConfig) -> Self {
        Self {
            settings: ReportSettings::from_config(config),
        }
    }
}

fn text_paragraph(text: &str) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(text))
}

fn bold_paragraph(text: &str, size: Option<usize>) -> Paragraph {
    let run = Run::new().add_text(text).bold();
    let run = match size {
        Some(size) => run.size(size),
        None => run,
    };
    Paragraph::new().add_run(run)
}

fn render(outline: &ReportOutline) -> Docx {
    let mut docx = Docx::new()
        .add_paragraph(bold_paragraph(&outline.title, Some(TITLE_SIZE)))
        .add_paragraph(text_paragraph(&outline.summary));

    for section in &outline.sections {
        docx = docx
            .add_paragraph(bold_paragraph(
                &format!("Image: {}", section.image_name),
                Some(HEADING_SIZE),
            ))
            .add_paragraph(bold_paragraph("Detected Text:", None));

        if section.detected_text.trim().is_empty() {
            docx = docx.add_paragraph(text_paragraph("(no text detected)"));
        } else {
            for line in section.detected_text.lines() {
                docx = docx.add_paragraph(text_paragraph(line));
            }
        }

        docx = docx.add_paragraph(bold_paragraph("Detected Entities:", None));
        if section.entity_lines.is_empty() {
            docx = docx.add_paragraph(text_paragraph("No PII detected"));
        } else {
            for line in &section.entity_lines {
                docx = docx.add_paragraph(text_paragraph(line));
            }
        }
    }

    if !outline.failure_lines.is_empty() {
        docx = docx.add_paragraph(bold_paragraph("Failures", Some(HEADING_SIZE)));
        for line in &outline.failure_lines {
            docx = docx.add_paragraph(text_paragraph(line));
        }
    }

    docx
}

impl ReportAssembler for DocxReportAssembler {
    fn assemble(&self, result: &BatchResult) -> Result<ReportArtifact> {
        let outline = ReportOutline::from_result(result, self.settings.include_failures)?;

        let mut buffer = Cursor::new(Vec::new());
        render(&outline)
            .build()
            .pack(&mut buffer)
            .map_err(|e| PiiScanError::Report(format!("Failed to pack DOCX: {e}")))?;

        Ok(self.settings.artifact(self.format(), buffer.into_inner()))
    }

    fn format(&self) -> ReportFormat {
        ReportFormat::Docx
    }
}
