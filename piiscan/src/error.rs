use thiserror::Error;

#[derive(Error, Debug)]
pub enum PiiScanError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No images to process: {0}")]
    Empty(String),

    #[error("Batch too large: {found} images enumerated, limit is {limit}")]
    BatchTooLarge { found: usize, limit: usize },

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("OCR unavailable: {0}")]
    OcrUnavailable(String),

    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("Nothing to report: batch produced no processed records")]
    EmptyInput,

    #[error("Report error: {0}")]
    Report(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl PiiScanError {
    /// Whether this error ends the whole run rather than a single item.
    ///
    /// Stage errors (`Fetch`, `Decode`, `Extraction`, `OcrUnavailable`,
    /// `Classification`) are recovered into a `ProcessingFailure` by the batch
    /// processor; everything else means there was nothing valid to do.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            PiiScanError::Fetch(_)
                | PiiScanError::Decode(_)
                | PiiScanError::Extraction(_)
                | PiiScanError::OcrUnavailable(_)
                | PiiScanError::Classification(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PiiScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_errors_are_recoverable() {
        assert!(!PiiScanError::Fetch("404".to_string()).is_terminal());
        assert!(!PiiScanError::Decode("bad header".to_string()).is_terminal());
        assert!(!PiiScanError::Extraction("engine".to_string()).is_terminal());
        assert!(!PiiScanError::OcrUnavailable("missing".to_string()).is_terminal());
        assert!(!PiiScanError::Classification("bad".to_string()).is_terminal());
    }

    #[test]
    fn test_setup_errors_are_terminal() {
        assert!(PiiScanError::NotFound("/tmp/x".to_string()).is_terminal());
        assert!(PiiScanError::Empty("/tmp/x".to_string()).is_terminal());
        assert!(PiiScanError::Connection("denied".to_string()).is_terminal());
        assert!(PiiScanError::EmptyInput.is_terminal());
        assert!(PiiScanError::BatchTooLarge {
            found: 11,
            limit: 10
        }
        .is_terminal());
    }

    #[test]
    fn test_batch_too_large_message() {
        let err = PiiScanError::BatchTooLarge {
            found: 12,
            limit: 10,
        };
        assert_eq!(
            err.to_string(),
            "Batch too large: 12 images enumerated, limit is 10"
        );
    }
}
