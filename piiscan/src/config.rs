use serde::Deserialize;
use std::env;

use crate::models::EntityType;
use crate::report::ReportFormat;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

/// Parse `PII_ENTITIES`.
/// Format: comma-separated entity tags, e.g. `PERSON,EMAIL,PHONE`. Empty means all types.
fn parse_entity_list() -> Vec<EntityType> {
    match env::var("PII_ENTITIES") {
        Ok(val) if !val.trim().is_empty() => val
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .filter_map(|tag| match tag.parse::<EntityType>() {
                Ok(entity) => Some(entity),
                Err(e) => {
                    tracing::warn!("{} in PII_ENTITIES, skipping", e);
                    None
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub ocr: OcrConfig,
    pub classifier: ClassifierConfig,
    pub batch: BatchConfig,
    pub fetch: FetchConfig,
    pub report: ReportConfig,
    pub remote: Option<RemoteConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub languages: String,
    pub timeout_secs: u64,
    pub max_image_dimension: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            model: "local/tesseract".to_string(),
            api_key: None,
            base_url: None,
            languages: "eng".to_string(),
            timeout_secs: 60,
            max_image_dimension: 4096,
        }
    }
}

/// Entity classification thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Entities scoring below this are never returned
    pub min_score: f32,
    /// Entity types to report; empty reports every type
    pub entities: Vec<EntityType>,
    /// Score added when a recognizer's context word precedes the match
    pub context_boost: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_score: 0.5,
            entities: Vec::new(),
            context_boost: 0.35,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    pub max_items: usize,
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_items: 10_000,
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_bytes: 52_428_800,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    pub format: ReportFormat,
    pub batch_label: String,
    pub include_failures: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: ReportFormat::Docx,
            batch_label: "report".to_string(),
            include_failures: false,
        }
    }
}

/// Credentials and addressing for an S3-compatible object store.
///
/// Passed by value into `S3BucketStore::new`; nothing in the crate reads
/// credentials from global state after construction.
#[derive(Clone, Deserialize)]
pub struct RemoteConfig {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub session_token: Option<String>,
    /// Custom endpoint for S3-compatible stores; switches to path-style addressing
    pub endpoint: Option<String>,
    pub presign_expiry_secs: u64,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .field("endpoint", &self.endpoint)
            .field("presign_expiry_secs", &self.presign_expiry_secs)
            .finish()
    }
}

impl RemoteConfig {
    pub fn new(access_key: &str, secret_key: &str, region: &str) -> Self {
        Self {
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            region: region.to_string(),
            session_token: None,
            endpoint: None,
            presign_expiry_secs: 3600,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ocr: OcrConfig {
                model: env::var("OCR_MODEL").unwrap_or_else(|_| "local/tesseract".to_string()),
                api_key: env::var("OCR_API_KEY").ok(),
                base_url: env::var("OCR_BASE_URL").ok(),
                languages: env::var("OCR_LANGUAGES").unwrap_or_else(|_| "eng".to_string()),
                timeout_secs: parse_env_or("OCR_TIMEOUT", 60),
                max_image_dimension: parse_env_or("OCR_MAX_DIMENSION", 4096),
            },
            classifier: ClassifierConfig {
                min_score: parse_env_or("PII_MIN_SCORE", 0.5),
                entities: parse_entity_list(),
                context_boost: parse_env_or("PII_CONTEXT_BOOST", 0.35),
            },
            batch: BatchConfig {
                max_items: parse_env_or("BATCH_MAX_ITEMS", 10_000),
                concurrency: parse_env_or("BATCH_CONCURRENCY", 1),
            },
            fetch: FetchConfig {
                timeout_secs: parse_env_or("FETCH_TIMEOUT", 30),
                max_bytes: parse_env_or("FETCH_MAX_BYTES", 52_428_800),
            },
            report: ReportConfig {
                format: parse_env_or("REPORT_FORMAT", ReportFormat::Docx),
                batch_label: env::var("REPORT_LABEL").unwrap_or_else(|_| "report".to_string()),
                include_failures: parse_env_or("REPORT_INCLUDE_FAILURES", false),
            },
            remote: match (
                env::var("AWS_ACCESS_KEY_ID").ok(),
                env::var("AWS_SECRET_ACCESS_KEY").ok(),
            ) {
                (Some(access_key), Some(secret_key)) => Some(RemoteConfig {
                    access_key,
                    secret_key,
                    region: env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                    session_token: env::var("AWS_SESSION_TOKEN").ok(),
                    endpoint: env::var("S3_ENDPOINT").ok(),
                    presign_expiry_secs: parse_env_or("S3_PRESIGN_EXPIRY", 3600),
                }),
                _ => None,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Clamp values that would make the pipeline unusable.
    pub fn normalized(mut self) -> Self {
        if self.batch.concurrency == 0 {
            tracing::warn!("BATCH_CONCURRENCY must be at least 1, using 1");
            self.batch.concurrency = 1;
        }
        let defaults = ClassifierConfig::default();
        if !self.classifier.min_score.is_finite() {
            tracing::warn!(
                "PII_MIN_SCORE {} is not a number, using {}",
                self.classifier.min_score,
                defaults.min_score
            );
            self.classifier.min_score = defaults.min_score;
        }
        if !self.classifier.context_boost.is_finite() {
            tracing::warn!(
                "PII_CONTEXT_BOOST {} is not a number, using {}",
                self.classifier.context_boost,
                defaults.context_boost
            );
            self.classifier.context_boost = defaults.context_boost;
        }
        if !(0.0..=1.0).contains(&self.classifier.min_score) {
            let clamped = self.classifier.min_score.clamp(0.0, 1.0);
            tracing::warn!(
                "PII_MIN_SCORE {} is outside [0, 1], using {}",
                self.classifier.min_score,
                clamped
            );
            self.classifier.min_score = clamped;
        }
        self
    }
}

/// Split an OCR model string into (provider, model), e.g. `openai/gpt-4o`.
pub fn parse_provider_model(model: &str) -> (&str, &str) {
    match model.split_once('/') {
        Some((prefix, rest)) => (prefix, rest),
        None => ("local", model),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_ocr_config_defaults() {
        env::remove_var("OCR_MODEL");
        env::remove_var("OCR_TIMEOUT");

        let config = Config::default();
        assert_eq!(config.ocr.model, "local/tesseract");
        assert!(config.ocr.api_key.is_none());
        assert_eq!(config.ocr.languages, "eng");
        assert_eq!(config.ocr.timeout_secs, 60);
        assert_eq!(config.ocr.max_image_dimension, 4096);
    }

    #[test]
    #[serial]
    fn test_batch_and_fetch_defaults() {
        env::remove_var("BATCH_MAX_ITEMS");
        env::remove_var("BATCH_CONCURRENCY");
        env::remove_var("FETCH_TIMEOUT");
        env::remove_var("FETCH_MAX_BYTES");

        let config = Config::default();
        assert_eq!(config.batch.max_items, 10_000);
        assert_eq!(config.batch.concurrency, 1);
        assert_eq!(config.fetch.timeout_secs, 30);
        assert_eq!(config.fetch.max_bytes, 52_428_800);
    }

    #[test]
    #[serial]
    fn test_classifier_config_from_env() {
        env::set_var("PII_MIN_SCORE", "0.7");
        env::set_var("PII_ENTITIES", "PERSON, email,bogus");

        let config = Config::default();
        assert_eq!(config.classifier.min_score, 0.7);
        assert_eq!(
            config.classifier.entities,
            vec![EntityType::Person, EntityType::Email]
        );

        env::remove_var("PII_MIN_SCORE");
        env::remove_var("PII_ENTITIES");
    }

    #[test]
    #[serial]
    fn test_invalid_value_falls_back_to_default() {
        env::set_var("FETCH_TIMEOUT", "soon");
        let config = Config::default();
        assert_eq!(config.fetch.timeout_secs, 30);
        env::remove_var("FETCH_TIMEOUT");
    }

    #[test]
    #[serial]
    fn test_remote_config_requires_both_keys() {
        env::remove_var("AWS_SECRET_ACCESS_KEY");
        env::set_var("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE");
        assert!(Config::default().remote.is_none());

        env::set_var("AWS_SECRET_ACCESS_KEY", "secret");
        env::remove_var("AWS_REGION");
        let remote = Config::default().remote.unwrap();
        assert_eq!(remote.access_key, "AKIDEXAMPLE");
        assert_eq!(remote.region, "us-east-1");
        assert_eq!(remote.presign_expiry_secs, 3600);

        env::remove_var("AWS_ACCESS_KEY_ID");
        env::remove_var("AWS_SECRET_ACCESS_KEY");
    }

    #[test]
    fn test_remote_config_debug_redacts_secret() {
        let remote = RemoteConfig::new("AKIDEXAMPLE", "super-secret", "eu-west-1");
        let rendered = format!("{remote:?}");
        assert!(rendered.contains("AKIDEXAMPLE"));
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    #[serial]
    fn test_report_format_from_env() {
        env::set_var("REPORT_FORMAT", "json");
        env::set_var("REPORT_LABEL", "scan-42");
        let config = Config::default();
        assert_eq!(config.report.format, ReportFormat::Json);
        assert_eq!(config.report.batch_label, "scan-42");
        env::remove_var("REPORT_FORMAT");
        env::remove_var("REPORT_LABEL");
    }

    #[test]
    #[serial]
    fn test_normalized_clamps_values() {
        let mut config = Config::default();
        config.batch.concurrency = 0;
        config.classifier.min_score = 1.5;
        let config = config.normalized();
        assert_eq!(config.batch.concurrency, 1);
        assert_eq!(config.classifier.min_score, 1.0);
    }

    #[test]
    #[serial]
    fn test_non_finite_scores_fall_back_to_defaults() {
        env::set_var("PII_MIN_SCORE", "NaN");
        env::set_var("PII_CONTEXT_BOOST", "inf");

        let config = Config::from_env().normalized();
        assert_eq!(config.classifier.min_score, 0.5);
        assert_eq!(config.classifier.context_boost, 0.35);

        env::remove_var("PII_MIN_SCORE");
        env::remove_var("PII_CONTEXT_BOOST");
    }

    #[test]
    fn test_parse_provider_model() {
        assert_eq!(parse_provider_model("openai/gpt-4o"), ("openai", "gpt-4o"));
        assert_eq!(parse_provider_model("tesseract"), ("local", "tesseract"));
    }
}
