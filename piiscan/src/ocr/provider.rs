use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use leptess::LepTess;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::config::{parse_provider_model, OcrConfig};
use crate::error::{PiiScanError, Result};

use super::api::{VisionOcrClient, VisionProvider};
use super::preprocessing::{encode_png, prepare_for_ocr};
use super::TextExtractor;

/// Exclusive access to a blocking OCR engine.
///
/// A timed-out call leaves its blocking task running with the guard held.
/// Until that task returns, `acquire` fails immediately instead of queueing
/// behind it.
struct EngineLock<T> {
    engine: Arc<Mutex<T>>,
    abandoned: Arc<AtomicBool>,
}

impl<T> Clone for EngineLock<T> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            abandoned: Arc::clone(&self.abandoned),
        }
    }
}

impl<T> EngineLock<T> {
    fn new(engine: T) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            abandoned: Arc::new(AtomicBool::new(false)),
        }
    }

    async fn acquire(&self) -> Result<OwnedMutexGuard<T>> {
        if self.abandoned.load(Ordering::Acquire) {
            return Arc::clone(&self.engine).try_lock_owned().map_err(|_| {
                PiiScanError::Extraction(
                    "OCR engine is still busy with a timed-out image".to_string(),
                )
            });
        }
        Ok(Arc::clone(&self.engine).lock_owned().await)
    }

    /// Mark the engine as held by a call whose caller gave up on it.
    fn abandon(&self) {
        self.abandoned.store(true, Ordering::Release);
    }

    /// Called by the blocking task once it is done with the engine.
    fn release(&self) {
        self.abandoned.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
enum OcrBackend {
    Local { tesseract: EngineLock<LepTess> },
    Api { client: VisionOcrClient },
    Unavailable { reason: String },
}

#[derive(Clone)]
pub struct OcrProvider {
    backend: OcrBackend,
    config: OcrConfig,
}

fn create_tesseract(languages: &str) -> std::result::Result<LepTess, String> {
    LepTess::new(None, languages).map_err(|e| e.to_string())
}

impl OcrProvider {
    pub fn new(config: &OcrConfig) -> Result<Self> {
        let (prefix, _) = parse_provider_model(&config.model);

        let backend = match VisionProvider::from_prefix(prefix) {
            Some(provider) => match VisionOcrClient::new(provider, config) {
                Ok(client) => {
                    info!(model = %client.model(), "Vision OCR API backend initialized");
                    OcrBackend::Api { client }
                }
                Err(e) => {
                    let reason = format!("Vision OCR backend unavailable: {e}");
                    warn!("{}", reason);
                    OcrBackend::Unavailable { reason }
                }
            },
            None => match create_tesseract(&config.languages) {
                Ok(lt) => {
                    info!(languages = %config.languages, "Tesseract OCR initialized");
                    OcrBackend::Local {
                        tesseract: EngineLock::new(lt),
                    }
                }
                Err(e) => {
                    let reason = format!("Tesseract not available: {e}");
                    warn!("{}", reason);
                    OcrBackend::Unavailable { reason }
                }
            },
        };

        Ok(Self {
            backend,
            config: config.clone(),
        })
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.backend, OcrBackend::Unavailable { .. })
    }

    /// Why the backend could not start, if it could not.
    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.backend {
            OcrBackend::Unavailable { reason } => Some(reason),
            _ => None,
        }
    }

    /// Run OCR on encoded image bytes, bounded by the configured timeout.
    pub async fn ocr(&self, image_bytes: &[u8]) -> Result<String> {
        let timeout_duration = Duration::from_secs(self.config.timeout_secs);

        match tokio::time::timeout(timeout_duration, self.ocr_internal(image_bytes)).await {
            Ok(inner_result) => inner_result,
            Err(_) => {
                if let OcrBackend::Local { tesseract } = &self.backend {
                    tesseract.abandon();
                }
                Err(PiiScanError::Extraction(format!(
                    "OCR operation timed out after {} seconds",
                    self.config.timeout_secs
                )))
            }
        }
    }

    async fn ocr_internal(&self, image_bytes: &[u8]) -> Result<String> {
        match &self.backend {
            OcrBackend::Local { tesseract } => {
                let bytes = image_bytes.to_vec();
                let mut lt = tesseract.acquire().await?;
                let lock = tesseract.clone();

                let text = tokio::task::spawn_blocking(move || {
                    let text = lt
                        .set_image_from_mem(&bytes)
                        .map_err(|e| PiiScanError::Extraction(format!("Failed to set image: {e}")))
                        .and_then(|()| {
                            lt.get_utf8_text().map_err(|e| {
                                PiiScanError::Extraction(format!("Failed to extract text: {e}"))
                            })
                        });
                    drop(lt);
                    lock.release();
                    text
                })
                .await
                .map_err(|e| PiiScanError::Extraction(format!("OCR task panicked: {e}")))??;

                Ok(text.trim().to_string())
            }
            OcrBackend::Api { client } => client.ocr(image_bytes).await,
            OcrBackend::Unavailable { reason } => {
                Err(PiiScanError::OcrUnavailable(reason.clone()))
            }
        }
    }
}

#[async_trait]
impl TextExtractor for OcrProvider {
    async fn extract_image(&self, image: &DynamicImage) -> Result<String> {
        if let OcrBackend::Unavailable { reason } = &self.backend {
            return Err(PiiScanError::OcrUnavailable(reason.clone()));
        }

        let image = image.clone();
        let max_dimension = self.config.max_image_dimension;
        let png = tokio::task::spawn_blocking(move || {
            encode_png(&prepare_for_ocr(&image, max_dimension))
        })
        .await
        .map_err(|e| PiiScanError::Extraction(format!("Preprocessing task panicked: {e}")))??;

        self.ocr(&png).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_config(model: &str, api_key: Option<&str>) -> OcrConfig {
        OcrConfig {
            model: model.to_string(),
            api_key: api_key.map(String::from),
            ..OcrConfig::default()
        }
    }

    fn unavailable_provider() -> OcrProvider {
        OcrProvider {
            backend: OcrBackend::Unavailable {
                reason: "Test unavailable".to_string(),
            },
            config: make_config("local/tesseract", None),
        }
    }

    #[tokio::test]
    async fn test_engine_lock_fails_fast_after_abandoned_call() {
        let lock = EngineLock::new(0u32);

        let held = lock.acquire().await.unwrap();
        lock.abandon();
        let err = lock.acquire().await.unwrap_err();
        assert!(matches!(err, PiiScanError::Extraction(_)));

        drop(held);
        lock.release();
        let mut engine = lock.acquire().await.unwrap();
        *engine += 1;
    }

    #[tokio::test]
    async fn test_engine_lock_free_after_abandoned_call_finished() {
        let lock = EngineLock::new(());
        lock.abandon();
        assert!(lock.acquire().await.is_ok());
    }

    #[test]
    fn test_ocr_provider_graceful_degradation() {
        let result = OcrProvider::new(&make_config("local/tesseract", None));
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_ocr_unavailable_returns_error() {
        let provider = unavailable_provider();
        let result = provider.ocr(&[]).await;
        assert!(matches!(result, Err(PiiScanError::OcrUnavailable(_))));
    }

    #[tokio::test]
    async fn test_extract_image_unavailable_returns_error() {
        let provider = unavailable_provider();
        let image = DynamicImage::new_rgb8(10, 10);
        let result = provider.extract_image(&image).await;
        assert!(matches!(result, Err(PiiScanError::OcrUnavailable(_))));
    }

    #[tokio::test]
    async fn test_extract_path_reports_decode_before_engine() {
        let provider = unavailable_provider();
        let result = provider
            .extract_path(std::path::Path::new("/no/such/image.png"))
            .await;
        assert!(matches!(result, Err(PiiScanError::Decode(_))));
    }

    #[test]
    fn test_api_model_without_key_falls_back_to_unavailable() {
        for model in ["mistral/pixtral-12b", "deepseek/deepseek-vl", "openai/gpt-4o"] {
            let provider = OcrProvider::new(&make_config(model, None)).unwrap();
            assert!(!provider.is_available(), "{model} should be unavailable");
            assert!(provider.unavailable_reason().unwrap().contains("API key"));
        }
    }

    #[test]
    fn test_api_backed_provider_clone() {
        let provider = OcrProvider::new(&make_config("openai/gpt-4o", Some("k"))).unwrap();
        let cloned = provider.clone();
        assert!(provider.is_available());
        assert_eq!(provider.is_available(), cloned.is_available());
    }

    #[tokio::test]
    async fn test_extract_image_through_api_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "John Doe" } }]
            })))
            .mount(&server)
            .await;

        let mut config = make_config("openai/gpt-4o", Some("test-key"));
        config.base_url = Some(server.uri());
        let provider = OcrProvider::new(&config).unwrap();

        let text = provider
            .extract_image(&DynamicImage::new_rgb8(64, 32))
            .await
            .unwrap();
        assert_eq!(text, "John Doe");
    }
}
