use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{parse_provider_model, OcrConfig};
use crate::error::{PiiScanError, Result};

const OCR_PROMPT: &str = "Extract all text from this image. Return only the extracted text without any explanations or formatting.";

/// Hosted vision models reachable through an OpenAI-compatible chat API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisionProvider {
    OpenAi,
    Mistral,
    DeepSeek,
}

impl VisionProvider {
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix.to_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "mistral" => Some(Self::Mistral),
            "deepseek" => Some(Self::DeepSeek),
            _ => None,
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Mistral => "https://api.mistral.ai/v1",
            Self::DeepSeek => "https://api.deepseek.com/v1",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o",
            Self::Mistral => "pixtral-12b-2409",
            Self::DeepSeek => "deepseek-vl",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI Vision",
            Self::Mistral => "Mistral",
            Self::DeepSeek => "DeepSeek",
        }
    }
}

#[derive(Clone, Debug)]
pub struct VisionOcrClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_retries: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

impl VisionOcrClient {
    pub fn new(provider: VisionProvider, config: &OcrConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            PiiScanError::Extraction(format!("API key required for {}", provider.label()))
        })?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| provider.default_base_url().to_string());

        let (_, model) = parse_provider_model(&config.model);
        let model = if model.is_empty() {
            provider.default_model().to_string()
        } else {
            model.to_string()
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PiiScanError::Extraction(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            max_retries: 3,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send PNG bytes to the vision model and return its transcription.
    pub async fn ocr(&self, png_bytes: &[u8]) -> Result<String> {
        let data_url = format!("data:image/png;base64,{}", STANDARD.encode(png_bytes));

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        text: OCR_PROMPT.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_url },
                    },
                ],
            }],
            max_tokens: 4096,
        };

        let text = self.make_request(&request).await?;
        Ok(text.trim().to_string())
    }

    async fn make_request(&self, request: &ChatRequest) -> Result<String> {
        let mut retries = 0;

        loop {
            let response = self
                .client
                .post(format!("{}/chat/completions", self.base_url))
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(request)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    if resp.status().is_success() {
                        let chat_response: ChatResponse = resp.json().await.map_err(|e| {
                            PiiScanError::Extraction(format!("Failed to parse response: {e}"))
                        })?;

                        return chat_response
                            .choices
                            .into_iter()
                            .next()
                            .map(|c| c.message.content.unwrap_or_default())
                            .ok_or_else(|| {
                                PiiScanError::Extraction("No response from API".to_string())
                            });
                    } else if resp.status().as_u16() == 429 || resp.status().is_server_error() {
                        retries += 1;
                        if retries >= self.max_retries {
                            return Err(PiiScanError::Extraction(format!(
                                "API request failed after {} retries: {}",
                                self.max_retries,
                                resp.status()
                            )));
                        }
                        let delay = Duration::from_millis(100 * (2_u64.pow(retries)));
                        tracing::debug!(retries, ?delay, "Vision OCR API busy, retrying");
                        tokio::time::sleep(delay).await;
                    } else {
                        let status = resp.status();
                        let body = resp.text().await.unwrap_or_default();
                        return Err(PiiScanError::Extraction(format!(
                            "API request failed: {status} - {body}"
                        )));
                    }
                }
                Err(e) => {
                    retries += 1;
                    if retries >= self.max_retries {
                        return Err(PiiScanError::Extraction(format!(
                            "API request failed after {} retries: {e}",
                            self.max_retries
                        )));
                    }
                    let delay = Duration::from_millis(100 * (2_u64.pow(retries)));
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config(model: &str) -> OcrConfig {
        OcrConfig {
            model: model.to_string(),
            ..OcrConfig::default()
        }
    }

    fn completion_body(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "choices": [
                {
                    "index": 0,
                    "message": { "role": "assistant", "content": content },
                    "finish_reason": "stop"
                }
            ]
        })
    }

    #[test]
    fn test_client_requires_api_key() {
        let config = create_test_config("openai/gpt-4o");
        let result = VisionOcrClient::new(VisionProvider::OpenAi, &config);
        assert!(result.unwrap_err().to_string().contains("API key required"));
    }

    #[test]
    fn test_default_base_urls() {
        let mut config = create_test_config("mistral/");
        config.api_key = Some("test-key".to_string());

        let mistral = VisionOcrClient::new(VisionProvider::Mistral, &config).unwrap();
        assert!(mistral.base_url.contains("mistral"));
        assert_eq!(mistral.model(), "pixtral-12b-2409");

        let deepseek = VisionOcrClient::new(VisionProvider::DeepSeek, &config).unwrap();
        assert!(deepseek.base_url.contains("deepseek"));
    }

    #[test]
    fn test_model_taken_from_config() {
        let mut config = create_test_config("openai/gpt-4o-mini");
        config.api_key = Some("test-key".to_string());
        config.base_url = Some("https://proxy.internal/v1/".to_string());

        let client = VisionOcrClient::new(VisionProvider::OpenAi, &config).unwrap();
        assert_eq!(client.model(), "gpt-4o-mini");
        assert_eq!(client.base_url, "https://proxy.internal/v1");
    }

    #[test]
    fn test_provider_prefixes() {
        assert_eq!(
            VisionProvider::from_prefix("OpenAI"),
            Some(VisionProvider::OpenAi)
        );
        assert_eq!(VisionProvider::from_prefix("local"), None);
    }

    #[tokio::test]
    async fn test_ocr_returns_trimmed_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion_body("  Jane Roe\n")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut config = create_test_config("openai/gpt-4o");
        config.api_key = Some("test-key".to_string());
        config.base_url = Some(server.uri());

        let client = VisionOcrClient::new(VisionProvider::OpenAi, &config).unwrap();
        let text = client.ocr(&[0x89, 0x50, 0x4E, 0x47]).await.unwrap();
        assert_eq!(text, "Jane Roe");
    }

    #[tokio::test]
    async fn test_ocr_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad image"))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = create_test_config("openai/gpt-4o");
        config.api_key = Some("test-key".to_string());
        config.base_url = Some(server.uri());

        let client = VisionOcrClient::new(VisionProvider::OpenAi, &config).unwrap();
        let err = client.ocr(&[1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, PiiScanError::Extraction(_)));
        assert!(err.to_string().contains("bad image"));
    }

    #[tokio::test]
    async fn test_ocr_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let mut config = create_test_config("openai/gpt-4o");
        config.api_key = Some("test-key".to_string());
        config.base_url = Some(server.uri());

        let client = VisionOcrClient::new(VisionProvider::OpenAi, &config).unwrap();
        let err = client.ocr(&[1, 2, 3]).await.unwrap_err();
        assert!(err.to_string().contains("after 3 retries"));
    }
}
