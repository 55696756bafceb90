//! Gemini implementation of the provider trait.
//!
//! Primary extraction provider, called over the generativelanguage REST API
//! with inline base64 image parts.

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::security::SecretString;
use crate::traits::provider::{LlmProvider, ProviderResponse};
use crate::types::page::PageImage;

const PROVIDER_NAME: &str = "gemini";

/// Gemini vision extraction client.
#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    /// Create a client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: SecretString::new(api_key),
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }

    /// Create from the `GOOGLE_API_KEY` environment variable.
    pub fn from_env() -> crate::error::Result<Self> {
        let api_key = std::env::var("GOOGLE_API_KEY")
            .map_err(|_| crate::error::ExtractionError::Config("GOOGLE_API_KEY not set".into()))?;
        Ok(Self::new(api_key))
    }

    /// Set the model (default: gemini-2.5-flash).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set a custom base URL (for proxies, test servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn extract(
        &self,
        prompt: &str,
        pages: &[PageImage],
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut parts: Vec<Part> = pages
            .iter()
            .map(|page| Part::InlineData {
                inline_data: InlineData {
                    mime_type: page.mime_type().to_string(),
                    data: base64::engine::general_purpose::STANDARD.encode(&page.bytes),
                },
            })
            .collect();
        parts.push(Part::Text {
            text: prompt.to_string(),
        });

        let request = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                max_output_tokens: 4096,
            },
        };

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", self.api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Http {
                provider: PROVIDER_NAME.to_string(),
                source: Box::new(e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                provider: PROVIDER_NAME.to_string(),
                message: format!("{status}: {body}"),
            });
        }

        let parsed: GenerateResponse =
            response.json().await.map_err(|e| ProviderError::Http {
                provider: PROVIDER_NAME.to_string(),
                source: Box::new(e),
            })?;

        let content: String = parsed
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: PROVIDER_NAME.to_string(),
            });
        }

        let mut result = ProviderResponse::new(content);
        result.tokens_used = parsed
            .usage_metadata
            .and_then(|usage| usage.total_token_count);
        Ok(result)
    }
}

// Request/Response types

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct UsageMetadata {
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_model_and_base_url() {
        let provider = GeminiProvider::new("test-key")
            .with_model("gemini-2.0-flash")
            .with_base_url("http://localhost:8080");

        assert_eq!(provider.model(), "gemini-2.0-flash");
        assert_eq!(provider.base_url, "http://localhost:8080");
        assert_eq!(provider.name(), "gemini");
    }
}
