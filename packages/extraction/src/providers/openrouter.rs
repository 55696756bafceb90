//! OpenRouter implementation of the provider trait.
//!
//! Fallback provider using the OpenAI-compatible chat completions API with
//! data-URI image parts.

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::security::SecretString;
use crate::traits::provider::{LlmProvider, ProviderResponse};
use crate::types::page::PageImage;

const PROVIDER_NAME: &str = "openrouter";

/// OpenRouter chat-completions client.
#[derive(Clone)]
pub struct OpenRouterProvider {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl OpenRouterProvider {
    /// Create a client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: SecretString::new(api_key),
            model: "anthropic/claude-3.5-sonnet".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
        }
    }

    /// Create from the `OPENROUTER_API_KEY` environment variable.
    pub fn from_env() -> crate::error::Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY").map_err(|_| {
            crate::error::ExtractionError::Config("OPENROUTER_API_KEY not set".into())
        })?;
        Ok(Self::new(api_key))
    }

    /// Set the model (default: anthropic/claude-3.5-sonnet).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn extract(
        &self,
        prompt: &str,
        pages: &[PageImage],
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut content: Vec<ContentPart> = pages
            .iter()
            .map(|page| {
                let encoded = base64::engine::general_purpose::STANDARD.encode(&page.bytes);
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:{};base64,{encoded}", page.mime_type()),
                    },
                }
            })
            .collect();
        content.push(ContentPart::Text {
            text: prompt.to_string(),
        });

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content,
            }],
            temperature: 0.1,
            max_tokens: 4096,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose()),
            )
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

        let parsed: ChatResponse = response.json().await.map_err(|e| ProviderError::Http {
            provider: PROVIDER_NAME.to_string(),
            source: Box::new(e),
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: PROVIDER_NAME.to_string(),
            });
        }

        let mut result = ProviderResponse::new(content);
        result.tokens_used = parsed.usage.and_then(|usage| usage.total_tokens);
        Ok(result)
    }
}

// Request/Response types

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
    #[serde(rename = "text")]
    Text { text: String },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: Option<u32>,
}
