pub mod providers;
pub mod prompts;
pub mod vision;
pub mod summary;
pub mod evaluation;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// LLM provider types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum LLMProvider {
    AzureOpenAI,
    OpenAI,
    LMStudio,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    /// Resource endpoint (Azure) or full chat-completions URL (LMStudio)
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    /// Azure `api-version` query parameter
    pub api_version: Option<String>,
    /// Model name, or deployment name for Azure
    pub model: String,
    pub timeout_seconds: u64,
    /// Prompt template overrides
    #[serde(default)]
    pub prompts: prompts::PromptConfig,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::AzureOpenAI,
            endpoint: None,
            api_key: None,
            api_version: Some("2024-02-15-preview".to_string()),
            model: "gpt-4o".to_string(),
            timeout_seconds: 30,
            prompts: prompts::PromptConfig::default(),
        }
    }
}

/// Sampling parameters sent with a single chat request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: Option<f32>,
}

impl ChatOptions {
    /// Per-frame image analysis
    pub const FRAME_ANALYSIS: ChatOptions = ChatOptions {
        max_tokens: 2048,
        temperature: 0.1,
        top_p: Some(1.0),
    };

    /// Whole-video summary
    pub const SUMMARY: ChatOptions = ChatOptions {
        max_tokens: 512,
        temperature: 0.3,
        top_p: Some(1.0),
    };

    /// Summary self-evaluation
    pub const EVALUATION: ChatOptions = ChatOptions {
        max_tokens: 300,
        temperature: 0.2,
        top_p: None,
    };
}

/// One part of a multimodal user message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

/// Message body: plain text, or interleaved text and image parts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Concatenated text of the message, ignoring image parts
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn has_image(&self) -> bool {
        matches!(self, MessageContent::Parts(parts)
            if parts.iter().any(|p| matches!(p, ContentPart::ImageUrl { .. })))
    }
}

/// Chat message for LLM communication
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn user_with_image(text: impl Into<String>, image_data_url: String) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: image_data_url },
                },
            ]),
        }
    }
}

/// LLM response
#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: String,
    pub tokens_used: Option<u32>,
}

/// Error types for LLM operations
#[derive(thiserror::Error, Debug)]
pub enum LLMError {
    #[error("{0:?} API credentials are missing")]
    CredentialsMissing(LLMProvider),

    #[error("Request timed out")]
    Timeout,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("LLM response error: {0}")]
    ResponseError(String),
}

impl LLMError {
    /// Short type name used in skip messages and logs
    pub fn type_name(&self) -> &'static str {
        match self {
            LLMError::CredentialsMissing(_) => "CredentialsMissing",
            LLMError::Timeout => "Timeout",
            LLMError::Connection(_) => "ConnectionError",
            LLMError::Http(_) => "HttpError",
            LLMError::Json(_) => "JsonError",
            LLMError::Api { .. } => "ApiError",
            LLMError::ResponseError(_) => "ResponseError",
        }
    }
}

/// Trait for LLM providers
#[async_trait]
pub trait LLM: Send + Sync {
    async fn chat(&self, messages: Vec<ChatMessage>, options: ChatOptions) -> Result<LLMResponse, LLMError>;
    async fn is_available(&self) -> bool;
    fn provider_type(&self) -> LLMProvider;
}

/// Create LLM instance based on configuration
pub fn create_llm(config: &LLMConfig) -> Result<Arc<dyn LLM>, LLMError> {
    match config.provider {
        LLMProvider::AzureOpenAI => Ok(Arc::new(providers::AzureOpenAIProvider::new(config.clone())?)),
        LLMProvider::OpenAI => Ok(Arc::new(providers::OpenAIProvider::new(config.clone())?)),
        LLMProvider::LMStudio => Ok(Arc::new(providers::LMStudioProvider::new(config.clone())?)),
    }
}
