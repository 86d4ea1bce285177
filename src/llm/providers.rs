use super::{ChatMessage, ChatOptions, LLMConfig, LLMError, LLMProvider, LLMResponse, LLM};
use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
    usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionUsage {
    total_tokens: u32,
}

/// Map transport failures onto the timeout / connectivity split
fn classify_transport_error(error: reqwest::Error) -> LLMError {
    if error.is_timeout() {
        LLMError::Timeout
    } else if error.is_connect() {
        LLMError::Connection(error.to_string())
    } else {
        LLMError::Http(error)
    }
}

fn build_client(timeout_seconds: u64) -> Result<reqwest::Client, LLMError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()?)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Send an OpenAI-style chat completion and pull out the first choice
async fn send_chat_completion(
    request: RequestBuilder,
    body: &ChatCompletionRequest<'_>,
    provider: &str,
) -> Result<LLMResponse, LLMError> {
    let response = request
        .json(body)
        .send()
        .await
        .map_err(classify_transport_error)?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        return Err(LLMError::Api { status, body: text });
    }

    let completion: ChatCompletionResponse = response.json().await.map_err(classify_transport_error)?;

    let content = completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| LLMError::ResponseError(format!("No response from {}", provider)))?;

    Ok(LLMResponse {
        content,
        tokens_used: completion.usage.map(|u| u.total_tokens),
    })
}

/// Azure OpenAI provider implementation
pub struct AzureOpenAIProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

impl AzureOpenAIProvider {
    pub fn new(config: LLMConfig) -> Result<Self, LLMError> {
        if non_empty(&config.endpoint).is_none()
            || non_empty(&config.api_key).is_none()
            || non_empty(&config.api_version).is_none()
            || config.model.trim().is_empty()
        {
            return Err(LLMError::CredentialsMissing(LLMProvider::AzureOpenAI));
        }

        let client = build_client(config.timeout_seconds)?;
        Ok(Self { config, client })
    }

    fn deployment_url(&self) -> String {
        let endpoint = non_empty(&self.config.endpoint).unwrap_or_default().trim_end_matches('/');
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint,
            self.config.model,
            non_empty(&self.config.api_version).unwrap_or_default()
        )
    }
}

#[async_trait]
impl LLM for AzureOpenAIProvider {
    async fn chat(&self, messages: Vec<ChatMessage>, options: ChatOptions) -> Result<LLMResponse, LLMError> {
        let api_key = non_empty(&self.config.api_key)
            .ok_or(LLMError::CredentialsMissing(LLMProvider::AzureOpenAI))?;

        let request = ChatCompletionRequest {
            model: Some(&self.config.model),
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
        };

        let url = self.deployment_url();
        debug!("Sending request to Azure OpenAI deployment {}", self.config.model);

        let builder = self.client.post(&url).header("api-key", api_key);
        send_chat_completion(builder, &request, "Azure OpenAI").await
    }

    async fn is_available(&self) -> bool {
        non_empty(&self.config.endpoint).is_some() && non_empty(&self.config.api_key).is_some()
    }

    fn provider_type(&self) -> LLMProvider {
        LLMProvider::AzureOpenAI
    }
}

/// OpenAI provider implementation
pub struct OpenAIProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: LLMConfig) -> Result<Self, LLMError> {
        if non_empty(&config.api_key).is_none() {
            return Err(LLMError::CredentialsMissing(LLMProvider::OpenAI));
        }

        let client = build_client(config.timeout_seconds)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl LLM for OpenAIProvider {
    async fn chat(&self, messages: Vec<ChatMessage>, options: ChatOptions) -> Result<LLMResponse, LLMError> {
        let api_key = non_empty(&self.config.api_key)
            .ok_or(LLMError::CredentialsMissing(LLMProvider::OpenAI))?;

        let request = ChatCompletionRequest {
            model: Some(&self.config.model),
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
        };

        let url = non_empty(&self.config.endpoint).unwrap_or("https://api.openai.com/v1/chat/completions");

        debug!("Sending request to OpenAI API");

        let builder = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key));
        send_chat_completion(builder, &request, "OpenAI").await
    }

    async fn is_available(&self) -> bool {
        let Some(api_key) = non_empty(&self.config.api_key) else {
            return false;
        };

        match self
            .client
            .get("https://api.openai.com/v1/models")
            .header("Authorization", format!("Bearer {}", api_key))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn provider_type(&self) -> LLMProvider {
        LLMProvider::OpenAI
    }
}

/// LMStudio provider implementation (local server, no auth)
pub struct LMStudioProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

impl LMStudioProvider {
    pub fn new(config: LLMConfig) -> Result<Self, LLMError> {
        let client = build_client(config.timeout_seconds)?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> &str {
        non_empty(&self.config.endpoint).unwrap_or("http://localhost:1234/v1/chat/completions")
    }
}

#[async_trait]
impl LLM for LMStudioProvider {
    async fn chat(&self, messages: Vec<ChatMessage>, options: ChatOptions) -> Result<LLMResponse, LLMError> {
        let request = ChatCompletionRequest {
            model: Some(&self.config.model),
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
        };

        let endpoint = self.endpoint();
        debug!("Sending request to LMStudio at {}", endpoint);

        send_chat_completion(self.client.post(endpoint), &request, "LMStudio").await
    }

    async fn is_available(&self) -> bool {
        let models_endpoint = self.endpoint().replace("/chat/completions", "/models");

        match self.client.get(&models_endpoint).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn provider_type(&self) -> LLMProvider {
        LLMProvider::LMStudio
    }
}
