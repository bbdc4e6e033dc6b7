//! Generation providers and the ordered fallback chain.
//!
//! Providers are resolved once at process start from the `[[providers]]`
//! configuration list; the list order is the fallback order. Each provider
//! speaks the OpenAI-style `/chat/completions` protocol.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::models::ProviderConfig;
use crate::utils::retry::{RetryConfig, RetryResult, with_retry};

/// A model that turns a prompt into an answer.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Generate a completion for the prompt under the given system context.
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, GenerationError>;
}

/// A successful generation with its provenance.
#[derive(Debug, Clone)]
pub struct Generated {
    pub text: String,
    pub provider: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// OpenAI-compatible chat completion provider.
pub struct HttpGenerationProvider {
    client: reqwest::Client,
    name: String,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    api_key_env: Option<String>,
    max_tokens: u32,
    temperature: f32,
}

impl HttpGenerationProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::ConnectionError(e.to_string()))?;

        let api_key = config
            .api_key_env
            .as_ref()
            .and_then(|env| std::env::var(env).ok());

        Ok(Self {
            client,
            name: config.name.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            api_key_env: config.api_key_env.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Whether the provider's credentials were present at construction.
    /// Providers configured without a key env need none.
    pub fn has_credentials(&self) -> bool {
        self.api_key_env.is_none() || self.api_key.is_some()
    }
}

#[async_trait]
impl GenerationProvider for HttpGenerationProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, system: &str, prompt: &str) -> Result<String, GenerationError> {
        if let (Some(env), None) = (&self.api_key_env, &self.api_key) {
            return Err(GenerationError::MissingApiKey(env.clone()));
        }

        let url = format!("{}/chat/completions", self.endpoint);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout
            } else {
                GenerationError::ConnectionError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(GenerationError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| GenerationError::InvalidResponse("no completion content".to_string()))
    }
}

/// Ordered provider fallback chain.
///
/// Each provider gets one retry with backoff on transient errors before the
/// chain moves on; when every provider has failed (or none is configured)
/// the request terminates with [`GenerationError::NoProviderAvailable`] and
/// no raw provider error ever reaches the caller.
pub struct ProviderChain {
    providers: Vec<Arc<dyn GenerationProvider>>,
    retry: RetryConfig,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn GenerationProvider>>) -> Self {
        Self {
            providers,
            // Two attempts per provider: the call plus one retry
            retry: RetryConfig::new(2),
        }
    }

    pub fn from_configs(configs: &[ProviderConfig]) -> Result<Self, GenerationError> {
        let providers = configs
            .iter()
            .map(|c| {
                HttpGenerationProvider::new(c).map(|p| Arc::new(p) as Arc<dyn GenerationProvider>)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(providers))
    }

    #[cfg(test)]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Run the chain until one provider answers.
    pub async fn generate(&self, system: &str, prompt: &str) -> Result<Generated, GenerationError> {
        if self.providers.is_empty() {
            tracing::warn!("generation requested with no providers configured");
            return Err(GenerationError::NoProviderAvailable);
        }

        for provider in &self.providers {
            let result = with_retry(&self.retry, || provider.generate(system, prompt)).await;
            match result {
                RetryResult::Success(text) => {
                    tracing::debug!(provider = provider.name(), "generation succeeded");
                    return Ok(Generated {
                        text,
                        provider: provider.name().to_string(),
                    });
                }
                RetryResult::Failed {
                    last_error,
                    attempts,
                } => {
                    tracing::warn!(
                        provider = provider.name(),
                        attempts,
                        error = %last_error,
                        "generation provider failed, trying next"
                    );
                }
            }
        }

        Err(GenerationError::NoProviderAvailable)
    }
}
