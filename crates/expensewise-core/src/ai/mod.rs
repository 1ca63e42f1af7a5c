//! Pluggable LLM provider abstraction
//!
//! # Architecture
//!
//! - `ChatBackend` trait: one tool-aware chat round trip
//! - `LlmClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backends: `OllamaBackend` (local and cloud), `OpenAIBackend`,
//!   `AnthropicBackend`, `MockBackend`
//! - `ChatAgent`: the tool-calling loop on top of any client
//!
//! # Usage
//!
//! ```rust,ignore
//! let settings = ClientSettings::new(Provider::Ollama);
//! let client = LlmClient::from_settings(&settings, &config)?;
//! let completion = client.complete(system, &turns, &tool_definitions()).await?;
//! ```

pub mod agent;
pub mod anthropic;
mod mock;
pub mod ollama;
pub mod openai;
pub mod parsing;
pub mod types;

pub use agent::{
    new_message_id, system_prompt, AgentEvent, AgentRun, ChatAgent, ToolCallRecord,
};
pub use anthropic::AnthropicBackend;
pub use mock::{MockBackend, MockRequest};
pub use ollama::OllamaBackend;
pub use openai::OpenAIBackend;
pub use types::*;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::AppConfig;
use crate::error::{Error, Result};

/// Trait implemented by every provider backend
///
/// Backends should be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send the system prompt, conversation and tool catalog; return the
    /// model's text and any tool calls it requested
    async fn complete(&self, system: &str, turns: &[Turn], tools: &[Tool]) -> Result<Completion>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Per-request provider selection, as supplied by a client
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub provider: Provider,
    pub model: Option<String>,
    pub api_key: Option<String>,
    /// Local Ollama URL override
    pub ollama_base_url: Option<String>,
}

impl ClientSettings {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            model: None,
            api_key: None,
            ollama_base_url: None,
        }
    }

    fn model_or(&self, default: &str) -> String {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(default)
            .to_string()
    }

    fn require_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config(format!("API key required for provider {}", self.provider)))
    }
}

/// Concrete LLM client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum LlmClient {
    Ollama(OllamaBackend),
    OpenAI(OpenAIBackend),
    Anthropic(AnthropicBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl LlmClient {
    /// Build a client for the requested provider
    ///
    /// Fails when a hosted provider is selected without an API key.
    pub fn from_settings(settings: &ClientSettings, config: &AppConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.providers.timeout())
            .build()?;

        let client = match settings.provider {
            Provider::Ollama => {
                let host = settings
                    .ollama_base_url
                    .as_deref()
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .unwrap_or(&config.ollama.host);
                LlmClient::Ollama(OllamaBackend::new(
                    http_client,
                    host,
                    &settings.model_or(&config.ollama.model),
                ))
            }
            Provider::OllamaCloud => LlmClient::Ollama(OllamaBackend::cloud(
                http_client,
                &config.ollama.cloud_url,
                settings.require_key()?,
                &settings.model_or(&config.ollama.model),
            )),
            Provider::OpenAI => LlmClient::OpenAI(OpenAIBackend::new(
                http_client,
                &config.providers.openai_url,
                settings.require_key()?,
                &settings.model_or(&config.providers.openai_model),
            )),
            Provider::Anthropic => LlmClient::Anthropic(AnthropicBackend::new(
                http_client,
                &config.providers.anthropic_url,
                settings.require_key()?,
                &settings.model_or(&config.providers.anthropic_model),
            )),
        };

        tracing::debug!(
            provider = %settings.provider,
            model = client.model(),
            host = client.host(),
            "Created LLM client"
        );
        Ok(client)
    }

    /// Create a mock client for testing
    pub fn mock(backend: MockBackend) -> Self {
        LlmClient::Mock(backend)
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        match self {
            LlmClient::Ollama(b) => LlmClient::Ollama(b.with_model(model)),
            LlmClient::OpenAI(b) => LlmClient::OpenAI(b.with_model(model)),
            LlmClient::Anthropic(b) => LlmClient::Anthropic(b.with_model(model)),
            LlmClient::Mock(b) => LlmClient::Mock(b.clone()),
        }
    }
}

// Implement ChatBackend for LlmClient by delegating to the inner backend
#[async_trait]
impl ChatBackend for LlmClient {
    async fn complete(&self, system: &str, turns: &[Turn], tools: &[Tool]) -> Result<Completion> {
        match self {
            LlmClient::Ollama(b) => b.complete(system, turns, tools).await,
            LlmClient::OpenAI(b) => b.complete(system, turns, tools).await,
            LlmClient::Anthropic(b) => b.complete(system, turns, tools).await,
            LlmClient::Mock(b) => b.complete(system, turns, tools).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            LlmClient::Ollama(b) => b.health_check().await,
            LlmClient::OpenAI(b) => b.health_check().await,
            LlmClient::Anthropic(b) => b.health_check().await,
            LlmClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            LlmClient::Ollama(b) => b.model(),
            LlmClient::OpenAI(b) => b.model(),
            LlmClient::Anthropic(b) => b.model(),
            LlmClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            LlmClient::Ollama(b) => b.host(),
            LlmClient::OpenAI(b) => b.host(),
            LlmClient::Anthropic(b) => b.host(),
            LlmClient::Mock(b) => b.host(),
        }
    }
}
