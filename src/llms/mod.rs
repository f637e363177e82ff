//! # LLM Clients
//!
//! Thin adapters exposing a uniform `call` / `validate` contract over one
//! external provider each.
//!
//! Constructing a client checks its credential synchronously and never touches
//! the network. Responses are self-describing: they know which provider they
//! came from and round-trip through bytes for persistence into status.

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod openai;

/// Provider implementations an `LLM` can name in `spec.type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LlmType {
    OpenAi,
    DeepSeek,
}

impl LlmType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::DeepSeek => "deepseek",
        }
    }

    /// Models validated when an `LLM` does not list its own.
    pub fn default_models(self) -> &'static [&'static str] {
        match self {
            Self::OpenAi => OPENAI_MODELS,
            Self::DeepSeek => &[],
        }
    }
}

impl fmt::Display for LlmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmType {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Self::OpenAi),
            "deepseek" => Ok(Self::DeepSeek),
            other => Err(LlmError::UnsupportedType(other.to_string())),
        }
    }
}

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

pub const OPENAI_MODELS: &[&str] = &["gpt-3.5-turbo", "gpt-4", "gpt-4o", "gpt-4o-mini"];

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API key cannot be empty")]
    EmptyApiKey,
    #[error("unsupported llm type: {0}")]
    UnsupportedType(String),
    #[error("invalid request payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(#[source] serde_json::Error),
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {provider} failed: {source}")]
    Http {
        provider: LlmType,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} returned HTTP {status}: {body}")]
    Api {
        provider: LlmType,
        status: u16,
        body: String,
    },
    #[error("{0} returned no choices")]
    EmptyResponse(LlmType),
}

impl LlmError {
    /// Errors that will not go away without editing the object's spec
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::EmptyApiKey | Self::UnsupportedType(_) | Self::InvalidPayload(_)
        )
    }
}

/// Per-call knobs accepted by [`Llm::validate`]
#[derive(Debug, Clone, PartialEq)]
pub enum CallOption {
    Model(String),
    Temperature(f32),
    MaxTokens(u32),
}

impl CallOption {
    pub fn model(name: impl Into<String>) -> Self {
        Self::Model(name.into())
    }
}

/// Response from a provider, persisted into status as bytes
pub trait Response: fmt::Display + fmt::Debug + Send + Sync {
    fn llm_type(&self) -> LlmType;

    fn to_bytes(&self) -> Vec<u8>;

    fn unmarshal(&mut self, bytes: &[u8]) -> Result<(), LlmError>;
}

/// Uniform contract over one provider
#[async_trait]
pub trait Llm: Send + Sync {
    fn llm_type(&self) -> LlmType;

    /// One provider request carrying a serialized, provider-specific payload.
    async fn call(&self, payload: &[u8]) -> Result<Box<dyn Response>, LlmError>;

    /// Minimal probe confirming reachability and credential validity.
    async fn validate(&self, options: &[CallOption]) -> Result<Box<dyn Response>, LlmError>;
}

/// Builds a client for the provider type named on an object
pub trait LlmClientFactory: Send + Sync {
    fn client(
        &self,
        llm_type: LlmType,
        api_key: &str,
        base_url: &str,
    ) -> Result<Arc<dyn Llm>, LlmError>;
}

/// Production factory sharing one HTTP connection pool across clients
#[derive(Debug, Clone)]
pub struct ProviderClients {
    http: reqwest::Client,
}

impl ProviderClients {
    pub fn new(timeout: Duration) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(LlmError::Client)?;
        Ok(Self { http })
    }
}

impl LlmClientFactory for ProviderClients {
    fn client(
        &self,
        llm_type: LlmType,
        api_key: &str,
        base_url: &str,
    ) -> Result<Arc<dyn Llm>, LlmError> {
        match llm_type {
            LlmType::OpenAi => Ok(Arc::new(openai::OpenAi::with_http_client(
                self.http.clone(),
                api_key,
                base_url,
            )?)),
            other => Err(LlmError::UnsupportedType(other.to_string())),
        }
    }
}
