//! # OpenAI
//!
//! Client for the OpenAI chat completions API and compatible gateways.

use crate::llms::{CallOption, Llm, LlmError, LlmType, Response as LlmResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use zeroize::Zeroizing;

mod params;
mod response;

pub use params::{ModelParams, PromptMessage, Role};
pub use response::Response;

pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";

pub const OPENAI_DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Prompt sent by [`Llm::validate`]
const VALIDATION_PROMPT: &str = "Hello";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

/// OpenAI API client
pub struct OpenAi {
    http: reqwest::Client,
    api_key: Zeroizing<String>,
    base_url: String,
}

impl std::fmt::Debug for OpenAi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAi")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl OpenAi {
    /// Client with its own HTTP pool and the default request timeout.
    ///
    /// Fails without any network I/O when `api_key` is empty. An empty
    /// `base_url` means the public OpenAI API.
    pub fn new(api_key: &str, base_url: &str) -> Result<Self, LlmError> {
        if api_key.is_empty() {
            return Err(LlmError::EmptyApiKey);
        }
        let http = reqwest::Client::builder()
            .timeout(OPENAI_DEFAULT_TIMEOUT)
            .build()
            .map_err(LlmError::Client)?;
        Self::with_http_client(http, api_key, base_url)
    }

    pub fn with_http_client(
        http: reqwest::Client,
        api_key: &str,
        base_url: &str,
    ) -> Result<Self, LlmError> {
        if api_key.is_empty() {
            return Err(LlmError::EmptyApiKey);
        }
        let base_url = if base_url.is_empty() {
            OPENAI_API_URL
        } else {
            base_url
        };
        Ok(Self {
            http,
            api_key: Zeroizing::new(api_key.to_string()),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn chat(&self, request: &ChatRequest<'_>) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = request.model, url = %url, "Sending chat completion request");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.as_str())
            .json(request)
            .send()
            .await
            .map_err(|source| LlmError::Http {
                provider: LlmType::OpenAi,
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                provider: LlmType::OpenAi,
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletion = resp.json().await.map_err(|source| LlmError::Http {
            provider: LlmType::OpenAi,
            source,
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse(LlmType::OpenAi))
    }
}

#[async_trait]
impl Llm for OpenAi {
    fn llm_type(&self) -> LlmType {
        LlmType::OpenAi
    }

    async fn call(&self, payload: &[u8]) -> Result<Box<dyn LlmResponse>, LlmError> {
        let params = ModelParams::unmarshal(payload).map_err(LlmError::InvalidPayload)?;
        let request = ChatRequest {
            model: params.model_or_default(),
            messages: params
                .prompt
                .iter()
                .map(|m| ChatMessage {
                    role: m.role,
                    content: &m.content,
                })
                .collect(),
            temperature: params.temperature,
            top_p: params.top_p,
            max_tokens: None,
        };

        let data = self.chat(&request).await?;
        Ok(Box::new(Response::ok(data, "call openai model success")))
    }

    async fn validate(&self, options: &[CallOption]) -> Result<Box<dyn LlmResponse>, LlmError> {
        let mut request = ChatRequest {
            model: crate::llms::DEFAULT_OPENAI_MODEL,
            messages: vec![ChatMessage {
                role: Role::User,
                content: VALIDATION_PROMPT,
            }],
            temperature: None,
            top_p: None,
            max_tokens: None,
        };
        for option in options {
            match option {
                CallOption::Model(model) => request.model = model.as_str(),
                CallOption::Temperature(t) => request.temperature = Some(*t),
                CallOption::MaxTokens(n) => request.max_tokens = Some(*n),
            }
        }

        let data = self.chat(&request).await?;
        Ok(Box::new(Response::ok(data, "")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = rustls::crypto::ring::default_provider().install_default();
    }

    #[test]
    fn empty_key_is_rejected() {
        init();
        assert!(matches!(OpenAi::new("", ""), Err(LlmError::EmptyApiKey)));
    }

    #[test]
    fn empty_base_url_means_public_api() {
        init();
        let client = OpenAi::new("sk-test", "").unwrap();
        assert_eq!(client.base_url(), OPENAI_API_URL);
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        init();
        let client = OpenAi::new("sk-test", "http://localhost:8080/v1/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/v1");
    }

    #[test]
    fn debug_output_redacts_the_key() {
        init();
        let client = OpenAi::new("sk-very-secret", "").unwrap();
        assert!(!format!("{client:?}").contains("sk-very-secret"));
    }

    #[test]
    fn chat_request_skips_unset_knobs() {
        let request = ChatRequest {
            model: "gpt-4o",
            messages: vec![ChatMessage {
                role: Role::User,
                content: "Hello",
            }],
            temperature: None,
            top_p: None,
            max_tokens: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "model": "gpt-4o",
                "messages": [{ "role": "user", "content": "Hello" }]
            })
        );
    }
}
