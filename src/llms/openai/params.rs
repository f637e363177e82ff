//! Request parameters carried by a `Prompt` for OpenAI-compatible providers.

use crate::llms::DEFAULT_OPENAI_MODEL;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Assistant,
}

/// One turn of the conversation
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize, JsonSchema)]
pub struct PromptMessage {
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub content: String,
}

/// Parameters of one prompt call
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct ModelParams {
    /// Invocation method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Model used for this call
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Conversation sent to the model
    #[serde(default)]
    pub prompt: Vec<PromptMessage>,
    /// Task id of an asynchronous invocation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub incremental: bool,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            method: Some("invoke".to_string()),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            temperature: Some(0.8),
            top_p: Some(0.7),
            prompt: Vec::new(),
            task_id: None,
            incremental: false,
        }
    }
}

impl ModelParams {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            prompt: vec![PromptMessage {
                role: Role::User,
                content: content.into(),
            }],
            ..Self::default()
        }
    }

    pub fn marshal(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn unmarshal(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub(crate) fn model_or_default(&self) -> &str {
        if self.model.is_empty() {
            DEFAULT_OPENAI_MODEL
        } else {
            &self.model
        }
    }
}
