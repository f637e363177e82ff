use crate::llms::{LlmError, LlmType, Response as LlmResponse};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Envelope persisted into `Prompt.status.data`
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct Response {
    pub code: u16,
    pub data: String,
    pub msg: String,
    pub success: bool,
}

impl Response {
    pub fn ok(data: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            code: 200,
            data: data.into(),
            msg: msg.into(),
            success: true,
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}

impl LlmResponse for Response {
    fn llm_type(&self) -> LlmType {
        LlmType::OpenAi
    }

    fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    fn unmarshal(&mut self, bytes: &[u8]) -> Result<(), LlmError> {
        *self = serde_json::from_slice(bytes).map_err(LlmError::InvalidResponse)?;
        Ok(())
    }
}
