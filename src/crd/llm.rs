//! # LLM
//!
//! An LLM served by an external provider or an in-cluster worker.
//!
//! ```yaml
//! apiVersion: base.fleezesd.io/v1alpha1
//! kind: LLM
//! metadata:
//!   name: llm-a
//!   namespace: default
//! spec:
//!   type: openai
//!   endpoint:
//!     url: https://api.openai.com/v1
//!     authSecret:
//!       kind: Secret
//!       name: openai-credentials
//!   models:
//!     - gpt-4o-mini
//! ```

use super::condition::{Condition, Conditioned};
use super::provider::ProviderSpec;
use crate::llms::{LlmError, LlmType};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "base.fleezesd.io",
    version = "v1alpha1",
    kind = "LLM",
    root = "Llm",
    namespaced,
    status = "LlmStatus",
    shortname = "llm",
    printcolumn = r#"{"name":"Type", "type":"string", "jsonPath":".spec.type"}, {"name":"Provider", "type":"string", "jsonPath":".metadata.labels.base\\.fleezesd\\.io/provider"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct LlmSpec {
    /// Provider implementation (`openai`, `deepseek`)
    #[serde(default)]
    pub r#type: String,
    /// Where the LLM is served from
    #[serde(flatten)]
    pub provider: ProviderSpec,
    /// Models to validate; defaults to the provider's well-known models
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LlmStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Conditioned for LlmStatus {
    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.conditions
    }
}

impl Llm {
    pub fn llm_type(&self) -> Result<LlmType, LlmError> {
        self.spec.r#type.parse()
    }

    /// Models to validate: the listed ones, else the type's defaults.
    pub fn third_party_models(&self) -> Vec<String> {
        if !self.spec.models.is_empty() {
            return self.spec.models.clone();
        }
        self.llm_type()
            .map(|t| t.default_models().iter().map(ToString::to_string).collect())
            .unwrap_or_default()
    }
}
