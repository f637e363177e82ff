//! # Prompt
//!
//! A one-shot prompt sent to an `LLM` in the same namespace. The provider's
//! response is stored base64-encoded in `status.data`.

use super::condition::{Condition, ConditionType, Conditioned};
use crate::llms::openai::ModelParams;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use k8s_openapi::api::core::v1::TypedObjectReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "base.fleezesd.io",
    version = "v1alpha1",
    kind = "Prompt",
    namespaced,
    status = "PromptStatus",
    printcolumn = r#"{"name":"LLM", "type":"string", "jsonPath":".spec.llm.name"}, {"name":"Done", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Done\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PromptSpec {
    /// The `LLM` to call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<TypedObjectReference>,
    /// Parameters for OpenAI-compatible providers
    #[serde(default, rename = "openAIParams", skip_serializing_if = "Option::is_none")]
    pub openai_params: Option<ModelParams>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PromptStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Generation the `Done` condition was computed for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// Provider response, base64-encoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl Conditioned for PromptStatus {
    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.conditions
    }
}

impl PromptStatus {
    pub fn set_data(&mut self, bytes: &[u8]) {
        self.data = Some(BASE64.encode(bytes));
    }

    pub fn data_bytes(&self) -> Option<Vec<u8>> {
        self.data.as_deref().and_then(|d| BASE64.decode(d).ok())
    }
}

impl Prompt {
    /// Whether a successful `Done` condition already covers the current spec.
    ///
    /// A failed call keeps `Done=False` and is retried.
    pub fn is_processed(&self) -> bool {
        self.status.as_ref().is_some_and(|s| {
            s.get_condition(ConditionType::Done).is_true()
                && s.observed_generation.is_some()
                && s.observed_generation == self.metadata.generation
        })
    }
}
