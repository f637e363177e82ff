//! # Custom Resource Definitions
//!
//! CRD types managed by the operator.
//!
//! ## Module Structure
//!
//! - `llm.rs` - `LLM`: an external or in-cluster language model
//! - `model.rs` - `Model`: a model served from the shared image store
//! - `prompt.rs` - `Prompt`: a one-shot request against an `LLM`
//! - `worker.rs` - `Worker`: in-cluster inference worker (read-only here)
//! - `provider.rs` - Provider descriptor shared by `LLM`
//! - `condition.rs` - Condition history shared by every status

pub mod condition;
mod llm;
mod model;
mod prompt;
mod provider;
mod worker;

pub use condition::{Condition, ConditionStatus, ConditionType, Conditioned};
pub use llm::{Llm, LlmSpec, LlmStatus};
pub use model::{Model, ModelPersistentVolumeSpec, ModelSpec, ModelStatus};
pub use prompt::{Prompt, PromptSpec, PromptStatus};
pub use provider::{AuthError, Endpoint, Provider, ProviderError, ProviderSpec, ProviderType};
pub use worker::{Worker, WorkerSpec, WorkerStatus};

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::CustomResourceExt;

/// Every CRD the operator serves, in install order.
pub fn all_crds() -> Vec<CustomResourceDefinition> {
    vec![Llm::crd(), Model::crd(), Prompt::crd(), Worker::crd()]
}

/// Render CRDs as one multi-document YAML stream.
pub fn to_yaml(crds: &[CustomResourceDefinition]) -> Result<String, serde_yaml::Error> {
    let docs = crds
        .iter()
        .map(serde_yaml::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(docs.join("---\n"))
}
