//! # Model
//!
//! A model served from the namespace's shared Ollama image store.
//!
//! ```yaml
//! apiVersion: llm.fleezesd.io/v1alpha1
//! kind: Model
//! metadata:
//!   name: model-x
//!   namespace: ns1
//! spec:
//!   image: llama3
//!   persistentVolume:
//!     accessMode: ReadWriteMany
//! ```

use super::condition::{Condition, ConditionType, Conditioned};
use k8s_openapi::api::core::v1::{
    EnvFromSource, EnvVar, LocalObjectReference, ResourceRequirements,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "llm.fleezesd.io",
    version = "v1alpha1",
    kind = "Model",
    namespaced,
    status = "ModelStatus",
    printcolumn = r#"{"name":"Model", "type":"string", "jsonPath":".spec.image"}, {"name":"Status", "type":"string", "jsonPath":".status.conditions[0].type"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    /// Desired pods; defaults to 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// Model image name
    #[serde(default)]
    pub image: String,
    /// One of Always, Never, IfNotPresent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_pull_secrets: Vec<LocalObjectReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    /// StorageClass for the image store claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume: Option<ModelPersistentVolumeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_class: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_env_from: Vec<EnvFromSource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_env: Vec<EnvVar>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelPersistentVolumeSpec {
    /// ReadWriteOnce, ReadOnlyMany, ReadWriteMany or ReadWriteOncePod
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatus {
    #[serde(default)]
    pub replicas: i32,
    #[serde(default)]
    pub ready_replicas: i32,
    #[serde(default)]
    pub available_replicas: i32,
    #[serde(default)]
    pub unavailable_replicas: i32,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Conditioned for ModelStatus {
    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.conditions
    }
}

impl Model {
    pub fn is_available(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.has_condition(ConditionType::Available))
    }

    pub fn is_progressing(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.has_condition(ConditionType::Progressing))
    }

    pub fn access_mode(&self) -> Option<&str> {
        self.spec
            .persistent_volume
            .as_ref()
            .and_then(|pv| pv.access_mode.as_deref())
            .filter(|m| !m.is_empty())
    }
}
