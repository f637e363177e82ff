//! # Worker
//!
//! An in-cluster inference worker. Workers are managed elsewhere; the operator
//! only reads their `Ready` condition when an `LLM` points at one.

use super::condition::{reasons, Condition, ConditionStatus, ConditionType, Conditioned};
use k8s_openapi::api::core::v1::TypedObjectReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "base.fleezesd.io",
    version = "v1alpha1",
    kind = "Worker",
    namespaced,
    status = "WorkerStatus",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSpec {
    /// Model served by this worker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<TypedObjectReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Conditioned for WorkerStatus {
    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.conditions
    }
}

impl WorkerStatus {
    pub fn is_ready(&self) -> bool {
        self.get_condition(ConditionType::Ready).is_true()
    }

    pub fn is_offline(&self) -> bool {
        let ready = self.get_condition(ConditionType::Ready);
        ready.r#type == ConditionType::Ready
            && ready.status == ConditionStatus::False
            && ready.reason == reasons::OFFLINE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_conditions_is_neither_ready_nor_offline() {
        let status = WorkerStatus::default();
        assert!(!status.is_ready());
        assert!(!status.is_offline());
    }

    #[test]
    fn offline_is_ready_false_with_offline_reason() {
        let mut status = WorkerStatus::default();
        status.set_condition(Condition::new(
            ConditionType::Ready,
            ConditionStatus::False,
            reasons::OFFLINE,
            "node drained",
        ));
        assert!(status.is_offline());
        assert!(!status.is_ready());
    }
}
