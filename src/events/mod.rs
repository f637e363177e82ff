//! # Events
//!
//! Kubernetes Event emission for the reconcilers.
//!
//! Events are fire-and-forget: a failed publish is logged and never breaks
//! reconciliation. The sink is passed explicitly to every component that
//! emits, bound to the object it reports on through [`Recorder`].

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, Recorder as KubeRecorder, Reporter};
use kube::{Client, Resource};
use std::sync::{Arc, Mutex};
use tracing::warn;

pub use kube::runtime::events::EventType;

/// Event reasons emitted by the operator
pub mod reasons {
    pub const PROVISIONED_IMAGE_STORAGE_PVC: &str = "ProvisionedImageStoragePVC";
    pub const PROVISIONED_IMAGE_STORE_STATEFUL_SET: &str = "ProvisionedImageStoreStatefulSet";
    pub const PROVISIONED_IMAGE_STORE_SERVICE: &str = "ProvisionedImageStoreService";
    pub const WAITING_FOR_IMAGE_STORE_STATEFUL_SET: &str = "WaitingForImageStoreStatefulSet";
    pub const WAITING_FOR_IMAGE_STORE_SERVICE: &str = "WaitingForImageStoreService";
    pub const MODEL_PROGRESSING: &str = "ModelProgressing";
    pub const MODEL_AVAILABLE: &str = "ModelAvailable";
}

/// Sink accepting `(type, reason, message)` tuples about an object
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, subject: &ObjectReference, type_: EventType, reason: &str, message: &str);
}

/// Publishes through `kube::runtime::events::Recorder`
pub struct KubeEventSink {
    recorder: KubeRecorder,
}

impl std::fmt::Debug for KubeEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEventSink").finish_non_exhaustive()
    }
}

impl KubeEventSink {
    /// `controller_name` appears as the reporting component on each Event.
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: KubeRecorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventSink for KubeEventSink {
    async fn emit(&self, subject: &ObjectReference, type_: EventType, reason: &str, message: &str) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note: Some(message.to_string()),
            action: "Reconcile".to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, subject).await {
            warn!(
                reason,
                object = subject.name.as_deref().unwrap_or("unknown"),
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}

/// One captured event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub subject: String,
    pub normal: bool,
    pub reason: String,
    pub message: String,
}

/// Collects events in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryEventSink {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }
}

#[async_trait]
impl EventSink for MemoryEventSink {
    async fn emit(&self, subject: &ObjectReference, type_: EventType, reason: &str, message: &str) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(RecordedEvent {
                subject: subject.name.clone().unwrap_or_default(),
                normal: matches!(type_, EventType::Normal),
                reason: reason.to_string(),
                message: message.to_string(),
            });
    }
}

/// An [`EventSink`] bound to the object the events are about
pub struct Recorder<'a> {
    sink: &'a dyn EventSink,
    subject: ObjectReference,
}

impl std::fmt::Debug for Recorder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("subject", &self.subject.name)
            .finish_non_exhaustive()
    }
}

impl<'a> Recorder<'a> {
    pub fn new<K: Resource<DynamicType = ()>>(sink: &'a dyn EventSink, obj: &K) -> Self {
        Self {
            sink,
            subject: obj.object_ref(&()),
        }
    }

    pub async fn normal(&self, reason: &str, message: &str) {
        self.sink
            .emit(&self.subject, EventType::Normal, reason, message)
            .await;
    }

    pub async fn warning(&self, reason: &str, message: &str) {
        self.sink
            .emit(&self.subject, EventType::Warning, reason, message)
            .await;
    }
}
