//! # Reconciler
//!
//! Top-level reconcilers for the `LLM`, `Model` and `Prompt` kinds.
//!
//! Every pass:
//! 1. Re-reads the object from the store (a vanished object is `Done`)
//! 2. Runs the finalizer gate in [`crate::controller::lifecycle`]
//! 3. Runs the kind's domain logic
//! 4. Persists the outcome into the object's status
//!
//! Nothing is remembered between passes except what lives in status. The
//! [`Context`] only carries the store handle, the event sink, the client
//! factory, configuration and the composed sub-reconciler chain.

pub mod llm;
pub mod model;
pub mod prompt;

use crate::config::ControllerConfig;
use crate::controller::requeue::{Directive, ReconcilerError};
use crate::controller::subreconciler::Reconcilers;
use crate::crd::Model;
use crate::events::{EventSink, Recorder};
use crate::llms::LlmClientFactory;
use crate::observability::metrics;
use crate::store::ObjectStore;
use kube::Resource;
use kube_runtime::controller::Action;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

pub use llm::reconcile_llm;
pub use model::reconcile_model;
pub use prompt::reconcile_prompt;

/// Shared, read-only state handed to every reconcile pass
pub struct Context<S: ObjectStore> {
    pub store: S,
    pub events: Arc<dyn EventSink>,
    pub clients: Arc<dyn LlmClientFactory>,
    pub config: ControllerConfig,
    model_chain: Reconcilers<Model, S>,
}

impl<S: ObjectStore> std::fmt::Debug for Context<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("model_chain", &self.model_chain)
            .finish_non_exhaustive()
    }
}

impl<S: ObjectStore> Context<S> {
    pub fn new(
        store: S,
        events: Arc<dyn EventSink>,
        clients: Arc<dyn LlmClientFactory>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            events,
            clients,
            config,
            model_chain: model::image_store_chain::<S>(),
        }
    }

    pub fn recorder<K: Resource<DynamicType = ()>>(&self, obj: &K) -> Recorder<'_> {
        Recorder::new(self.events.as_ref(), obj)
    }

    pub fn model_chain(&self) -> &Reconcilers<Model, S> {
        &self.model_chain
    }
}

/// Run one pass inside a `reconcile` span and record its metrics.
pub(crate) async fn instrumented<F>(
    kind: &'static str,
    namespace: &str,
    name: &str,
    pass: F,
) -> Result<Action, ReconcilerError>
where
    F: Future<Output = Result<Directive, ReconcilerError>>,
{
    let span = tracing::info_span!(
        "reconcile",
        resource.kind = kind,
        resource.name = name,
        resource.namespace = namespace,
    );

    async move {
        let start = Instant::now();
        metrics::increment_reconciliations(kind);
        let result = pass.await;
        metrics::observe_reconciliation_duration(kind, start.elapsed().as_secs_f64());

        let directive = result?;
        if directive != Directive::Done {
            metrics::increment_requeues_total(directive.reason());
        }
        Ok(directive.into())
    }
    .instrument(span)
    .await
}

/// Await one provider request, recording its count, failures and latency.
pub(crate) async fn observe_llm_request<T, E, F>(operation: &'static str, request: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    metrics::increment_llm_requests(operation);
    let result = request.await;
    metrics::observe_llm_request_duration(operation, start.elapsed().as_secs_f64());
    if result.is_err() {
        metrics::increment_llm_request_errors(operation);
    }
    result
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::events::MemoryEventSink;
    use crate::llms::{CallOption, Llm, LlmError, LlmType, Response};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::fmt;

    #[derive(Debug)]
    pub(crate) struct EchoResponse(pub String);

    impl fmt::Display for EchoResponse {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl Response for EchoResponse {
        fn llm_type(&self) -> LlmType {
            LlmType::OpenAi
        }

        fn to_bytes(&self) -> Vec<u8> {
            self.0.as_bytes().to_vec()
        }

        fn unmarshal(&mut self, bytes: &[u8]) -> Result<(), LlmError> {
            self.0 = String::from_utf8_lossy(bytes).into_owned();
            Ok(())
        }
    }

    /// Answers every request with `ok <model>` or `ok <payload>`.
    pub(crate) struct EchoLlm;

    #[async_trait]
    impl Llm for EchoLlm {
        fn llm_type(&self) -> LlmType {
            LlmType::OpenAi
        }

        async fn call(&self, payload: &[u8]) -> Result<Box<dyn Response>, LlmError> {
            Ok(Box::new(EchoResponse(format!(
                "ok {}",
                String::from_utf8_lossy(payload)
            ))))
        }

        async fn validate(&self, options: &[CallOption]) -> Result<Box<dyn Response>, LlmError> {
            let model = options
                .iter()
                .find_map(|o| match o {
                    CallOption::Model(m) => Some(m.as_str()),
                    _ => None,
                })
                .unwrap_or_default();
            Ok(Box::new(EchoResponse(format!("ok {model}"))))
        }
    }

    pub(crate) struct EchoClients;

    impl LlmClientFactory for EchoClients {
        fn client(
            &self,
            llm_type: LlmType,
            api_key: &str,
            _base_url: &str,
        ) -> Result<Arc<dyn Llm>, LlmError> {
            if api_key.is_empty() {
                return Err(LlmError::EmptyApiKey);
            }
            match llm_type {
                LlmType::OpenAi => Ok(Arc::new(EchoLlm)),
                other => Err(LlmError::UnsupportedType(other.to_string())),
            }
        }
    }

    pub(crate) fn test_context() -> (Context<MemoryStore>, MemoryStore, Arc<MemoryEventSink>) {
        let store = MemoryStore::new();
        let sink = Arc::new(MemoryEventSink::new());
        let ctx = Context::new(
            store.clone(),
            sink.clone(),
            Arc::new(EchoClients),
            ControllerConfig::default(),
        );
        (ctx, store, sink)
    }

    #[test]
    fn context_composes_the_image_store_chain() {
        let (ctx, _, _) = test_context();
        assert_eq!(
            ctx.model_chain().kinds(),
            vec!["PersistentVolumeClaim", "StatefulSet", "Service", "Readiness"]
        );
    }

    #[tokio::test]
    async fn instrumented_translates_directives() {
        let action = instrumented("LLM", "ns1", "llm-a", async { Ok(Directive::Done) })
            .await
            .unwrap();
        assert_eq!(action, Action::await_change());

        let err = instrumented("LLM", "ns1", "llm-a", async {
            Err(ReconcilerError::NotReady("waiting".to_string()))
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "waiting");
    }
}
