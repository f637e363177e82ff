//! # LLM Reconciler
//!
//! Keeps the provider label current and checks that the configured provider
//! is usable.
//!
//! - Third-party endpoints are probed with one cheap `validate` request per
//!   model using the API key from the referenced Secret.
//! - Worker providers are ready when the referenced `Worker` reports `Ready`.
//!
//! The result lands in the `Ready` condition. Success re-checks after the long
//! interval, failure after the medium one.

use super::{instrumented, observe_llm_request, Context};
use crate::constants::{BASE_FINALIZER, PROVIDER_LABEL};
use crate::controller::lifecycle;
use crate::controller::requeue::{resolve, Directive, ReconcilerError};
use crate::crd::condition::{compute_error_condition, compute_ready_condition};
use crate::crd::{Condition, ConditionType, Conditioned, Endpoint, Llm, Provider, Worker};
use crate::llms::CallOption;
use crate::store::retry::{update_status_with_retry, update_with_retry};
use crate::store::{ObjectStore, StoreError};
use chrono::Utc;
use k8s_openapi::api::core::v1::TypedObjectReference;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// kube-runtime entry point
pub async fn reconcile<S: ObjectStore>(
    obj: Arc<Llm>,
    ctx: Arc<Context<S>>,
) -> Result<Action, ReconcilerError> {
    let namespace = obj.namespace().unwrap_or_default();
    let name = obj.name_any();
    instrumented("LLM", &namespace, &name, reconcile_llm(&ctx, &namespace, &name)).await
}

/// One pass over the `LLM` stored at `namespace/name`.
pub async fn reconcile_llm<S: ObjectStore>(
    ctx: &Context<S>,
    namespace: &str,
    name: &str,
) -> Result<Directive, ReconcilerError> {
    resolve(pass(ctx, namespace, name).await, &ctx.config.requeue)
}

async fn pass<S: ObjectStore>(
    ctx: &Context<S>,
    namespace: &str,
    name: &str,
) -> Result<Option<Directive>, ReconcilerError> {
    let Some(llm) = ctx.store.get_opt::<Llm>(namespace, name).await? else {
        debug!("LLM no longer exists");
        return Ok(Some(Directive::Done));
    };

    let retries = ctx.config.status_update_retries;
    if let Some(directive) = lifecycle::advance(&ctx.store, &llm, BASE_FINALIZER, retries).await? {
        return Ok(Some(directive));
    }

    if normalize_provider_label(ctx, &llm).await? {
        return Ok(Some(Directive::RequeueImmediate));
    }

    match check(ctx, &llm).await {
        Ok(message) => {
            info!("LLM is ready");
            let now = Utc::now();
            persist_ready(ctx, namespace, name, |current| {
                compute_ready_condition(current, &message, now)
            })
            .await?;
            Ok(None)
        }
        Err(e) => {
            let message = e.condition_message();
            warn!(error = %message, configuration = e.is_configuration(), "LLM check failed");
            let now = Utc::now();
            if let Err(persist) = persist_ready(ctx, namespace, name, |current| {
                compute_error_condition(current, &message, now)
            })
            .await
            {
                error!(error = %persist, "Failed to persist error condition");
            }
            Err(e.with_requeue(ctx.config.requeue.medium))
        }
    }
}

/// Write the provider label when it differs. Returns whether it was written.
async fn normalize_provider_label<S: ObjectStore>(
    ctx: &Context<S>,
    llm: &Llm,
) -> Result<bool, StoreError> {
    let provider_type = llm.spec.provider.provider_type().as_str();
    if llm.labels().get(PROVIDER_LABEL).map(String::as_str) == Some(provider_type) {
        return Ok(false);
    }

    let namespace = llm.namespace().unwrap_or_default();
    update_with_retry(
        &ctx.store,
        &namespace,
        &llm.name_any(),
        ctx.config.status_update_retries,
        |obj: &mut Llm| {
            let labels = obj.labels_mut();
            if labels.get(PROVIDER_LABEL).map(String::as_str) == Some(provider_type) {
                return false;
            }
            labels.insert(PROVIDER_LABEL.to_string(), provider_type.to_string());
            true
        },
    )
    .await?;
    info!(provider = provider_type, "Updated provider label");
    Ok(true)
}

async fn check<S: ObjectStore>(ctx: &Context<S>, llm: &Llm) -> Result<String, ReconcilerError> {
    match llm.spec.provider.resolve()? {
        Provider::ThirdParty(endpoint) => check_third_party(ctx, llm, endpoint).await,
        Provider::Worker(worker) => check_worker(ctx, llm, worker).await,
    }
}

async fn check_third_party<S: ObjectStore>(
    ctx: &Context<S>,
    llm: &Llm,
    endpoint: &Endpoint,
) -> Result<String, ReconcilerError> {
    let namespace = llm.namespace().unwrap_or_default();
    let api_key = endpoint.auth_api_key(&ctx.store, &namespace).await?;

    let llm_type = llm.llm_type()?;
    let models = llm.third_party_models();
    if models.is_empty() {
        return Err(ReconcilerError::Configuration(format!(
            "no models provided for llm type {llm_type}"
        )));
    }

    let client = ctx.clients.client(llm_type, &api_key, endpoint.base_url())?;
    let mut messages = Vec::with_capacity(models.len());
    for model in &models {
        debug!(model, "Validating model");
        let res = observe_llm_request("validate", client.validate(&[CallOption::model(model)])).await?;
        messages.push(res.to_string());
    }
    Ok(messages.join("\n"))
}

async fn check_worker<S: ObjectStore>(
    ctx: &Context<S>,
    llm: &Llm,
    worker_ref: &TypedObjectReference,
) -> Result<String, ReconcilerError> {
    let namespace = llm.namespace().unwrap_or_default();
    let worker = ctx
        .store
        .get_opt::<Worker>(&namespace, &worker_ref.name)
        .await?
        .ok_or_else(|| ReconcilerError::NotReady(format!("worker {} not found", worker_ref.name)))?;

    let status = worker.status.unwrap_or_default();
    if status.is_offline() {
        return Err(ReconcilerError::NotReady("worker is offline".to_string()));
    }
    if !status.is_ready() {
        return Err(ReconcilerError::NotReady("worker is not ready".to_string()));
    }
    Ok("worker is ready".to_string())
}

/// Replace the `Ready` condition, skipping the write when nothing changed.
async fn persist_ready<S, F>(
    ctx: &Context<S>,
    namespace: &str,
    name: &str,
    compute: F,
) -> Result<(), StoreError>
where
    S: ObjectStore,
    F: Fn(&Condition) -> Condition + Send + Sync,
{
    update_status_with_retry(
        &ctx.store,
        namespace,
        name,
        ctx.config.status_update_retries,
        |llm: &mut Llm| {
            let status = llm.status.get_or_insert_with(Default::default);
            let current = status.get_condition(ConditionType::Ready);
            let next = compute(&current);
            if next == current {
                return false;
            }
            status.set_condition(next);
            true
        },
    )
    .await
    .map(|_: Llm| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::reconciler::tests::test_context;
    use crate::crd::condition::reasons;
    use crate::crd::{ConditionStatus, LlmSpec, ProviderSpec, WorkerStatus};
    use k8s_openapi::api::core::v1::{Secret, TypedLocalObjectReference};
    use k8s_openapi::ByteString;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    fn endpoint_llm(models: Vec<&str>) -> Llm {
        let mut llm = Llm::new(
            "llm-a",
            LlmSpec {
                r#type: "openai".to_string(),
                provider: ProviderSpec {
                    endpoint: Some(Endpoint {
                        url: "https://api.openai.com/v1".to_string(),
                        internal_url: None,
                        auth_secret: Some(TypedLocalObjectReference {
                            api_group: None,
                            kind: "Secret".to_string(),
                            name: "openai".to_string(),
                        }),
                        insecure: false,
                    }),
                    worker: None,
                },
                models: models.into_iter().map(String::from).collect(),
            },
        );
        llm.metadata.namespace = Some("ns1".to_string());
        llm.metadata.finalizers = Some(vec![BASE_FINALIZER.to_string()]);
        llm.metadata.labels = Some(BTreeMap::from([(
            PROVIDER_LABEL.to_string(),
            "3rdParty".to_string(),
        )]));
        llm
    }

    fn secret(api_key: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some("openai".to_string()),
                namespace: Some("ns1".to_string()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(
                "apiKey".to_string(),
                ByteString(api_key.as_bytes().to_vec()),
            )])),
            ..Default::default()
        }
    }

    fn ready_condition(llm: &Llm) -> Condition {
        llm.status
            .as_ref()
            .map(|s| s.get_condition(ConditionType::Ready))
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn missing_llm_is_done() {
        let (ctx, _, _) = test_context();
        let directive = reconcile_llm(&ctx, "ns1", "ghost").await.unwrap();
        assert_eq!(directive, Directive::Done);
    }

    #[tokio::test]
    async fn validates_every_model_and_records_ready() {
        let (ctx, store, _) = test_context();
        store.insert(&secret("sk-test")).unwrap();
        store.insert(&endpoint_llm(vec!["gpt-4", "gpt-4o"])).unwrap();

        let directive = reconcile_llm(&ctx, "ns1", "llm-a").await.unwrap();
        assert_eq!(directive, Directive::RequeueAfter(ctx.config.requeue.long));

        let stored: Llm = store.get("ns1", "llm-a").await.unwrap();
        let ready = ready_condition(&stored);
        assert_eq!(ready.status, ConditionStatus::True);
        assert_eq!(ready.reason, reasons::AVAILABLE);
        assert_eq!(ready.message, "ok gpt-4\nok gpt-4o");
    }

    #[tokio::test]
    async fn steady_state_pass_does_not_rewrite_status() {
        let (ctx, store, _) = test_context();
        store.insert(&secret("sk-test")).unwrap();
        store.insert(&endpoint_llm(vec!["gpt-4"])).unwrap();

        reconcile_llm(&ctx, "ns1", "llm-a").await.unwrap();
        let first: Llm = store.get("ns1", "llm-a").await.unwrap();
        reconcile_llm(&ctx, "ns1", "llm-a").await.unwrap();
        let second: Llm = store.get("ns1", "llm-a").await.unwrap();
        assert_eq!(first.metadata.resource_version, second.metadata.resource_version);
    }

    #[tokio::test]
    async fn empty_api_key_is_recorded_as_not_ready() {
        let (ctx, store, _) = test_context();
        store.insert(&secret("")).unwrap();
        store.insert(&endpoint_llm(vec![])).unwrap();

        let err = reconcile_llm(&ctx, "ns1", "llm-a").await.unwrap_err();
        assert_eq!(err.requeue_after(&ctx.config.requeue), ctx.config.requeue.medium);

        let stored: Llm = store.get("ns1", "llm-a").await.unwrap();
        let ready = ready_condition(&stored);
        assert_eq!(ready.status, ConditionStatus::False);
        assert_eq!(ready.reason, reasons::AVAILABLE);
        assert_eq!(ready.message, err.condition_message());
    }

    #[tokio::test]
    async fn stale_label_is_rewritten_first() {
        let (ctx, store, _) = test_context();
        let mut llm = endpoint_llm(vec![]);
        llm.metadata.labels = Some(BTreeMap::from([(
            PROVIDER_LABEL.to_string(),
            "worker".to_string(),
        )]));
        store.insert(&llm).unwrap();

        let directive = reconcile_llm(&ctx, "ns1", "llm-a").await.unwrap();
        assert_eq!(directive, Directive::RequeueImmediate);
        let stored: Llm = store.get("ns1", "llm-a").await.unwrap();
        assert_eq!(stored.labels().get(PROVIDER_LABEL).unwrap(), "3rdParty");
        assert!(stored.status.is_none());
    }

    #[tokio::test]
    async fn missing_provider_is_a_configuration_error() {
        let (ctx, store, _) = test_context();
        let mut llm = endpoint_llm(vec![]);
        llm.spec.provider.endpoint = None;
        llm.metadata.labels = Some(BTreeMap::from([(
            PROVIDER_LABEL.to_string(),
            "unknown".to_string(),
        )]));
        store.insert(&llm).unwrap();

        let err = reconcile_llm(&ctx, "ns1", "llm-a").await.unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn offline_worker_is_reported() {
        let (ctx, store, _) = test_context();
        let mut llm = endpoint_llm(vec![]);
        llm.spec.provider.endpoint = None;
        llm.spec.provider.worker = Some(TypedObjectReference {
            api_group: Some("base.fleezesd.io".to_string()),
            kind: "Worker".to_string(),
            name: "w1".to_string(),
            namespace: None,
        });
        llm.metadata.labels = Some(BTreeMap::from([(
            PROVIDER_LABEL.to_string(),
            "worker".to_string(),
        )]));
        store.insert(&llm).unwrap();

        let mut worker = Worker::new("w1", crate::crd::WorkerSpec {
            model: None,
            replicas: Some(1),
        });
        worker.metadata.namespace = Some("ns1".to_string());
        let mut status = WorkerStatus::default();
        status.set_condition(Condition::new(
            ConditionType::Ready,
            ConditionStatus::False,
            reasons::OFFLINE,
            "",
        ));
        worker.status = Some(status);
        store.insert(&worker).unwrap();

        let err = reconcile_llm(&ctx, "ns1", "llm-a").await.unwrap_err();
        assert_eq!(err.condition_message(), "worker is offline");

        store
            .modify("ns1", "w1", |w: &mut Worker| {
                w.status.as_mut().unwrap().set_condition(Condition::new(
                    ConditionType::Ready,
                    ConditionStatus::True,
                    reasons::AVAILABLE,
                    "",
                ));
            })
            .unwrap();
        reconcile_llm(&ctx, "ns1", "llm-a").await.unwrap();
        let stored: Llm = store.get("ns1", "llm-a").await.unwrap();
        assert_eq!(ready_condition(&stored).message, "worker is ready");
    }
}
