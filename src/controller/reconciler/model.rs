//! # Model Reconciler
//!
//! Provisions the namespace's shared image store for a `Model` and reports
//! its availability.
//!
//! ## Flow
//!
//! 1. A model with neither `Available` nor `Progressing` is marked
//!    `Progressing` once and re-checked after the short interval
//! 2. The image-store chain runs: claim, StatefulSet, Service, readiness
//! 3. Once the StatefulSet and Service are ready the model becomes
//!    `Available` with the StatefulSet's replica counts
//!
//! Deleting a model only drops its finalizer. The image store is shared by
//! every model in the namespace and stays.

use super::{instrumented, Context};
use crate::constants::MODEL_FINALIZER;
use crate::controller::lifecycle;
use crate::controller::provisioning::{
    ensure_image_store_pvc, ensure_image_store_service, ensure_image_store_stateful_set,
    get_image_store_stateful_set, is_image_store_service_ready, is_image_store_stateful_set_ready,
    ImageStoreSpec,
};
use crate::controller::requeue::{resolve, Directive, ReconcilerError};
use crate::controller::subreconciler::{Reconcilers, SubReconciler};
use crate::crd::condition::reasons;
use crate::crd::{Condition, ConditionStatus, ConditionType, Conditioned, Model, ModelStatus};
use crate::events::reasons as event_reasons;
use crate::store::retry::update_status_with_retry;
use crate::store::{ObjectStore, StoreError};
use futures::future::BoxFuture;
use futures::FutureExt;
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const READINESS_STEP: &str = "Readiness";

/// `[PVC, StatefulSet, Service, Readiness]`
pub fn image_store_chain<S: ObjectStore>() -> Reconcilers<Model, S> {
    Reconcilers::new(vec![
        SubReconciler::pvc(reconcile_pvc::<S>),
        SubReconciler::stateful_set(reconcile_stateful_set::<S>),
        SubReconciler::service(reconcile_service::<S>),
        SubReconciler::step(READINESS_STEP, reconcile_readiness::<S>),
    ])
}

/// kube-runtime entry point
pub async fn reconcile<S: ObjectStore>(
    obj: Arc<Model>,
    ctx: Arc<Context<S>>,
) -> Result<Action, ReconcilerError> {
    let namespace = obj.namespace().unwrap_or_default();
    let name = obj.name_any();
    instrumented("Model", &namespace, &name, reconcile_model(&ctx, &namespace, &name)).await
}

/// One pass over the `Model` stored at `namespace/name`.
pub async fn reconcile_model<S: ObjectStore>(
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
    let Some(model) = ctx.store.get_opt::<Model>(namespace, name).await? else {
        debug!("Model no longer exists");
        return Ok(Some(Directive::Done));
    };

    let retries = ctx.config.status_update_retries;
    if let Some(directive) = lifecycle::advance(&ctx.store, &model, MODEL_FINALIZER, retries).await? {
        return Ok(Some(directive));
    }

    if !model.is_available() && !model.is_progressing() {
        set_progressing(ctx, namespace, name).await?;
        ctx.recorder(&model)
            .normal(event_reasons::MODEL_PROGRESSING, "Provisioning image store")
            .await;
        return Err(ReconcilerError::RequeueAfter(ctx.config.requeue.short));
    }

    match ctx.model_chain().reconcile(ctx, namespace, name, &model).await {
        Ok(()) => Ok(None),
        Err(ReconcilerError::RequeueAfter(after)) => Err(ReconcilerError::RequeueAfter(after)),
        Err(e) => {
            let message = e.condition_message();
            warn!(error = %message, "Image store reconciliation failed");
            if let Err(persist) = record_failure(ctx, namespace, name, &message).await {
                error!(error = %persist, "Failed to persist error condition");
            }
            Err(e.with_requeue(ctx.config.requeue.medium))
        }
    }
}

async fn set_progressing<S: ObjectStore>(
    ctx: &Context<S>,
    namespace: &str,
    name: &str,
) -> Result<(), StoreError> {
    update_status_with_retry(
        &ctx.store,
        namespace,
        name,
        ctx.config.status_update_retries,
        |model: &mut Model| {
            let status = model.status.get_or_insert_with(ModelStatus::default);
            if status.has_condition(ConditionType::Progressing) {
                return false;
            }
            status.set_condition(Condition::new(
                ConditionType::Progressing,
                ConditionStatus::True,
                reasons::IMAGE_STORE_PROVISIONING,
                "Provisioning image store",
            ));
            true
        },
    )
    .await
    .map(|_: Model| ())
}

async fn record_failure<S: ObjectStore>(
    ctx: &Context<S>,
    namespace: &str,
    name: &str,
    message: &str,
) -> Result<(), StoreError> {
    update_status_with_retry(
        &ctx.store,
        namespace,
        name,
        ctx.config.status_update_retries,
        |model: &mut Model| {
            let status = model.status.get_or_insert_with(ModelStatus::default);
            let current = status.get_condition(ConditionType::ReplicaFailure);
            if current.is_true() && current.message == message {
                return false;
            }
            status.set_condition(Condition::new(
                ConditionType::ReplicaFailure,
                ConditionStatus::True,
                reasons::RECONCILE_ERROR,
                message,
            ));
            true
        },
    )
    .await
    .map(|_: Model| ())
}

fn reconcile_pvc<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    namespace: &'a str,
    _name: &'a str,
    model: &'a Model,
) -> BoxFuture<'a, Result<(), ReconcilerError>> {
    async move {
        let spec = ImageStoreSpec::for_model(model, &ctx.config);
        ensure_image_store_pvc(&ctx.store, &ctx.recorder(model), namespace, &spec).await?;
        Ok(())
    }
    .boxed()
}

fn reconcile_stateful_set<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    namespace: &'a str,
    _name: &'a str,
    model: &'a Model,
) -> BoxFuture<'a, Result<(), ReconcilerError>> {
    async move {
        let spec = ImageStoreSpec::for_model(model, &ctx.config);
        ensure_image_store_stateful_set(&ctx.store, &ctx.recorder(model), namespace, &spec).await?;
        Ok(())
    }
    .boxed()
}

fn reconcile_service<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    namespace: &'a str,
    _name: &'a str,
    model: &'a Model,
) -> BoxFuture<'a, Result<(), ReconcilerError>> {
    async move {
        let sts = get_image_store_stateful_set(&ctx.store, namespace)
            .await?
            .ok_or_else(|| ReconcilerError::NotReady("image store StatefulSet is missing".to_string()))?;
        ensure_image_store_service(&ctx.store, &ctx.recorder(model), namespace, &sts).await?;
        Ok(())
    }
    .boxed()
}

/// Wait for the image store, then publish availability and replica counts.
fn reconcile_readiness<'a, S: ObjectStore>(
    ctx: &'a Context<S>,
    namespace: &'a str,
    name: &'a str,
    model: &'a Model,
) -> BoxFuture<'a, Result<(), ReconcilerError>> {
    async move {
        let recorder = ctx.recorder(model);
        if !is_image_store_stateful_set_ready(&ctx.store, &recorder, namespace).await?
            || !is_image_store_service_ready(&ctx.store, &recorder, namespace).await?
        {
            return Err(ReconcilerError::RequeueAfter(ctx.config.requeue.short));
        }

        let sts = get_image_store_stateful_set(&ctx.store, namespace)
            .await?
            .ok_or_else(|| ReconcilerError::NotReady("image store StatefulSet is missing".to_string()))?;

        let was_available = model.is_available();
        mark_available(ctx, namespace, name, &sts).await?;
        if !was_available {
            info!("Model is available");
            recorder
                .normal(event_reasons::MODEL_AVAILABLE, "Image store is ready")
                .await;
        }
        Ok(())
    }
    .boxed()
}

fn replica_counts(sts: &StatefulSet) -> (i32, i32, i32, i32) {
    let desired = sts.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    let status = sts.status.clone().unwrap_or_default();
    let available = status.available_replicas.unwrap_or(0);
    (
        status.replicas,
        status.ready_replicas.unwrap_or(0),
        available,
        (desired - available).max(0),
    )
}

async fn mark_available<S: ObjectStore>(
    ctx: &Context<S>,
    namespace: &str,
    name: &str,
    sts: &StatefulSet,
) -> Result<(), StoreError> {
    let (replicas, ready, available, unavailable) = replica_counts(sts);
    update_status_with_retry(
        &ctx.store,
        namespace,
        name,
        ctx.config.status_update_retries,
        |model: &mut Model| {
            let status = model.status.get_or_insert_with(ModelStatus::default);
            let before = status.clone();

            status.replicas = replicas;
            status.ready_replicas = ready;
            status.available_replicas = available;
            status.unavailable_replicas = unavailable;

            let current = status.get_condition(ConditionType::Available);
            if !current.is_true() || current.reason != reasons::NEW_REPLICA_SET_AVAILABLE {
                status.set_condition(Condition::new(
                    ConditionType::Available,
                    ConditionStatus::True,
                    reasons::NEW_REPLICA_SET_AVAILABLE,
                    "Image store is ready",
                ));
            }
            if status.get_condition(ConditionType::ReplicaFailure).is_true() {
                status.set_condition(Condition::new(
                    ConditionType::ReplicaFailure,
                    ConditionStatus::False,
                    reasons::RECONCILE_SUCCESS,
                    "",
                ));
            }
            *status != before
        },
    )
    .await
    .map(|_: Model| ())
}
