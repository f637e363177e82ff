//! # Prompt Reconciler
//!
//! Sends a `Prompt` to the `LLM` it references and stores the response.
//!
//! A prompt is called once per generation. Success is memoized in status as
//! `Done=True` for the observed generation. A failed call is recorded as
//! `Done=False` and retried after the medium interval.

use super::{instrumented, observe_llm_request, Context};
use crate::constants::BASE_FINALIZER;
use crate::controller::lifecycle;
use crate::controller::requeue::{resolve, Directive, ReconcilerError};
use crate::crd::condition::reasons;
use crate::crd::{Condition, ConditionStatus, ConditionType, Conditioned, Llm, Prompt, Provider};
use crate::llms::LlmError;
use crate::store::retry::update_status_with_retry;
use crate::store::{ObjectStore, StoreError};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// kube-runtime entry point
pub async fn reconcile<S: ObjectStore>(
    obj: Arc<Prompt>,
    ctx: Arc<Context<S>>,
) -> Result<Action, ReconcilerError> {
    let namespace = obj.namespace().unwrap_or_default();
    let name = obj.name_any();
    instrumented("Prompt", &namespace, &name, reconcile_prompt(&ctx, &namespace, &name)).await
}

/// One pass over the `Prompt` stored at `namespace/name`.
pub async fn reconcile_prompt<S: ObjectStore>(
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
    let Some(prompt) = ctx.store.get_opt::<Prompt>(namespace, name).await? else {
        debug!("Prompt no longer exists");
        return Ok(Some(Directive::Done));
    };

    let retries = ctx.config.status_update_retries;
    if let Some(directive) = lifecycle::advance(&ctx.store, &prompt, BASE_FINALIZER, retries).await? {
        return Ok(Some(directive));
    }

    if prompt.is_processed() {
        debug!(generation = ?prompt.metadata.generation, "Prompt already processed");
        return Ok(Some(Directive::Done));
    }

    let generation = prompt.metadata.generation;
    match call(ctx, &prompt).await {
        Ok(data) => {
            info!(bytes = data.len(), "Prompt finished");
            persist_outcome(ctx, namespace, name, generation, Ok(&data)).await?;
            Ok(Some(Directive::Done))
        }
        Err(e) => {
            let message = e.condition_message();
            warn!(error = %message, "Prompt failed");
            if let Err(persist) =
                persist_outcome(ctx, namespace, name, generation, Err(&message)).await
            {
                error!(error = %persist, "Failed to persist error condition");
            }
            Err(e.with_requeue(ctx.config.requeue.medium))
        }
    }
}

/// Resolve the referenced `LLM` and send the prompt's parameters to it.
async fn call<S: ObjectStore>(ctx: &Context<S>, prompt: &Prompt) -> Result<Vec<u8>, ReconcilerError> {
    let llm_ref = prompt
        .spec
        .llm
        .as_ref()
        .filter(|r| !r.name.is_empty())
        .ok_or_else(|| ReconcilerError::Configuration("no llm configuration provider".to_string()))?;

    let namespace = prompt.namespace().unwrap_or_default();
    let llm: Llm = ctx.store.get(&namespace, &llm_ref.name).await?;

    let Provider::ThirdParty(endpoint) = llm.spec.provider.resolve()? else {
        return Err(ReconcilerError::Configuration(format!(
            "llm {} has no endpoint to send prompts to",
            llm_ref.name
        )));
    };

    let api_key = endpoint.auth_api_key(&ctx.store, &namespace).await?;
    let client = ctx
        .clients
        .client(llm.llm_type()?, &api_key, endpoint.base_url())?;

    let payload = prompt
        .spec
        .openai_params
        .clone()
        .unwrap_or_default()
        .marshal()
        .map_err(LlmError::InvalidPayload)?;

    let response = observe_llm_request("call", client.call(&payload)).await?;
    Ok(response.to_bytes())
}

/// Record the call's outcome for `generation`.
///
/// Data from an earlier successful call is kept when the call failed. A
/// failure already recorded for the same generation is not written again.
async fn persist_outcome<S: ObjectStore>(
    ctx: &Context<S>,
    namespace: &str,
    name: &str,
    generation: Option<i64>,
    outcome: Result<&[u8], &str>,
) -> Result<(), StoreError> {
    update_status_with_retry(
        &ctx.store,
        namespace,
        name,
        ctx.config.status_update_retries,
        |prompt: &mut Prompt| {
            let status = prompt.status.get_or_insert_with(Default::default);
            let done = match outcome {
                Ok(data) => {
                    status.set_data(data);
                    Condition::new(
                        ConditionType::Done,
                        ConditionStatus::True,
                        reasons::RECONCILE_SUCCESS,
                        "Finished",
                    )
                }
                Err(message) => {
                    let current = status.get_condition(ConditionType::Done);
                    if current.status == ConditionStatus::False
                        && current.reason == reasons::RECONCILE_ERROR
                        && current.message == message
                        && status.observed_generation == generation
                    {
                        return false;
                    }
                    Condition::new(
                        ConditionType::Done,
                        ConditionStatus::False,
                        reasons::RECONCILE_ERROR,
                        message,
                    )
                }
            };
            status.set_condition(done);
            status.observed_generation = generation;
            true
        },
    )
    .await
    .map(|_: Prompt| ())
}
