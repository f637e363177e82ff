//! # Error Policy
//!
//! Requeue decisions for failed reconcile passes.
//!
//! The failure has already been written to the object's status by the
//! reconciler. This layer only logs it, counts it and schedules the retry
//! using the delay the error carries.

use crate::controller::reconciler::Context;
use crate::controller::requeue::ReconcilerError;
use crate::observability::metrics;
use crate::store::ObjectStore;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Requeue label for a failed pass
pub fn requeue_reason(error: &ReconcilerError) -> &'static str {
    if error.is_configuration() {
        "configuration-error"
    } else {
        "error-backoff"
    }
}

pub fn handle_reconciliation_error<K, S>(
    obj: Arc<K>,
    error: &ReconcilerError,
    ctx: Arc<Context<S>>,
) -> Action
where
    K: Resource<DynamicType = ()>,
    S: ObjectStore,
{
    let kind = K::kind(&());
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "reconciliation_error",
        resource.kind = %kind,
        resource.name = %name,
        resource.namespace = %namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    if error.is_configuration() {
        warn!("Reconciliation blocked on configuration: {}", error);
    } else {
        error!("Reconciliation error: {:?}", error);
    }
    metrics::increment_reconciliation_errors(&kind);

    let after = error.requeue_after(&ctx.config.requeue);
    info!(retry_in_secs = after.as_secs(), "Scheduling retry");
    metrics::increment_requeues_total(requeue_reason(error));
    Action::requeue(after)
}
