//! # Sub-Reconciler Chain
//!
//! Ordered, named steps run for one object. The chain stops at the first
//! error and hands it back for translation into a requeue decision.
//!
//! Steps are plain function pointers composed once when the [`Context`] is
//! built. They hold no state; anything worth remembering between passes lives
//! in the object's status.

use crate::controller::reconciler::Context;
use crate::controller::requeue::ReconcilerError;
use crate::store::ObjectStore;
use futures::future::BoxFuture;
use tracing::debug;

/// One step: `(context, namespace, name, object)`
pub type ReconcileHandler<K, S> = for<'a> fn(
    &'a Context<S>,
    &'a str,
    &'a str,
    &'a K,
) -> BoxFuture<'a, Result<(), ReconcilerError>>;

pub struct SubReconciler<K, S: ObjectStore> {
    api_version: &'static str,
    group: &'static str,
    kind: &'static str,
    handler: ReconcileHandler<K, S>,
}

impl<K, S: ObjectStore> std::fmt::Debug for SubReconciler<K, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubReconciler")
            .field("api_version", &self.api_version)
            .field("group", &self.group)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl<K, S: ObjectStore> Clone for SubReconciler<K, S> {
    fn clone(&self) -> Self {
        Self {
            api_version: self.api_version,
            group: self.group,
            kind: self.kind,
            handler: self.handler,
        }
    }
}

impl<K, S: ObjectStore> SubReconciler<K, S> {
    pub fn new(
        api_version: &'static str,
        group: &'static str,
        kind: &'static str,
        handler: ReconcileHandler<K, S>,
    ) -> Self {
        Self {
            api_version,
            group,
            kind,
            handler,
        }
    }

    pub fn pvc(handler: ReconcileHandler<K, S>) -> Self {
        Self::new("v1", "core", "PersistentVolumeClaim", handler)
    }

    pub fn stateful_set(handler: ReconcileHandler<K, S>) -> Self {
        Self::new("v1", "apps", "StatefulSet", handler)
    }

    pub fn service(handler: ReconcileHandler<K, S>) -> Self {
        Self::new("v1", "core", "Service", handler)
    }

    /// A step that is not tied to one dependent kind.
    pub fn step(name: &'static str, handler: ReconcileHandler<K, S>) -> Self {
        Self::new("", "", name, handler)
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

pub struct Reconcilers<K, S: ObjectStore> {
    steps: Vec<SubReconciler<K, S>>,
}

impl<K, S: ObjectStore> std::fmt::Debug for Reconcilers<K, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.steps.iter().map(|s| s.kind)).finish()
    }
}

impl<K, S: ObjectStore> Reconcilers<K, S> {
    pub fn new(steps: Vec<SubReconciler<K, S>>) -> Self {
        Self { steps }
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.steps.iter().map(SubReconciler::kind).collect()
    }

    /// Run every step in order, stopping at the first error.
    pub async fn reconcile(
        &self,
        ctx: &Context<S>,
        namespace: &str,
        name: &str,
        obj: &K,
    ) -> Result<(), ReconcilerError> {
        for step in &self.steps {
            debug!(kind = step.kind, group = step.group, "Reconciling");
            (step.handler)(ctx, namespace, name, obj).await?;
        }
        Ok(())
    }
}
