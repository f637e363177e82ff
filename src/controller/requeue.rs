//! # Requeue
//!
//! Outcome of a reconcile pass and its translation into a kube-runtime
//! [`Action`].
//!
//! A pass returns either a [`Directive`] or a [`ReconcilerError`]. Errors carry
//! their own requeue delay: an explicit [`ReconcilerError::RequeueAfter`] is a
//! scheduling request rather than a failure, everything else defaults to the
//! medium interval.

use crate::config::RequeueIntervals;
use crate::crd::{AuthError, ProviderError};
use crate::llms::LlmError;
use crate::store::StoreError;
use kube_runtime::controller::Action;
use std::time::Duration;
use thiserror::Error;

/// When the object should next be reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Wait for the next change
    Done,
    RequeueImmediate,
    RequeueAfter(Duration),
}

impl Directive {
    /// Label used for the requeue metric
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::RequeueImmediate => "immediate",
            Self::RequeueAfter(_) => "scheduled",
        }
    }
}

impl From<Directive> for Action {
    fn from(directive: Directive) -> Self {
        match directive {
            Directive::Done => Action::await_change(),
            Directive::RequeueImmediate => Action::requeue(Duration::ZERO),
            Directive::RequeueAfter(after) => Action::requeue(after),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// The object's spec cannot succeed until it is edited
    #[error("{0}")]
    Configuration(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A dependency has not converged yet
    #[error("{0}")]
    NotReady(String),
    #[error("requeue after {}ms", .0.as_millis())]
    RequeueAfter(Duration),
    #[error("encountered an error: {source}, requeue after {}ms", .after.as_millis())]
    RequeueWithError {
        after: Duration,
        #[source]
        source: Box<ReconcilerError>,
    },
}

impl ReconcilerError {
    pub fn with_requeue(self, after: Duration) -> Self {
        match self {
            Self::RequeueWithError { source, .. } => Self::RequeueWithError { after, source },
            other => Self::RequeueWithError {
                after,
                source: Box::new(other),
            },
        }
    }

    /// Delay before the failed object is retried.
    pub fn requeue_after(&self, intervals: &RequeueIntervals) -> Duration {
        match self {
            Self::RequeueAfter(after) | Self::RequeueWithError { after, .. } => *after,
            Self::NotReady(_) => intervals.short,
            _ => intervals.medium,
        }
    }

    /// Errors that persist until the object is edited.
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Configuration(_) | Self::Provider(_) => true,
            Self::Auth(e) => matches!(e, AuthError::MissingSecretRef),
            Self::Llm(e) => e.is_configuration(),
            Self::RequeueWithError { source, .. } => source.is_configuration(),
            Self::Store(_) | Self::NotReady(_) | Self::RequeueAfter(_) => false,
        }
    }

    /// Message persisted into the object's status condition.
    pub fn condition_message(&self) -> String {
        match self {
            Self::RequeueWithError { source, .. } => source.condition_message(),
            other => other.to_string(),
        }
    }
}

/// Turn a pass outcome into a directive.
///
/// `Ok(None)` is a steady-state pass and re-checks after the long interval.
/// `Err(RequeueAfter)` is a plain scheduling request. Any other error is
/// returned for the error policy.
pub fn resolve(
    outcome: Result<Option<Directive>, ReconcilerError>,
    intervals: &RequeueIntervals,
) -> Result<Directive, ReconcilerError> {
    match outcome {
        Ok(Some(directive)) => Ok(directive),
        Ok(None) => Ok(Directive::RequeueAfter(intervals.long)),
        Err(ReconcilerError::RequeueAfter(after)) => Ok(Directive::RequeueAfter(after)),
        Err(e) => Err(e),
    }
}
