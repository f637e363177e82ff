//! # Controller
//!
//! - `lifecycle`: finalizer-gated object lifecycle
//! - `provisioning`: provision-once image store resources
//! - `reconciler`: top-level `LLM`, `Model` and `Prompt` reconcilers
//! - `requeue`: pass outcomes and reconcile errors
//! - `server`: HTTP server for metrics and health checks
//! - `subreconciler`: ordered, fail-fast step chains

pub mod lifecycle;
pub mod provisioning;
pub mod reconciler;
pub mod requeue;
pub mod server;
pub mod subreconciler;
