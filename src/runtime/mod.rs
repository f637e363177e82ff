//! # Runtime
//!
//! Process wiring for the operator binary.
//!
//! - `initialization`: rustls, tracing, metrics, HTTP server and Kubernetes client
//! - `watch_loop`: one kube-runtime `Controller` per kind, run concurrently
//! - `error_policy`: maps reconcile errors to requeue actions

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

pub use initialization::{initialize, InitializationResult};
pub use watch_loop::run_watch_loop;
