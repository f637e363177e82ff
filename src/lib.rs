//! LLM Operator Library
//!
//! Core functionality for the LLM operator: custom resources, the condition
//! store, dependent-resource provisioning, provider clients and the per-kind
//! reconcilers. Unit tests live next to the code; scenario tests live under
//! `tests/`.
//!
//! ## Quick Start
//!
//! ```rust
//! use llm_operator::prelude::*;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod events;
pub mod llms;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod store;
