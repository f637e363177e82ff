//! # Prelude
//!
//! Re-exports commonly used types and traits.
//!
//! ```rust
//! use llm_operator::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Reconciler types
pub use crate::controller::reconciler::{reconcile_llm, reconcile_model, reconcile_prompt, Context};
pub use crate::controller::requeue::{Directive, ReconcilerError};

// Store and event seams
pub use crate::events::{EventSink, KubeEventSink, MemoryEventSink, Recorder};
pub use crate::store::{KubeStore, MemoryStore, ObjectStore, StoreError};

// Provider clients
pub use crate::llms::{CallOption, Llm as LlmClient, LlmClientFactory, LlmError, LlmType, ProviderClients, Response};

// Config types
pub use crate::config::{ControllerConfig, RequeueIntervals};
