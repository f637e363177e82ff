//! # Constants
//!
//! Shared constants used throughout the operator.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Short requeue interval (seconds), used while waiting on dependent resources
pub const DEFAULT_REQUEUE_SHORT_SECS: u64 = 3;

/// Medium requeue interval (seconds), used after recoverable failures
pub const DEFAULT_REQUEUE_MEDIUM_SECS: u64 = 60;

/// Long requeue interval (seconds), the steady-state health re-check cadence
pub const DEFAULT_REQUEUE_LONG_SECS: u64 = 3600;

/// How many times a status or metadata write is retried after losing a version race
pub const DEFAULT_STATUS_UPDATE_RETRIES: u32 = 5;

/// Default maximum number of concurrent reconciliations per controller
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Default capacity requested by the shared image-store claim
pub const DEFAULT_IMAGE_STORE_STORAGE_SIZE: &str = "100Gi";

/// Default image for the shared image-store workload
pub const DEFAULT_IMAGE_STORE_IMAGE: &str = "ollama/ollama";

/// Default timeout for a single provider HTTP request (seconds)
pub const DEFAULT_LLM_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Name reported as the event source and field manager
pub const DEFAULT_CONTROLLER_NAME: &str = "llm-operator";

/// API group of the `LLM`, `Prompt` and `Worker` kinds
pub const BASE_GROUP: &str = "base.fleezesd.io";

/// API group of the `Model` kind
pub const LLM_GROUP: &str = "llm.fleezesd.io";

/// Finalizer carried by `LLM` and `Prompt` objects
pub const BASE_FINALIZER: &str = "base.fleezesd.io/finalizer";

/// Finalizer carried by `Model` objects
pub const MODEL_FINALIZER: &str = "llm.fleezesd.io/finalizer";

/// Label holding the resolved provider type of an `LLM`
pub const PROVIDER_LABEL: &str = "base.fleezesd.io/provider";

/// Secret key holding a provider API key
pub const API_KEY_SECRET_KEY: &str = "apiKey";
