//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::time::Duration;

/// The three requeue cadences used by every reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequeueIntervals {
    /// Waiting on a dependent resource to become ready
    pub short: Duration,
    /// Backoff after a recoverable failure
    pub medium: Duration,
    /// Steady-state health re-check
    pub long: Duration,
}

impl Default for RequeueIntervals {
    fn default() -> Self {
        use crate::constants::{
            DEFAULT_REQUEUE_LONG_SECS, DEFAULT_REQUEUE_MEDIUM_SECS, DEFAULT_REQUEUE_SHORT_SECS,
        };
        Self {
            short: Duration::from_secs(DEFAULT_REQUEUE_SHORT_SECS),
            medium: Duration::from_secs(DEFAULT_REQUEUE_MEDIUM_SECS),
            long: Duration::from_secs(DEFAULT_REQUEUE_LONG_SECS),
        }
    }
}

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Requeue cadences
    pub requeue: RequeueIntervals,
    /// Attempts made for a read-modify-write before giving up on conflicts
    pub status_update_retries: u32,
    /// Port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// HTTP server startup timeout (seconds)
    pub server_startup_timeout_secs: u64,
    /// HTTP server readiness poll interval (milliseconds)
    pub server_poll_interval_ms: u64,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
    /// Maximum concurrent reconciliations per kind
    pub max_concurrent_reconciliations: u16,
    /// Capacity of the shared image-store claim
    pub image_store_storage_size: String,
    /// Storage class for the image-store claim when a Model does not name one
    pub image_store_storage_class: Option<String>,
    /// Image of the image-store workload when a Model does not name one
    pub image_store_image: String,
    /// Timeout for a single provider HTTP request (seconds)
    pub llm_request_timeout_secs: u64,
    /// Event reporter name
    pub controller_name: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            requeue: RequeueIntervals::default(),
            status_update_retries: DEFAULT_STATUS_UPDATE_RETRIES,
            metrics_port: DEFAULT_METRICS_PORT,
            server_startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            server_poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
            log_level: "INFO".to_string(),
            log_format: "json".to_string(),
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            image_store_storage_size: DEFAULT_IMAGE_STORE_STORAGE_SIZE.to_string(),
            image_store_storage_class: None,
            image_store_image: DEFAULT_IMAGE_STORE_IMAGE.to_string(),
            llm_request_timeout_secs: DEFAULT_LLM_REQUEST_TIMEOUT_SECS,
            controller_name: DEFAULT_CONTROLLER_NAME.to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            requeue: RequeueIntervals {
                short: Duration::from_secs(env_var_or_default(
                    "REQUEUE_SHORT_SECS",
                    DEFAULT_REQUEUE_SHORT_SECS,
                )),
                medium: Duration::from_secs(env_var_or_default(
                    "REQUEUE_MEDIUM_SECS",
                    DEFAULT_REQUEUE_MEDIUM_SECS,
                )),
                long: Duration::from_secs(env_var_or_default(
                    "REQUEUE_LONG_SECS",
                    DEFAULT_REQUEUE_LONG_SECS,
                )),
            },
            status_update_retries: env_var_or_default(
                "STATUS_UPDATE_RETRIES",
                DEFAULT_STATUS_UPDATE_RETRIES,
            )
            .max(1),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            server_startup_timeout_secs: env_var_or_default(
                "SERVER_STARTUP_TIMEOUT_SECS",
                DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            ),
            server_poll_interval_ms: env_var_or_default(
                "SERVER_POLL_INTERVAL_MS",
                DEFAULT_SERVER_POLL_INTERVAL_MS,
            ),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "json"),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
            image_store_storage_size: env_var_or_default_str(
                "IMAGE_STORE_STORAGE_SIZE",
                DEFAULT_IMAGE_STORE_STORAGE_SIZE,
            ),
            image_store_storage_class: std::env::var("IMAGE_STORE_STORAGE_CLASS")
                .ok()
                .filter(|v| !v.is_empty()),
            image_store_image: env_var_or_default_str(
                "IMAGE_STORE_IMAGE",
                DEFAULT_IMAGE_STORE_IMAGE,
            ),
            llm_request_timeout_secs: env_var_or_default(
                "LLM_REQUEST_TIMEOUT_SECS",
                DEFAULT_LLM_REQUEST_TIMEOUT_SECS,
            ),
            controller_name: env_var_or_default_str("CONTROLLER_NAME", DEFAULT_CONTROLLER_NAME),
        }
    }

    /// Get the provider request timeout
    pub fn llm_request_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_request_timeout_secs)
    }

    /// Get the HTTP server startup timeout
    pub fn server_startup_timeout(&self) -> Duration {
        Duration::from_secs(self.server_startup_timeout_secs)
    }

    /// Get the HTTP server readiness poll interval
    pub fn server_poll_interval(&self) -> Duration {
        Duration::from_millis(self.server_poll_interval_ms)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
