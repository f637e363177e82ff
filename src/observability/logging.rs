//! # Logging
//!
//! `tracing` subscriber setup. `RUST_LOG` wins over the configured level.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    /// Anything other than `text` logs JSON.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("text") {
            Self::Text
        } else {
            Self::Json
        }
    }
}

/// Default directive when `RUST_LOG` is unset, e.g. `llm_operator=info`.
pub fn default_directive(log_level: &str) -> String {
    format!("llm_operator={}", log_level.to_ascii_lowercase())
}

#[allow(
    clippy::missing_errors_doc,
    reason = "Fails only when a global subscriber is already installed"
)]
pub fn init_tracing(log_level: &str, log_format: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(log_level)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match LogFormat::parse(log_format) {
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
        LogFormat::Text => builder.try_init(),
    };
    installed.map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))
}
