//! # LLM Operator
//!
//! Kubernetes operator for `LLM`, `Model` and `Prompt` resources.
//!
//! - `LLM`: validates a third-party endpoint or in-cluster worker and reports `Ready`
//! - `Model`: provisions the namespace's shared Ollama image store and reports `Available`
//! - `Prompt`: sends the prompt to its `LLM` once per generation and stores the response
//!
//! Configuration comes from environment variables, see
//! [`llm_operator::config::ControllerConfig`].

use anyhow::Result;
use llm_operator::runtime::{initialize, run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;
    run_watch_loop(init.client, init.context, init.server_state).await
}
