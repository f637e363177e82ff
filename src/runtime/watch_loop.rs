//! # Watch Loop
//!
//! One kube-runtime `Controller` per kind, all watching every namespace and
//! sharing one reconcile context. The controllers serialize reconciles per
//! object and run up to `MAX_CONCURRENT_RECONCILIATIONS` objects at once.

use crate::controller::reconciler::{self, Context};
use crate::controller::server::ServerState;
use crate::crd::{Llm, Model, Prompt};
use crate::runtime::error_policy::handle_reconciliation_error;
use crate::store::KubeStore;
use futures::StreamExt;
use kube::api::Api;
use kube::Client;
use kube_runtime::controller::Config as RuntimeConfig;
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// SIGINT or SIGTERM, whichever arrives first
pub struct ShutdownSignal {
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
}

impl ShutdownSignal {
    /// Register the handlers. Must be called inside a tokio runtime.
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            sigterm: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?,
        })
    }

    /// Wait for the first signal and return its name.
    #[cfg(unix)]
    pub async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => "SIGINT",
            _ = self.sigterm.recv() => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(self) -> &'static str {
        let _ = tokio::signal::ctrl_c().await;
        "SIGINT"
    }
}

/// Run the `LLM`, `Model` and `Prompt` controllers until shutdown.
pub async fn run_watch_loop(
    client: Client,
    ctx: Arc<Context<KubeStore>>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let shutdown = ShutdownSignal::install()?;
    let shutdown_server_state = server_state.clone();
    tokio::spawn(async move {
        let received = shutdown.recv().await;
        info!(signal = received, "Received shutdown signal, initiating graceful shutdown...");
        shutdown_server_state.set_ready(false);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    });

    let runtime_config =
        RuntimeConfig::default().concurrency(ctx.config.max_concurrent_reconciliations);

    let llms = Controller::new(
        Api::<Llm>::all(client.clone()),
        watcher::Config::default().any_semantic(),
    )
    .with_config(runtime_config.clone())
    .shutdown_on_signal()
    .run(
        reconciler::llm::reconcile,
        handle_reconciliation_error,
        ctx.clone(),
    )
    .for_each(|result| async move {
        match result {
            Ok((obj, _)) => debug!(object = %obj, "LLM reconciled"),
            Err(e) => warn!(error = %e, "LLM controller error"),
        }
    });

    let models = Controller::new(
        Api::<Model>::all(client.clone()),
        watcher::Config::default().any_semantic(),
    )
    .with_config(runtime_config.clone())
    .shutdown_on_signal()
    .run(
        reconciler::model::reconcile,
        handle_reconciliation_error,
        ctx.clone(),
    )
    .for_each(|result| async move {
        match result {
            Ok((obj, _)) => debug!(object = %obj, "Model reconciled"),
            Err(e) => warn!(error = %e, "Model controller error"),
        }
    });

    let prompts = Controller::new(
        Api::<Prompt>::all(client),
        watcher::Config::default().any_semantic(),
    )
    .with_config(runtime_config)
    .shutdown_on_signal()
    .run(
        reconciler::prompt::reconcile,
        handle_reconciliation_error,
        ctx,
    )
    .for_each(|result| async move {
        match result {
            Ok((obj, _)) => debug!(object = %obj, "Prompt reconciled"),
            Err(e) => warn!(error = %e, "Prompt controller error"),
        }
    });

    info!("Starting LLM, Model and Prompt controllers...");
    tokio::join!(llms, models, prompts);

    info!("Controller stopped gracefully");
    Ok(())
}
