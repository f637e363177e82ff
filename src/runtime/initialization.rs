//! # Initialization
//!
//! Controller initialization: rustls setup, tracing, metrics, server startup,
//! Kubernetes client and the shared reconcile context.

use crate::config::ControllerConfig;
use crate::controller::reconciler::Context;
use crate::controller::server::{start_server, ServerState};
use crate::events::KubeEventSink;
use crate::llms::ProviderClients;
use crate::observability;
use crate::store::KubeStore;
use anyhow::{Context as _, Result};
use kube::Client;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Everything the watch loop needs
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// Shared reconcile context
    pub context: Arc<Context<KubeStore>>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready())
            .finish_non_exhaustive()
    }
}

/// Install the ring provider as the process-wide rustls default.
///
/// Returns whether this call installed it; `false` means a provider was
/// already in place.
pub fn install_crypto_provider() -> bool {
    rustls::crypto::ring::default_provider()
        .install_default()
        .is_ok()
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Reconcile context setup
pub async fn initialize() -> Result<InitializationResult> {
    // Must run before anything opens a TLS connection
    let installed_provider = install_crypto_provider();

    let config = ControllerConfig::from_env();
    observability::init_tracing(&config.log_level, &config.log_format)?;
    if !installed_provider {
        debug!("rustls crypto provider was already installed");
    }

    info!("Starting LLM operator");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_state_clone = server_state.clone();
    let server_port = config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let clients = ProviderClients::new(config.llm_request_timeout())
        .context("Failed to build provider HTTP client")?;
    let events = KubeEventSink::new(client.clone(), &config.controller_name);
    let context = Arc::new(Context::new(
        KubeStore::new(client.clone()),
        Arc::new(events),
        Arc::new(clients),
        config,
    ));

    info!(
        model_chain = ?context.model_chain().kinds(),
        "Controller initialized, starting watch loop..."
    );

    Ok(InitializationResult {
        client,
        context,
        server_state,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    config: &ControllerConfig,
) -> Result<()> {
    let startup_timeout = config.server_startup_timeout();
    let poll_interval = config.server_poll_interval();
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}
