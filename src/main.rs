// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tugboat::config::Config;
use tugboat::controllers::{self, install_signal_handler, ControllerManager};
use tugboat::error::TugboatError;
use tugboat::kubernetes::wait_for_echo_crd;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Tugboat controller");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: namespace={}, child_retention={:?}, credential_expiration={:?}",
        config.namespace.as_deref().unwrap_or("<all>"),
        config.child_retention,
        config.credential_expiration
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let (trigger, shutdown) = controllers::channel();
    install_signal_handler(trigger);

    // Wait for the Echo CRD before starting any watch on it
    info!("Waiting for Echo CRD to become available...");
    match wait_for_echo_crd(&client, shutdown.clone()).await {
        Ok(()) => {}
        Err(TugboatError::ShuttingDown) => {
            info!("Shut down before the Echo CRD became available");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    ControllerManager::new(client, config).run(shutdown).await?;

    info!("Tugboat controller stopped");
    Ok(())
}
