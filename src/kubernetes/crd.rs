// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRD availability checking utilities

use crate::constants::crd::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::controllers::Shutdown;
use crate::error::{Result, TugboatError};
use crate::types::Echo;
use kube::{discovery::Discovery, Client, Resource};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Wait for the Echo CRD to become available in the cluster.
/// This uses exponential backoff starting at POLL_INTERVAL_SECS seconds.
pub async fn wait_for_echo_crd(client: &Client, mut shutdown: Shutdown) -> Result<()> {
    let mut interval = POLL_INTERVAL_SECS;
    let api_version = Echo::api_version(&());

    loop {
        match check_echo_crd_exists(client).await {
            Ok(true) => {
                info!("Echo CRD ({}) is available", api_version);
                return Ok(());
            }
            Ok(false) => {
                info!(
                    "Echo CRD ({}) not yet available, waiting {} seconds...",
                    api_version, interval
                );
            }
            Err(e) => {
                warn!(
                    "Error checking for Echo CRD: {}, retrying in {} seconds...",
                    e, interval
                );
            }
        }

        tokio::select! {
            _ = shutdown.wait() => {
                return Err(TugboatError::ShuttingDown);
            }
            _ = sleep(Duration::from_secs(interval)) => {}
        }

        // Exponential backoff with max cap
        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

/// Check if the Echo CRD exists by attempting to discover it.
async fn check_echo_crd_exists(client: &Client) -> Result<bool> {
    let group = Echo::group(&());
    let discovery = Discovery::new(client.clone())
        .filter(&[group.as_ref()])
        .run()
        .await?;

    for api_group in discovery.groups() {
        if api_group.name() == group {
            for (ar, _) in api_group.recommended_resources() {
                if ar.kind == Echo::kind(&()) && ar.version == Echo::version(&()) {
                    return Ok(true);
                }
            }
        }
    }

    Ok(false)
}
