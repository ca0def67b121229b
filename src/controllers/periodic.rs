// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::Shutdown;

/// Run `tick` immediately and then every `period` until shutdown.
/// A tick in progress is finished before the loop exits.
pub async fn run_periodically<F, Fut>(
    name: &str,
    period: Duration,
    mut shutdown: Shutdown,
    mut tick: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    info!("Starting periodic {} every {:?}", name, period);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            _ = ticker.tick() => {}
        }

        debug!("Running periodic {}", name);
        tick().await;
    }

    info!("Stopped periodic {}", name);
}
