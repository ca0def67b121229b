// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Wires caches, notifier, reconcilers and sweeps together and runs them
//! until shutdown.

use anyhow::anyhow;
use k8s_openapi::api::core::v1::{Pod, Secret};
use k8s_openapi::NamespaceResourceScope;
use kube::runtime::reflector::Store;
use kube::{Api, Client, Resource};
use kube_runtime::watcher::Config as WatcherConfig;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::timeout;
use tracing::{error, info};

use super::{run_periodically, Shutdown};
use crate::cache::reflect;
use crate::config::Config;
use crate::constants::WATCH_EVENT_BUFFER;
use crate::error::TugboatError;
use crate::kubernetes::{EventRecorder, KubeEventRecorder, KubeWriter};
use crate::notifier::ChangeNotifier;
use crate::queue::{ItemExponentialBackoff, WorkQueue};
use crate::reconcilers::{ChildCollector, CredentialRotator, EchoContext, EchoReconciler};
use crate::registry::EcrExchange;
use crate::server::{self, ProbeState};
use crate::types::Echo;

pub struct ControllerManager {
    client: Client,
    config: Config,
}

impl ControllerManager {
    pub fn new(client: Client, config: Config) -> Self {
        Self { client, config }
    }

    fn api<K>(&self) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        match &self.config.namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        }
    }

    /// Run until `shutdown` fires, then drain the work queue and wait for all loops
    pub async fn run(self, mut shutdown: Shutdown) -> anyhow::Result<()> {
        let mut tasks: JoinSet<anyhow::Result<()>> = JoinSet::new();

        let probes = Arc::new(ProbeState::new());
        tasks.spawn(server::serve(
            self.config.probe_addr,
            probes.clone(),
            shutdown.clone(),
        ));

        let queue = WorkQueue::new(
            "echoes",
            ItemExponentialBackoff::new(
                self.config.queue_base_delay,
                self.config.queue_max_delay,
            ),
        );

        let (echo_tx, echo_rx) = mpsc::channel(WATCH_EVENT_BUFFER);
        let (echoes, echo_watch) = reflect(
            self.api::<Echo>(),
            WatcherConfig::default(),
            Some(echo_tx),
            shutdown.clone(),
        );
        let (pods, pod_watch) = reflect(
            self.api::<Pod>(),
            WatcherConfig::default(),
            None,
            shutdown.clone(),
        );
        // Login sources and managed secrets are both needed, so all secrets are watched
        let (secrets, secret_watch) = reflect(
            self.api::<Secret>(),
            WatcherConfig::default(),
            None,
            shutdown.clone(),
        );
        spawn_watch(&mut tasks, echo_watch);
        spawn_watch(&mut tasks, pod_watch);
        spawn_watch(&mut tasks, secret_watch);

        tasks.spawn(ChangeNotifier::new(queue.clone()).run(echo_rx));

        info!("Waiting for caches to sync...");
        let synced = tokio::select! {
            biased;
            _ = shutdown.wait() => None,
            synced = self.wait_for_caches(&echoes, &pods, &secrets) => Some(synced),
        };
        match synced {
            Some(Ok(())) => {}
            Some(Err(e)) if !shutdown.is_triggered() => {
                tasks.shutdown().await;
                return Err(e.into());
            }
            // A stopping watch drops its store writer, which is no sync failure
            _ => {
                info!("Shutdown requested before caches synced");
                tasks.shutdown().await;
                return Ok(());
            }
        }
        probes.set_ready();
        info!("Caches synced, starting reconcilers");

        let recorder: Arc<dyn EventRecorder> =
            Arc::new(KubeEventRecorder::new(self.client.clone()));
        let ctx = EchoContext {
            echoes: Arc::new(echoes),
            pods: Arc::new(pods),
            echo_writer: Arc::new(KubeWriter::<Echo>::new(self.client.clone())),
            pod_writer: Arc::new(KubeWriter::<Pod>::new(self.client.clone())),
            recorder: recorder.clone(),
        };

        let reconciler = EchoReconciler::new(
            ctx.clone(),
            queue.clone(),
            self.config.child_image.clone(),
        );
        tasks.spawn(reconciler.run());

        let collector = Arc::new(ChildCollector::new(ctx, self.config.child_retention));
        tasks.spawn(periodic(
            "child cleanup",
            self.config.cleanup_interval,
            shutdown.clone(),
            move || {
                let collector = collector.clone();
                async move {
                    let deleted = collector.clean().await;
                    if deleted > 0 {
                        info!("Cleaned up {} finished child pods", deleted);
                    }
                }
            },
        ));

        let rotator = Arc::new(CredentialRotator::new(
            Arc::new(secrets),
            Arc::new(KubeWriter::<Secret>::new(self.client.clone())),
            Arc::new(EcrExchange::new()),
            recorder,
            self.config.login_source_selector.clone(),
            self.config.credential_expiration,
        ));
        tasks.spawn(periodic(
            "credential rotation",
            self.config.rotation_interval,
            shutdown.clone(),
            move || {
                let rotator = rotator.clone();
                async move {
                    let summary = rotator.rotate().await;
                    info!(
                        fresh = summary.fresh,
                        rotated = summary.rotated,
                        failed = summary.failed,
                        "Credential rotation finished"
                    );
                }
            },
        ));

        let early_exit = tokio::select! {
            biased;
            _ = shutdown.wait() => None,
            Some(result) = tasks.join_next() => Some(result),
        };

        match early_exit {
            Some(result) if !shutdown.is_triggered() => {
                queue.shut_down();
                tasks.shutdown().await;
                return Err(match result {
                    Ok(Ok(())) => anyhow!("A control loop stopped unexpectedly"),
                    Ok(Err(e)) => e,
                    Err(e) => e.into(),
                });
            }
            // Loops stopping on their own once shutdown fired are part of the drain
            Some(result) => report_exit(result),
            None => {}
        }

        info!("Shutting down, draining work queue");
        queue.shut_down();
        while let Some(result) = tasks.join_next().await {
            report_exit(result);
        }

        info!("All control loops stopped");
        Ok(())
    }

    async fn wait_for_caches(
        &self,
        echoes: &Store<Echo>,
        pods: &Store<Pod>,
        secrets: &Store<Secret>,
    ) -> Result<(), TugboatError> {
        let all_ready = async {
            echoes.wait_until_ready().await?;
            pods.wait_until_ready().await?;
            secrets.wait_until_ready().await
        };

        match timeout(self.config.cache_sync_timeout, all_ready).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TugboatError::CacheSyncError(e.to_string())),
            Err(_) => Err(TugboatError::CacheSyncError(format!(
                "caches not synced within {:?}",
                self.config.cache_sync_timeout
            ))),
        }
    }
}

fn report_exit(result: Result<anyhow::Result<()>, JoinError>) {
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Control loop failed: {}", e),
        Err(e) => error!("Control loop panicked: {}", e),
    }
}

fn spawn_watch<F>(tasks: &mut JoinSet<anyhow::Result<()>>, watch: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    tasks.spawn(async move {
        watch.await;
        Ok(())
    });
}

async fn periodic<F, Fut>(
    name: &'static str,
    period: std::time::Duration,
    shutdown: Shutdown,
    tick: F,
) -> anyhow::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    run_periodically(name, period, shutdown, tick).await;
    Ok(())
}
