// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Periodic removal of finished child pods.

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use kube::{Resource, ResourceExt};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

use super::echo::EchoContext;
use super::ownership::find_owner;
use crate::constants::{child, reasons};
use crate::kubernetes::{Deletion, Outcome};

/// Deletes succeeded child pods older than the retention window.
/// Pods without a live owning echo are never touched.
pub struct ChildCollector {
    ctx: EchoContext,
    retention: Duration,
}

impl ChildCollector {
    pub fn new(ctx: EchoContext, retention: Duration) -> Self {
        Self { ctx, retention }
    }

    pub async fn clean(&self) -> usize {
        self.clean_at(Utc::now()).await
    }

    /// One sweep as of `now`. Returns the number of deleted pods.
    #[instrument(skip(self))]
    pub async fn clean_at(&self, now: DateTime<Utc>) -> usize {
        let echoes = self.ctx.echoes.list();
        let mut deleted = 0;

        for pod in self.ctx.pods.list() {
            let Some(owner) = find_owner(&echoes, pod.as_ref()) else {
                continue;
            };
            if !is_expired(&pod, now, self.retention) {
                continue;
            }

            let namespace = pod.namespace().unwrap_or_default();
            let name = pod.name_any();
            let regarding = owner.object_ref(&());

            match self.ctx.pod_writer.delete(&namespace, &name).await {
                Ok(Deletion::Deleted) => {
                    info!("Deleted finished child pod {}/{}", namespace, name);
                    self.ctx
                        .recorder
                        .record(
                            &regarding,
                            Outcome::Success,
                            reasons::SUCCESSFUL_DELETE,
                            format!("Deleted pod: {}", name),
                        )
                        .await;
                    deleted += 1;
                }
                Ok(Deletion::AlreadyAbsent) => {
                    debug!("Child pod {}/{} was already deleted", namespace, name);
                }
                Err(e) => {
                    error!("Failed to delete child pod {}/{}: {}", namespace, name, e);
                    self.ctx
                        .recorder
                        .record(
                            &regarding,
                            Outcome::Failure,
                            reasons::FAILED_DELETE,
                            format!("Error deleting pod {}: {}", name, e),
                        )
                        .await;
                }
            }
        }

        deleted
    }
}

/// Succeeded and finished at least `retention` before `now`
fn is_expired(pod: &Pod, now: DateTime<Utc>, retention: Duration) -> bool {
    let succeeded = pod
        .status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .is_some_and(|phase| phase == child::SUCCEEDED_PHASE);
    if !succeeded {
        return false;
    }

    finished_at(pod)
        .and_then(|finished| (now - finished).to_std().ok())
        .is_some_and(|age| age >= retention)
}

/// Latest container termination, falling back to the pod start time
fn finished_at(pod: &Pod) -> Option<DateTime<Utc>> {
    let status = pod.status.as_ref()?;
    status
        .container_statuses
        .iter()
        .flatten()
        .filter_map(|cs| cs.state.as_ref()?.terminated.as_ref()?.finished_at.as_ref())
        .map(|t| t.0)
        .max()
        .or_else(|| status.start_time.as_ref().map(|t| t.0))
}
