// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Echo reconciler - gives every Echo exactly one child pod and marks it succeeded.

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec, SecurityContext};
use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use super::expectations::ChildExpectations;
use super::ownership::is_controlled_by;
use crate::cache::{split_key, ResourceCache};
use crate::constants::{child, reasons, CHILD_EXPECTATION_TTL};
use crate::error::{Result, TugboatError};
use crate::kubernetes::{EventRecorder, ObjectWriter, Outcome};
use crate::queue::WorkQueue;
use crate::types::Echo;

/// Collaborators shared by the echo reconciler and the child collector
#[derive(Clone)]
pub struct EchoContext {
    pub echoes: Arc<dyn ResourceCache<Echo>>,
    pub pods: Arc<dyn ResourceCache<Pod>>,
    pub echo_writer: Arc<dyn ObjectWriter<Echo>>,
    pub pod_writer: Arc<dyn ObjectWriter<Pod>>,
    pub recorder: Arc<dyn EventRecorder>,
}

pub struct EchoReconciler {
    ctx: EchoContext,
    queue: WorkQueue<String>,
    child_image: String,
    expectations: ChildExpectations,
}

impl EchoReconciler {
    pub fn new(ctx: EchoContext, queue: WorkQueue<String>, child_image: impl Into<String>) -> Self {
        Self {
            ctx,
            queue,
            child_image: child_image.into(),
            expectations: ChildExpectations::new(CHILD_EXPECTATION_TTL),
        }
    }

    /// Process keys until the queue shuts down
    pub async fn run(self) -> anyhow::Result<()> {
        info!("Echo reconciler started");
        while self.process_next_work_item().await {}
        info!("Echo reconciler stopped");
        Ok(())
    }

    /// Handle one key. Returns false once the queue is shut down.
    pub async fn process_next_work_item(&self) -> bool {
        let Some(key) = self.queue.get().await else {
            return false;
        };

        self.sync(&key).await;
        self.queue.done(&key);
        true
    }

    async fn sync(&self, key: &str) {
        match self.reconcile(key).await {
            Ok(()) => self.queue.forget(key),
            Err(TugboatError::NotFound(_)) => {
                // Deleted objects are never enqueued again, so there is nothing to retry
                warn!("Echo {} no longer exists, dropping it", key);
                self.expectations.observed(key);
                self.queue.forget(key);
            }
            Err(e) if e.is_permanent() => {
                error!("Dropping {}: {}", key, e);
                self.queue.forget(key);
            }
            Err(e) => {
                error!(
                    "Failed to reconcile {} (attempt {}): {}",
                    key,
                    self.queue.num_requeues(key) + 1,
                    e
                );
                self.queue.add_rate_limited(key.to_string());
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn reconcile(&self, key: &str) -> Result<()> {
        let (namespace, name) = split_key(key)?;
        let echo = self
            .ctx
            .echoes
            .get(namespace, name)
            .ok_or_else(|| TugboatError::NotFound(key.to_string()))?;

        if echo.is_succeeded() {
            debug!("Echo already succeeded, nothing to do");
            self.expectations.observed(key);
            return Ok(());
        }

        let existing = self
            .ctx
            .pods
            .list()
            .into_iter()
            .find(|pod| is_controlled_by(pod.as_ref(), echo.as_ref()));
        if let Some(pod) = existing {
            self.expectations.observed(key);
            info!(
                "Echo already owns child pod {}, not creating another",
                pod.name_any()
            );
        } else if let Some(pod) = self.expectations.pending(key, Utc::now()) {
            info!("Child pod {} is not in the cache yet, not creating another", pod);
        } else {
            self.create_child(key, &echo).await?;
        }

        // The cached echo is shared, write a modified copy
        self.ctx.echo_writer.update_status(&echo.with_succeeded()).await?;
        info!("Marked echo as succeeded");
        Ok(())
    }

    async fn create_child(&self, key: &str, echo: &Echo) -> Result<()> {
        let now = Utc::now();
        let pod = build_child_pod(echo, &self.child_image, now)?;
        let pod_name = pod.name_any();
        let regarding = echo.object_ref(&());

        match self.ctx.pod_writer.create(&pod).await {
            Ok(_) => {
                self.expectations.expect(key, &pod_name, now);
                info!(pod = %pod_name, "Created child pod");
                self.ctx
                    .recorder
                    .record(
                        &regarding,
                        Outcome::Success,
                        reasons::SUCCESSFUL_CREATE,
                        format!("Created pod: {}", pod_name),
                    )
                    .await;
                Ok(())
            }
            Err(e) => {
                error!(pod = %pod_name, "Failed to create child pod: {}", e);
                self.ctx
                    .recorder
                    .record(
                        &regarding,
                        Outcome::Failure,
                        reasons::FAILED_CREATE,
                        format!("Error creating pod {}: {}", pod_name, e),
                    )
                    .await;
                Err(e)
            }
        }
    }
}

/// Run-to-completion pod printing the echo's message, controlled by the echo
pub fn build_child_pod(echo: &Echo, image: &str, now: DateTime<Utc>) -> Result<Pod> {
    let owner = echo.controller_owner_ref(&()).ok_or_else(|| {
        TugboatError::InvalidObject(format!("echo {} has no name or uid", echo.name_any()))
    })?;

    Ok(Pod {
        metadata: ObjectMeta {
            name: Some(format!("{}-{}", echo.name_any(), now.timestamp_micros())),
            namespace: echo.namespace(),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        spec: Some(PodSpec {
            restart_policy: Some("Never".to_string()),
            containers: vec![Container {
                name: child::CONTAINER_NAME.to_string(),
                image: Some(image.to_string()),
                command: Some(vec!["echo".to_string(), echo.spec.message.clone()]),
                security_context: Some(SecurityContext {
                    read_only_root_filesystem: Some(true),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::ItemExponentialBackoff;
    use crate::test_utils::{
        make_echo, make_pod, FakeCache, RecordingRecorder, RecordingWriter,
    };
    use chrono::TimeZone;
    use std::sync::atomic::Ordering;

    struct Fixture {
        reconciler: EchoReconciler,
        queue: WorkQueue<String>,
        echoes: Arc<FakeCache<Echo>>,
        echo_writer: Arc<RecordingWriter<Echo>>,
        pod_writer: Arc<RecordingWriter<Pod>>,
        recorder: Arc<RecordingRecorder>,
    }

    fn fixture(echoes: Vec<Echo>, pods: Vec<Pod>) -> Fixture {
        let queue = WorkQueue::new("echoes", ItemExponentialBackoff::default());
        let echoes = Arc::new(FakeCache::new(echoes));
        let echo_writer = Arc::new(RecordingWriter::default());
        let pod_writer = Arc::new(RecordingWriter::default());
        let recorder = Arc::new(RecordingRecorder::default());

        let ctx = EchoContext {
            echoes: echoes.clone(),
            pods: Arc::new(FakeCache::new(pods)),
            echo_writer: echo_writer.clone(),
            pod_writer: pod_writer.clone(),
            recorder: recorder.clone(),
        };

        Fixture {
            reconciler: EchoReconciler::new(ctx, queue.clone(), "busybox"),
            queue,
            echoes,
            echo_writer,
            pod_writer,
            recorder,
        }
    }

    #[tokio::test]
    async fn test_new_echo_gets_one_child_and_succeeds() {
        let echo = make_echo("ns", "demo", "uid-1");
        let f = fixture(vec![echo.clone()], vec![]);

        f.queue.add("ns/demo".to_string());
        assert!(f.reconciler.process_next_work_item().await);

        let created = f.pod_writer.created();
        assert_eq!(created.len(), 1);
        assert!(is_controlled_by(&created[0], &echo));
        assert!(created[0].name_any().starts_with("demo-"));
        assert_eq!(created[0].namespace().as_deref(), Some("ns"));

        let updates = f.echo_writer.status_updates();
        assert_eq!(updates.len(), 1);
        assert!(updates[0].is_succeeded());
        // The cached object stays untouched
        assert!(!f.echoes.get(Some("ns"), "demo").unwrap().is_succeeded());

        assert_eq!(f.recorder.reasons(), vec![reasons::SUCCESSFUL_CREATE]);
        assert!(f.queue.is_empty());
        assert_eq!(f.queue.num_requeues(&"ns/demo".to_string()), 0);
    }

    #[tokio::test]
    async fn test_succeeded_echo_is_left_alone() {
        let echo = make_echo("ns", "demo", "uid-1").with_succeeded();
        let f = fixture(vec![echo], vec![]);

        f.reconciler.reconcile("ns/demo").await.unwrap();

        assert!(f.pod_writer.operations().is_empty());
        assert!(f.echo_writer.operations().is_empty());
    }

    #[tokio::test]
    async fn test_existing_child_is_not_duplicated() {
        let echo = make_echo("ns", "demo", "uid-1");
        let pod = make_pod("ns", "demo-1", Some(&echo));
        let f = fixture(vec![echo], vec![pod]);

        f.reconciler.reconcile("ns/demo").await.unwrap();

        assert!(f.pod_writer.created().is_empty());
        assert_eq!(f.echo_writer.status_updates().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_echo_is_forgotten() {
        let f = fixture(vec![], vec![]);

        f.queue.add("ns/gone".to_string());
        assert!(f.reconciler.process_next_work_item().await);

        assert_eq!(f.queue.num_requeues(&"ns/gone".to_string()), 0);
        assert!(f.pod_writer.operations().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_key_is_forgotten() {
        let f = fixture(vec![], vec![]);

        f.queue.add("a/b/c".to_string());
        assert!(f.reconciler.process_next_work_item().await);

        assert_eq!(f.queue.num_requeues(&"a/b/c".to_string()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_create_is_retried_with_backoff() {
        let f = fixture(vec![make_echo("ns", "demo", "uid-1")], vec![]);
        f.pod_writer.fail_create.store(true, Ordering::SeqCst);

        f.queue.add("ns/demo".to_string());
        assert!(f.reconciler.process_next_work_item().await);

        assert_eq!(f.queue.num_requeues(&"ns/demo".to_string()), 1);
        assert!(f.echo_writer.operations().is_empty());
        assert_eq!(f.recorder.reasons(), vec![reasons::FAILED_CREATE]);

        // The retry succeeds once the writer recovers
        f.pod_writer.fail_create.store(false, Ordering::SeqCst);
        assert!(f.reconciler.process_next_work_item().await);
        assert_eq!(f.pod_writer.created().len(), 1);
        assert_eq!(f.queue.num_requeues(&"ns/demo".to_string()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_status_update_is_retried() {
        let f = fixture(vec![make_echo("ns", "demo", "uid-1")], vec![]);
        f.echo_writer.fail_status.store(true, Ordering::SeqCst);

        f.queue.add("ns/demo".to_string());
        assert!(f.reconciler.process_next_work_item().await);

        assert_eq!(f.pod_writer.created().len(), 1);
        assert_eq!(f.queue.num_requeues(&"ns/demo".to_string()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_before_pod_cache_catches_up_creates_no_second_child() {
        // The pod cache never sees the child created on the first pass
        let f = fixture(vec![make_echo("ns", "demo", "uid-1")], vec![]);
        f.echo_writer.fail_status.store(true, Ordering::SeqCst);

        f.queue.add("ns/demo".to_string());
        assert!(f.reconciler.process_next_work_item().await);
        assert_eq!(f.pod_writer.created().len(), 1);

        f.echo_writer.fail_status.store(false, Ordering::SeqCst);
        assert!(f.reconciler.process_next_work_item().await);

        assert_eq!(f.pod_writer.created().len(), 1);
        assert_eq!(f.echo_writer.status_updates().len(), 1);
        assert_eq!(f.queue.num_requeues("ns/demo"), 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let f = fixture(vec![], vec![]);
        f.queue.shut_down();

        f.reconciler.run().await.unwrap();
    }

    #[test]
    fn test_build_child_pod() {
        let echo = make_echo("ns", "demo", "uid-1");
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();

        let pod = build_child_pod(&echo, "busybox", now).unwrap();

        assert_eq!(pod.name_any(), format!("demo-{}", now.timestamp_micros()));
        assert!(is_controlled_by(&pod, &echo));

        let spec = pod.spec.unwrap();
        assert_eq!(spec.restart_policy.as_deref(), Some("Never"));
        assert_eq!(spec.containers.len(), 1);
        let container = &spec.containers[0];
        assert_eq!(container.name, child::CONTAINER_NAME);
        assert_eq!(container.image.as_deref(), Some("busybox"));
        assert_eq!(
            container.command,
            Some(vec!["echo".to_string(), "hi".to_string()])
        );
        assert_eq!(
            container
                .security_context
                .as_ref()
                .and_then(|s| s.read_only_root_filesystem),
            Some(true)
        );
    }

    #[test]
    fn test_build_child_pod_requires_uid() {
        let mut echo = make_echo("ns", "demo", "uid-1");
        echo.metadata.uid = None;

        assert!(matches!(
            build_child_pod(&echo, "busybox", Utc::now()),
            Err(TugboatError::InvalidObject(_))
        ));
    }
}
