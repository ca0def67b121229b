// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: a mocked Kubernetes API and in-memory stand-ins for the
//! cache, writers, event recorder and credential exchange.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::{Request, Response};
use k8s_openapi::api::core::v1::{
    ContainerState, ContainerStateTerminated, ContainerStatus, ObjectReference, Pod, PodStatus,
    Secret,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::{Client, Resource, ResourceExt};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;

use crate::cache::ResourceCache;
use crate::constants::{annotations, login_data, DEFAULT_LOGIN_SOURCE_SELECTOR};
use crate::error::{Result, TugboatError};
use crate::kubernetes::{Deletion, EventRecorder, ObjectWriter, Outcome};
use crate::registry::{CredentialExchange, ExchangeRequest, RegistryLogin};
use crate::types::{Echo, EchoSpec};

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for POST requests matching the exact path
    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.on("POST", path, status, body)
    }

    /// Add a response for DELETE requests matching the exact path
    pub fn on_delete(self, path: &str, status: u16, body: &str) -> Self {
        self.on("DELETE", path, status, body)
    }

    /// Add a response for PATCH requests matching the exact path
    pub fn on_patch(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PATCH", path, status, body)
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();

        // Try exact match first
        if let Some(resp) = responses.get(&(method.to_string(), path.to_string())) {
            return Some(resp.clone());
        }

        // Try prefix match for paths like /api/v1/namespaces/foo
        for ((m, p), resp) in responses.iter() {
            if m == method && path.starts_with(p) {
                return Some(resp.clone());
            }
        }

        None
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<
            dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>>
                + Send,
        >,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        let response = self.find_response(&method, &path);

        Box::pin(async move {
            let (status, body) = response.unwrap_or_else(|| (404, not_found_json("path", &path)));
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

pub fn make_echo(namespace: &str, name: &str, uid: &str) -> Echo {
    Echo {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(uid.to_string()),
            resource_version: Some("1".to_string()),
            ..Default::default()
        },
        spec: EchoSpec {
            message: "hi".to_string(),
        },
        status: None,
    }
}

/// A pod, controlled by `owner` when given
pub fn make_pod(namespace: &str, name: &str, owner: Option<&Echo>) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            owner_references: owner.and_then(|o| o.controller_owner_ref(&())).map(|r| vec![r]),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// A pod whose only container terminated successfully at `finished`
pub fn make_succeeded_pod(
    namespace: &str,
    name: &str,
    owner: Option<&Echo>,
    finished: DateTime<Utc>,
) -> Pod {
    let mut pod = make_pod(namespace, name, owner);
    pod.status = Some(PodStatus {
        phase: Some("Succeeded".to_string()),
        start_time: Some(Time(finished - chrono::Duration::seconds(1))),
        container_statuses: Some(vec![ContainerStatus {
            name: "main".to_string(),
            state: Some(ContainerState {
                terminated: Some(ContainerStateTerminated {
                    exit_code: 0,
                    finished_at: Some(Time(finished)),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]),
        ..Default::default()
    });
    pod
}

/// A well-formed login-source secret for managed secret `target`
pub fn make_login_source_secret(namespace: &str, name: &str, target: &str) -> Secret {
    let source_annotations = BTreeMap::from([
        (annotations::SECRET_NAME.to_string(), target.to_string()),
        (annotations::EMAIL.to_string(), "ops@example.com".to_string()),
        (annotations::ACCOUNT_ID.to_string(), "123456789012".to_string()),
        (annotations::REGION.to_string(), "ap-northeast-1".to_string()),
    ]);
    let data = BTreeMap::from([
        (
            login_data::ACCESS_KEY_ID.to_string(),
            ByteString(b"AKIAEXAMPLE\n".to_vec()),
        ),
        (
            login_data::SECRET_ACCESS_KEY.to_string(),
            ByteString(b"secret-key".to_vec()),
        ),
    ]);

    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([(
                DEFAULT_LOGIN_SOURCE_SELECTOR.0.to_string(),
                DEFAULT_LOGIN_SOURCE_SELECTOR.1.to_string(),
            )])),
            annotations: Some(source_annotations),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    }
}

/// A previously written image pull secret created at `created`
pub fn make_managed_secret(namespace: &str, name: &str, created: DateTime<Utc>) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            creation_timestamp: Some(Time(created)),
            ..Default::default()
        },
        type_: Some("kubernetes.io/dockerconfigjson".to_string()),
        ..Default::default()
    }
}

/// In-memory `ResourceCache`
pub struct FakeCache<K> {
    objects: Mutex<Vec<Arc<K>>>,
}

impl<K: Resource> FakeCache<K> {
    pub fn new(objects: Vec<K>) -> Self {
        Self {
            objects: Mutex::new(objects.into_iter().map(Arc::new).collect()),
        }
    }
}

impl<K: Resource + Send + Sync> ResourceCache<K> for FakeCache<K> {
    fn get(&self, namespace: Option<&str>, name: &str) -> Option<Arc<K>> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.namespace().as_deref() == namespace && o.name_any() == name)
            .cloned()
    }

    fn list(&self) -> Vec<Arc<K>> {
        self.objects.lock().unwrap().clone()
    }
}

/// `ObjectWriter` that records every write and can be told to fail
pub struct RecordingWriter<K> {
    pub created: Mutex<Vec<K>>,
    pub status_updates: Mutex<Vec<K>>,
    pub deleted: Mutex<Vec<String>>,
    /// Ordered log of operations, e.g. `delete ns/a`, `create ns/a`
    pub operations: Mutex<Vec<String>>,
    pub fail_create: AtomicBool,
    pub fail_status: AtomicBool,
    pub fail_delete: AtomicBool,
    /// Keys (`ns/name`) reported as already gone on delete
    pub absent: Mutex<HashSet<String>>,
}

impl<K> Default for RecordingWriter<K> {
    fn default() -> Self {
        Self {
            created: Mutex::new(Vec::new()),
            status_updates: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            operations: Mutex::new(Vec::new()),
            fail_create: AtomicBool::new(false),
            fail_status: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            absent: Mutex::new(HashSet::new()),
        }
    }
}

impl<K: Clone> RecordingWriter<K> {
    pub fn created(&self) -> Vec<K> {
        self.created.lock().unwrap().clone()
    }

    pub fn status_updates(&self) -> Vec<K> {
        self.status_updates.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn operations(&self) -> Vec<String> {
        self.operations.lock().unwrap().clone()
    }
}

fn injected_failure(what: &str) -> TugboatError {
    TugboatError::KubeError(kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("injected {} failure", what),
        reason: "InternalError".to_string(),
        code: 500,
    }))
}

#[async_trait]
impl<K> ObjectWriter<K> for RecordingWriter<K>
where
    K: Resource + Clone + Send + Sync,
{
    async fn create(&self, obj: &K) -> Result<K> {
        let key = format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any());
        self.operations.lock().unwrap().push(format!("create {}", key));
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(injected_failure("create"));
        }
        self.created.lock().unwrap().push(obj.clone());
        Ok(obj.clone())
    }

    async fn update_status(&self, obj: &K) -> Result<K> {
        let key = format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any());
        self.operations.lock().unwrap().push(format!("update_status {}", key));
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(injected_failure("status update"));
        }
        self.status_updates.lock().unwrap().push(obj.clone());
        Ok(obj.clone())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<Deletion> {
        let key = format!("{}/{}", namespace, name);
        self.operations.lock().unwrap().push(format!("delete {}", key));
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(injected_failure("delete"));
        }
        if self.absent.lock().unwrap().contains(&key) {
            return Ok(Deletion::AlreadyAbsent);
        }
        self.deleted.lock().unwrap().push(key);
        Ok(Deletion::Deleted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    /// `namespace/name` of the regarding object
    pub regarding: String,
    pub outcome: Outcome,
    pub reason: String,
    pub note: String,
}

#[derive(Default)]
pub struct RecordingRecorder {
    pub events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingRecorder {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }
}

#[async_trait]
impl EventRecorder for RecordingRecorder {
    async fn record(
        &self,
        regarding: &ObjectReference,
        outcome: Outcome,
        reason: &str,
        note: String,
    ) {
        self.events.lock().unwrap().push(RecordedEvent {
            regarding: format!(
                "{}/{}",
                regarding.namespace.as_deref().unwrap_or_default(),
                regarding.name.as_deref().unwrap_or_default()
            ),
            outcome,
            reason: reason.to_string(),
            note,
        });
    }
}

/// `CredentialExchange` returning a canned login
pub struct FakeExchange {
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<ExchangeRequest>>,
    pub fail: AtomicBool,
    /// Simulated latency of the upstream call
    pub delay: Option<Duration>,
}

impl FakeExchange {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            delay: None,
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for FakeExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialExchange for FakeExchange {
    async fn exchange(&self, request: &ExchangeRequest) -> Result<RegistryLogin> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(TugboatError::ExchangeError("injected exchange failure".to_string()));
        }
        Ok(RegistryLogin {
            server: format!(
                "https://{}.dkr.ecr.{}.amazonaws.com",
                request.account_id, request.region
            ),
            username: "AWS".to_string(),
            password: "fresh-token".to_string(),
            email: String::new(),
        })
    }
}
