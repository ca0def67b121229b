// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Writes against the API server. Reads always go through the cache.

use crate::error::Result;
use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{DeleteParams, Patch, PatchParams, PostParams},
    Api, Client, Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use std::marker::PhantomData;
use tracing::{debug, instrument};

/// Result of a delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    Deleted,
    /// The object was already gone
    AlreadyAbsent,
}

/// Create, status update and delete of namespaced objects of one kind
#[async_trait]
pub trait ObjectWriter<K>: Send + Sync
where
    K: Send + Sync,
{
    async fn create(&self, obj: &K) -> Result<K>;

    /// Write the status of `obj`, guarded by its resource version
    async fn update_status(&self, obj: &K) -> Result<K>;

    async fn delete(&self, namespace: &str, name: &str) -> Result<Deletion>;
}

/// `ObjectWriter` backed by the Kubernetes API
pub struct KubeWriter<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeWriter<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

impl<K> KubeWriter<K>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
{
    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl<K> ObjectWriter<K> for KubeWriter<K>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Serialize
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static,
{
    #[instrument(skip(self, obj), fields(object = %format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any())))]
    async fn create(&self, obj: &K) -> Result<K> {
        let namespace = obj.namespace().unwrap_or_default();
        let created = self.api(&namespace).create(&PostParams::default(), obj).await?;
        debug!("Created {} {}/{}", K::kind(&()), namespace, created.name_any());
        Ok(created)
    }

    #[instrument(skip(self, obj), fields(object = %format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any())))]
    async fn update_status(&self, obj: &K) -> Result<K> {
        let namespace = obj.namespace().unwrap_or_default();
        let value = serde_json::to_value(obj)?;
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": obj.resource_version() },
            "status": value.get("status"),
        });

        let updated = self
            .api(&namespace)
            .patch_status(&obj.name_any(), &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn delete(&self, namespace: &str, name: &str) -> Result<Deletion> {
        match self.api(namespace).delete(name, &DeleteParams::background()).await {
            Ok(_) => Ok(Deletion::Deleted),
            Err(kube::Error::Api(err)) if err.code == 404 => {
                debug!("{} {}/{} already deleted", K::kind(&()), namespace, name);
                Ok(Deletion::AlreadyAbsent)
            }
            Err(e) => Err(e.into()),
        }
    }
}
