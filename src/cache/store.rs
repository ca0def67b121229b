// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The read side of the resource cache as seen by reconcilers.

use kube::core::{Selector, SelectorExt};
use kube::runtime::reflector::{ObjectRef, Store};
use kube::{Resource, ResourceExt};
use std::sync::Arc;

/// Read-only snapshot access to cached objects of one kind.
/// Returned objects are shared with the cache and must not be mutated.
pub trait ResourceCache<K>: Send + Sync {
    fn get(&self, namespace: Option<&str>, name: &str) -> Option<Arc<K>>;

    fn list(&self) -> Vec<Arc<K>>;

    fn list_by_selector(&self, selector: &Selector) -> Vec<Arc<K>>
    where
        K: Resource,
    {
        self.list()
            .into_iter()
            .filter(|obj| selector.matches(obj.labels()))
            .collect()
    }
}

impl<K> ResourceCache<K> for Store<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    fn get(&self, namespace: Option<&str>, name: &str) -> Option<Arc<K>> {
        let mut obj_ref = ObjectRef::<K>::new(name);
        if let Some(namespace) = namespace {
            obj_ref = obj_ref.within(namespace);
        }
        Store::get(self, &obj_ref)
    }

    fn list(&self) -> Vec<Arc<K>> {
        self.state()
    }
}
