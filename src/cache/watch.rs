// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Watch bridge: feeds a reflector store from a watch stream and turns the
//! stream into typed add/update/delete notifications.
//!
//! A notification is only sent once the store reflects it, so a reconciler
//! that re-reads the cache never observes state older than the event.

use futures::StreamExt;
use kube::runtime::reflector::{self, store::Writer, ObjectRef, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Resource};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::controllers::Shutdown;

/// A change observed on a watched object
#[derive(Debug, Clone)]
pub enum WatchEvent<K> {
    Added(Arc<K>),
    Updated { before: Arc<K>, after: Arc<K> },
    Deleted(Deleted<K>),
}

/// A deleted object, or the last known state of an object whose deletion
/// was missed while the watch was re-listing
#[derive(Debug, Clone)]
pub enum Deleted<K> {
    Object(Arc<K>),
    FinalStateUnknown { last_known: Option<Arc<K>> },
}

struct Relist<K: Resource<DynamicType = ()> + 'static> {
    previous: HashMap<ObjectRef<K>, Arc<K>>,
    seen: HashSet<ObjectRef<K>>,
    pending: Vec<WatchEvent<K>>,
}

pub(crate) struct Bridge<K: Resource<DynamicType = ()> + Clone + 'static> {
    reader: Store<K>,
    writer: Writer<K>,
    relist: Option<Relist<K>>,
}

impl<K> Bridge<K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    pub(crate) fn new() -> Self {
        let (reader, writer) = reflector::store();
        Self {
            reader,
            writer,
            relist: None,
        }
    }

    pub(crate) fn reader(&self) -> Store<K> {
        self.reader.clone()
    }

    /// Apply a watcher event to the store and return the notifications it produces
    pub(crate) fn apply(&mut self, event: watcher::Event<K>) -> Vec<WatchEvent<K>> {
        match &event {
            watcher::Event::Init => {
                let previous = self
                    .reader
                    .state()
                    .into_iter()
                    .map(|obj| (ObjectRef::from_obj(obj.as_ref()), obj))
                    .collect();
                self.relist = Some(Relist {
                    previous,
                    seen: HashSet::new(),
                    pending: Vec::new(),
                });
                self.writer.apply_watcher_event(&event);
                Vec::new()
            }
            watcher::Event::InitApply(obj) => {
                self.writer.apply_watcher_event(&event);
                let obj_ref = ObjectRef::from_obj(obj);
                let after = Arc::new(obj.clone());
                if let Some(relist) = self.relist.as_mut() {
                    let notification = match relist.previous.get(&obj_ref) {
                        Some(before) => WatchEvent::Updated {
                            before: Arc::clone(before),
                            after,
                        },
                        None => WatchEvent::Added(after),
                    };
                    relist.seen.insert(obj_ref);
                    // Held back until the listing is committed to the store
                    relist.pending.push(notification);
                }
                Vec::new()
            }
            watcher::Event::InitDone => {
                self.writer.apply_watcher_event(&event);
                let Some(relist) = self.relist.take() else {
                    return Vec::new();
                };
                let mut notifications = relist.pending;
                for (obj_ref, last_known) in relist.previous {
                    if !relist.seen.contains(&obj_ref) {
                        notifications.push(WatchEvent::Deleted(Deleted::FinalStateUnknown {
                            last_known: Some(last_known),
                        }));
                    }
                }
                notifications
            }
            watcher::Event::Apply(obj) => {
                let before = self.reader.get(&ObjectRef::from_obj(obj));
                self.writer.apply_watcher_event(&event);
                let after = Arc::new(obj.clone());
                vec![match before {
                    Some(before) => WatchEvent::Updated { before, after },
                    None => WatchEvent::Added(after),
                }]
            }
            watcher::Event::Delete(obj) => {
                self.writer.apply_watcher_event(&event);
                vec![WatchEvent::Deleted(Deleted::Object(Arc::new(obj.clone())))]
            }
        }
    }
}

/// Start caching objects served by `api`. Returns the store and the future
/// that drives the watch; notifications go to `events` when given.
pub fn reflect<K>(
    api: Api<K>,
    config: watcher::Config,
    events: Option<mpsc::Sender<WatchEvent<K>>>,
    mut shutdown: Shutdown,
) -> (Store<K>, impl Future<Output = ()> + Send)
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    let mut bridge = Bridge::new();
    let store = bridge.reader();
    let kind = K::kind(&()).to_string();

    let driver = async move {
        info!(kind = %kind, "Starting watch");
        let mut stream = watcher(api, config).default_backoff().boxed();

        loop {
            let next = tokio::select! {
                _ = shutdown.wait() => break,
                next = stream.next() => next,
            };
            let Some(result) = next else { break };

            match result {
                Ok(event) => {
                    for notification in bridge.apply(event) {
                        let Some(tx) = events.as_ref() else { continue };
                        if tx.send(notification).await.is_err() {
                            debug!(kind = %kind, "Notification receiver closed");
                        }
                    }
                }
                Err(e) => warn!(kind = %kind, "Watch error: {}", e),
            }
        }

        info!(kind = %kind, "Watch stopped");
    };

    (store, driver)
}
