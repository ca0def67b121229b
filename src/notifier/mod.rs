// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Change notifier - turns watch notifications into queue keys.

pub mod diff;

use kube::{Resource, ResourceExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::cache::{object_key, Deleted, WatchEvent};
use crate::error::{Result, TugboatError};
use crate::queue::WorkQueue;

pub use diff::structural_diff;

/// Enqueues the key of every added object and of every update that changed
/// the object. Deletions are logged only.
pub struct ChangeNotifier {
    queue: WorkQueue<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Added,
    Updated,
    Deleted,
}

impl ChangeNotifier {
    pub fn new(queue: WorkQueue<String>) -> Self {
        Self { queue }
    }

    /// Consume notifications until the sending watch stops
    pub async fn run<K>(self, mut events: mpsc::Receiver<WatchEvent<K>>) -> anyhow::Result<()>
    where
        K: Resource + Serialize,
    {
        info!("Change notifier started");

        while let Some(event) = events.recv().await {
            self.handle(event);
        }

        info!("Change notifier stopped");
        Ok(())
    }

    pub fn handle<K>(&self, event: WatchEvent<K>)
    where
        K: Resource + Serialize,
    {
        match event {
            WatchEvent::Added(obj) => self.on_add(obj.as_ref()),
            WatchEvent::Updated { before, after } => {
                self.on_update(before.as_ref(), after.as_ref())
            }
            WatchEvent::Deleted(deleted) => self.on_delete(&deleted),
        }
    }

    pub fn on_add<K: Resource>(&self, obj: &K) {
        self.try_to_handle(Some(obj), Change::Added);
    }

    pub fn on_update<K: Resource + Serialize>(&self, before: &K, after: &K) {
        match structural_diff(before, after) {
            Ok(paths) if paths.is_empty() => {}
            Ok(paths) => {
                debug!("Changed fields of {}: {}", after.name_any(), paths.join(", "));
                self.try_to_handle(Some(after), Change::Updated);
            }
            Err(e) => error!("Failed to compare object versions: {}", e),
        }
    }

    pub fn on_delete<K: Resource>(&self, deleted: &Deleted<K>) {
        let obj = match deleted {
            Deleted::Object(obj) => Some(obj.as_ref()),
            Deleted::FinalStateUnknown { last_known } => {
                let recovered = last_known.as_deref();
                if let Some(obj) = recovered {
                    debug!(
                        "Recovered deleted object {}/{} from tombstone",
                        obj.namespace().unwrap_or_default(),
                        obj.name_any()
                    );
                }
                recovered
            }
        };
        self.try_to_handle(obj, Change::Deleted);
    }

    fn try_to_handle<K: Resource>(&self, obj: Option<&K>, change: Change) {
        if let Err(e) = self.handle_object(obj, change) {
            error!("Failed to handle {:?} notification: {}", change, e);
        }
    }

    fn handle_object<K: Resource>(&self, obj: Option<&K>, change: Change) -> Result<()> {
        let obj = obj.ok_or_else(|| {
            TugboatError::InvalidKey("tombstone does not hold a last known object".to_string())
        })?;
        let key = object_key(obj)?;

        debug!("{:?} object {}", change, key);
        if change == Change::Deleted {
            // Children are removed through their owner references
            return Ok(());
        }

        debug!("Enqueue object {} to work queue", key);
        self.queue.add(key);
        Ok(())
    }
}
