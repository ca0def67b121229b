// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Child pods that were created but are not yet visible in the pod cache.
//!
//! The pod watch can lag behind our own writes. Until it catches up, a
//! redelivered key must not create a second child.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug)]
struct Expected {
    pod: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ChildExpectations {
    ttl: Duration,
    pending: Mutex<HashMap<String, Expected>>,
}

impl ChildExpectations {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn pending_map(&self) -> MutexGuard<'_, HashMap<String, Expected>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Remember that `pod` was created for `key` at `now`
    pub fn expect(&self, key: &str, pod: &str, now: DateTime<Utc>) {
        self.pending_map().insert(
            key.to_string(),
            Expected {
                pod: pod.to_string(),
                created_at: now,
            },
        );
    }

    /// Name of the child created for `key` that the cache has not shown yet.
    /// An entry older than the ttl is dropped, so a child lost before the
    /// cache ever saw it is created again.
    pub fn pending(&self, key: &str, now: DateTime<Utc>) -> Option<String> {
        let mut pending = self.pending_map();
        let expected = pending.get(key)?;

        let age = (now - expected.created_at).to_std().unwrap_or_default();
        if age >= self.ttl {
            pending.remove(key);
            return None;
        }
        Some(expected.pod.clone())
    }

    /// The cache caught up with `key`, or the key is no longer relevant
    pub fn observed(&self, key: &str) {
        self.pending_map().remove(key);
    }
}
