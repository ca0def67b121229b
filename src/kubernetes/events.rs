// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Event recording for actions taken on behalf of an owning object.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

use crate::constants::CONTROLLER_NAME;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// Records events attached to an object. Recording is best effort and never fails the caller.
#[async_trait]
pub trait EventRecorder: Send + Sync {
    async fn record(
        &self,
        regarding: &ObjectReference,
        outcome: Outcome,
        reason: &str,
        note: String,
    );
}

/// `EventRecorder` publishing `events.k8s.io` events
pub struct KubeEventRecorder {
    recorder: Recorder,
}

impl KubeEventRecorder {
    pub fn new(client: Client) -> Self {
        let reporter = Reporter {
            controller: CONTROLLER_NAME.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventRecorder for KubeEventRecorder {
    async fn record(
        &self,
        regarding: &ObjectReference,
        outcome: Outcome,
        reason: &str,
        note: String,
    ) {
        let event = Event {
            type_: match outcome {
                Outcome::Success => EventType::Normal,
                Outcome::Failure => EventType::Warning,
            },
            reason: reason.to_string(),
            note: Some(note),
            action: reason.to_string(),
            secondary: None,
        };

        if let Err(e) = self.recorder.publish(&event, regarding).await {
            warn!(
                "Failed to record event {} for {}/{}: {}",
                reason,
                regarding.namespace.as_deref().unwrap_or_default(),
                regarding.name.as_deref().unwrap_or_default(),
                e
            );
        }
    }
}
