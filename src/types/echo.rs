// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Desired state of an Echo: a message a child pod prints once.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[kube(group = "tugboat.dev", version = "v1", kind = "Echo", plural = "echoes")]
#[kube(namespaced)]
#[kube(status = "EchoStatus")]
#[serde(rename_all = "camelCase")]
pub struct EchoSpec {
    /// Message to emit
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EchoStatus {
    #[serde(default)]
    pub succeeded: bool,
}

impl Echo {
    /// Whether a child pod has already been created for this echo
    pub fn is_succeeded(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.succeeded)
    }

    /// Deep copy of this echo with its status marked as succeeded
    pub fn with_succeeded(&self) -> Echo {
        let mut copy = self.clone();
        copy.status.get_or_insert_with(EchoStatus::default).succeeded = true;
        copy
    }
}
