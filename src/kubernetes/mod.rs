// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for CRD discovery, object writes, and event recording.

pub mod crd;
pub mod events;
pub mod writer;

pub use crd::wait_for_echo_crd;
pub use events::{EventRecorder, KubeEventRecorder, Outcome};
pub use writer::{Deletion, KubeWriter, ObjectWriter};
