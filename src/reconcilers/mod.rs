// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reconcilers: the echo child lifecycle and image pull secret rotation.

pub mod cleanup;
pub mod credentials;
pub mod echo;
pub mod expectations;
pub mod login_source;
pub mod ownership;

pub use cleanup::ChildCollector;
pub use credentials::{CredentialRotator, RotationSummary};
pub use echo::{build_child_pod, EchoContext, EchoReconciler};
pub use login_source::LoginSource;
