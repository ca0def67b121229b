// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Read-only views of the locally cached cluster state, and the watch
//! bridge that keeps them populated.

pub mod keys;
pub mod store;
pub mod watch;

pub use keys::{object_key, split_key};
pub use store::ResourceCache;
pub use watch::{reflect, Deleted, WatchEvent};
