// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Control loop driver: starts the watches and loops and stops them on shutdown.

pub mod manager;
pub mod periodic;
pub mod shutdown;

pub use manager::ControllerManager;
pub use periodic::run_periodically;
pub use shutdown::{channel, install_signal_handler, Shutdown, ShutdownTrigger};
