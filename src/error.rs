// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TugboatError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid resource key: {0}")]
    InvalidKey(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid object: {0}")]
    InvalidObject(String),

    #[error("Invalid login source: {0}")]
    InvalidLoginSource(String),

    #[error("Credential exchange failed: {0}")]
    ExchangeError(String),

    #[error("Credential exchange timed out after {0:?}")]
    ExchangeTimeout(Duration),

    #[error("Cache sync failed: {0}")]
    CacheSyncError(String),

    #[error("Shutdown requested")]
    ShuttingDown,
}

impl TugboatError {
    /// Errors caused by input that will never succeed on retry
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            TugboatError::InvalidKey(_)
                | TugboatError::InvalidObject(_)
                | TugboatError::InvalidLoginSource(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TugboatError>;
