// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Registry logins: exchanging upstream credentials and encoding them as
//! image pull secrets.

pub mod docker_config;
pub mod ecr;

use async_trait::async_trait;

use crate::error::Result;

pub use docker_config::{build_managed_secret, DockerConfigJson};
pub use ecr::EcrExchange;

/// Parameters of one credential exchange
#[derive(Clone, PartialEq, Eq)]
pub struct ExchangeRequest {
    pub account_id: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for ExchangeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeRequest")
            .field("account_id", &self.account_id)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

/// A short-lived registry login
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryLogin {
    pub server: String,
    pub username: String,
    pub password: String,
    pub email: String,
}

impl std::fmt::Debug for RegistryLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryLogin")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Exchanges long-lived upstream credentials for a registry login.
/// The returned login carries an empty email, the caller fills it in.
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    async fn exchange(&self, request: &ExchangeRequest) -> Result<RegistryLogin>;
}
