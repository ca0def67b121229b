// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Extraction of registry login parameters from a login-source secret.

use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;

use crate::constants::{annotations, login_data};
use crate::error::{Result, TugboatError};
use crate::registry::ExchangeRequest;

/// Everything needed to maintain one managed image pull secret
#[derive(Clone, PartialEq, Eq)]
pub struct LoginSource {
    pub namespace: String,
    /// Name of the managed secret, in the login source's namespace
    pub secret_name: String,
    pub email: String,
    pub account_id: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for LoginSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginSource")
            .field("namespace", &self.namespace)
            .field("secret_name", &self.secret_name)
            .field("email", &self.email)
            .field("account_id", &self.account_id)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl LoginSource {
    pub fn from_secret(secret: &Secret) -> Result<Self> {
        let namespace = secret.namespace().ok_or_else(|| {
            TugboatError::InvalidLoginSource(format!(
                "secret {} has no namespace",
                secret.name_any()
            ))
        })?;

        Ok(LoginSource {
            namespace,
            secret_name: required_annotation(secret, annotations::SECRET_NAME)?,
            email: optional_annotation(secret, annotations::EMAIL).unwrap_or_default(),
            account_id: required_annotation(secret, annotations::ACCOUNT_ID)?,
            region: required_annotation(secret, annotations::REGION)?,
            endpoint: optional_annotation(secret, annotations::ENDPOINT),
            access_key_id: required_data(secret, login_data::ACCESS_KEY_ID)?,
            secret_access_key: required_data(secret, login_data::SECRET_ACCESS_KEY)?,
        })
    }

    pub fn exchange_request(&self) -> ExchangeRequest {
        ExchangeRequest {
            account_id: self.account_id.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
        }
    }
}

fn optional_annotation(secret: &Secret, key: &str) -> Option<String> {
    secret
        .annotations()
        .get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required_annotation(secret: &Secret, key: &str) -> Result<String> {
    optional_annotation(secret, key).ok_or_else(|| {
        TugboatError::InvalidLoginSource(format!(
            "secret {} is missing annotation {}",
            secret.name_any(),
            key
        ))
    })
}

/// Secret data arrives base64 decoded from the API, it only needs to be valid UTF-8
fn required_data(secret: &Secret, key: &str) -> Result<String> {
    let raw = secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .ok_or_else(|| {
            TugboatError::InvalidLoginSource(format!(
                "secret {} is missing data field {}",
                secret.name_any(),
                key
            ))
        })?;

    let value = std::str::from_utf8(&raw.0).map_err(|_| {
        TugboatError::InvalidLoginSource(format!(
            "data field {} of secret {} is not valid UTF-8",
            key,
            secret.name_any()
        ))
    })?;

    let value = value.trim();
    if value.is_empty() {
        return Err(TugboatError::InvalidLoginSource(format!(
            "data field {} of secret {} is empty",
            key,
            secret.name_any()
        )));
    }
    Ok(value.to_string())
}
