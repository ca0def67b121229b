// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! AWS ECR credential exchange via `GetAuthorizationToken`.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_sdk_ecr::error::DisplayErrorContext;
use aws_sdk_ecr::Client as EcrClient;
use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::{debug, instrument};

use super::{CredentialExchange, ExchangeRequest, RegistryLogin};
use crate::constants::CONTROLLER_NAME;
use crate::error::{Result, TugboatError};

/// ECR always issues tokens for this user
const REGISTRY_USERNAME: &str = "AWS";

/// Exchanges a static access-key pair for an ECR login
#[derive(Debug, Default, Clone)]
pub struct EcrExchange;

impl EcrExchange {
    pub fn new() -> Self {
        Self
    }

    async fn sdk_config(request: &ExchangeRequest) -> SdkConfig {
        let credentials = Credentials::new(
            request.access_key_id.clone(),
            request.secret_access_key.clone(),
            None,
            None,
            CONTROLLER_NAME,
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(request.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = request.endpoint.as_deref() {
            loader = loader.endpoint_url(endpoint);
        }

        loader.load().await
    }
}

#[async_trait]
impl CredentialExchange for EcrExchange {
    #[instrument(skip(self, request), fields(account = %request.account_id, region = %request.region))]
    async fn exchange(&self, request: &ExchangeRequest) -> Result<RegistryLogin> {
        if request.region.is_empty()
            || request.access_key_id.is_empty()
            || request.secret_access_key.is_empty()
        {
            return Err(TugboatError::ExchangeError(
                "region, access key id and secret access key are required".to_string(),
            ));
        }

        let client = EcrClient::new(&Self::sdk_config(request).await);
        // The token is issued for the default registry of the authenticated account
        let output = client
            .get_authorization_token()
            .send()
            .await
            .map_err(|e| TugboatError::ExchangeError(DisplayErrorContext(&e).to_string()))?;

        let token = output
            .authorization_data()
            .first()
            .and_then(|data| data.authorization_token())
            .ok_or_else(|| {
                TugboatError::ExchangeError("no authorization token returned by ECR".to_string())
            })?;

        let password = parse_authorization_token(token)?;
        debug!("Obtained ECR authorization token");

        Ok(RegistryLogin {
            server: registry_server(&request.account_id, &request.region),
            username: REGISTRY_USERNAME.to_string(),
            password,
            email: String::new(),
        })
    }
}

pub fn registry_server(account_id: &str, region: &str) -> String {
    format!("https://{}.dkr.ecr.{}.amazonaws.com", account_id, region)
}

/// Tokens are base64 encoded `user:password`
fn parse_authorization_token(token: &str) -> Result<String> {
    let decoded = STANDARD
        .decode(token.trim())
        .map_err(|e| TugboatError::ExchangeError(format!("malformed authorization token: {}", e)))?;
    let decoded = String::from_utf8(decoded).map_err(|e| {
        TugboatError::ExchangeError(format!("authorization token is not UTF-8: {}", e))
    })?;

    match decoded.split_once(':') {
        Some((_, password)) if !password.is_empty() => Ok(password.to_string()),
        _ => Err(TugboatError::ExchangeError(
            "failed to parse authorization token".to_string(),
        )),
    }
}
