// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Credential rotation - keeps the image pull secret of every login source fresh.

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Secret;
use kube::core::Selector;
use kube::{Resource, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument};

use super::login_source::LoginSource;
use crate::cache::ResourceCache;
use crate::constants::{reasons, EXCHANGE_TIMEOUT};
use crate::error::{Result, TugboatError};
use crate::kubernetes::{Deletion, EventRecorder, ObjectWriter, Outcome};
use crate::registry::{build_managed_secret, CredentialExchange};

/// Outcome of one rotation sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RotationSummary {
    /// Managed secrets still within their expiration window
    pub fresh: usize,
    pub rotated: usize,
    pub failed: usize,
}

pub struct CredentialRotator {
    secrets: Arc<dyn ResourceCache<Secret>>,
    secret_writer: Arc<dyn ObjectWriter<Secret>>,
    exchange: Arc<dyn CredentialExchange>,
    recorder: Arc<dyn EventRecorder>,
    selector: Selector,
    expiration: Duration,
}

impl CredentialRotator {
    pub fn new(
        secrets: Arc<dyn ResourceCache<Secret>>,
        secret_writer: Arc<dyn ObjectWriter<Secret>>,
        exchange: Arc<dyn CredentialExchange>,
        recorder: Arc<dyn EventRecorder>,
        selector: Selector,
        expiration: Duration,
    ) -> Self {
        Self {
            secrets,
            secret_writer,
            exchange,
            recorder,
            selector,
            expiration,
        }
    }

    pub async fn rotate(&self) -> RotationSummary {
        self.rotate_at(Utc::now()).await
    }

    /// One sweep over all login sources as of `now`. A failing login source
    /// is reported and does not affect the others.
    #[instrument(skip(self))]
    pub async fn rotate_at(&self, now: DateTime<Utc>) -> RotationSummary {
        let mut summary = RotationSummary::default();

        for source_secret in self.secrets.list_by_selector(&self.selector) {
            let regarding = source_secret.object_ref(&());

            let source = match LoginSource::from_secret(&source_secret) {
                Ok(source) => source,
                Err(e) => {
                    error!("Skipping login source: {}", e);
                    self.recorder
                        .record(
                            &regarding,
                            Outcome::Failure,
                            reasons::INVALID_LOGIN_SOURCE,
                            e.to_string(),
                        )
                        .await;
                    summary.failed += 1;
                    continue;
                }
            };

            let current = self.secrets.get(Some(&source.namespace), &source.secret_name);
            if current.is_some_and(|s| is_fresh(&s, now, self.expiration)) {
                debug!(
                    "Image pull secret {}/{} is still fresh",
                    source.namespace, source.secret_name
                );
                summary.fresh += 1;
                continue;
            }

            match self.replace(&source).await {
                Ok(()) => {
                    self.recorder
                        .record(
                            &regarding,
                            Outcome::Success,
                            reasons::SUCCESSFUL_CREATE,
                            format!("Rotated image pull secret: {}", source.secret_name),
                        )
                        .await;
                    summary.rotated += 1;
                }
                Err(e) => {
                    error!(
                        "Failed to rotate image pull secret {}/{}: {}",
                        source.namespace, source.secret_name, e
                    );
                    self.recorder
                        .record(
                            &regarding,
                            Outcome::Failure,
                            reasons::ROTATION_FAILED,
                            format!(
                                "Error rotating image pull secret {}: {}",
                                source.secret_name, e
                            ),
                        )
                        .await;
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    /// Exchange the upstream credentials, then delete and recreate the managed secret
    async fn replace(&self, source: &LoginSource) -> Result<()> {
        let request = source.exchange_request();
        let mut login = timeout(EXCHANGE_TIMEOUT, self.exchange.exchange(&request))
            .await
            .map_err(|_| TugboatError::ExchangeTimeout(EXCHANGE_TIMEOUT))??;
        login.email = source.email.clone();

        let secret = build_managed_secret(&source.secret_name, &source.namespace, &login)?;

        match self
            .secret_writer
            .delete(&source.namespace, &source.secret_name)
            .await?
        {
            Deletion::Deleted => {
                info!(
                    "Deleted expired image pull secret {}/{}",
                    source.namespace, source.secret_name
                );
                self.recorder
                    .record(
                        &secret.object_ref(&()),
                        Outcome::Success,
                        reasons::SUCCESSFUL_DELETE,
                        format!("Deleted expired image pull secret: {}", source.secret_name),
                    )
                    .await;
            }
            Deletion::AlreadyAbsent => debug!(
                "Image pull secret {}/{} did not exist",
                source.namespace, source.secret_name
            ),
        }

        self.secret_writer.create(&secret).await?;
        info!(
            "Created image pull secret {}/{} for {}",
            source.namespace, source.secret_name, login.server
        );
        Ok(())
    }
}

/// Created less than `expiration` before `now`
fn is_fresh(secret: &Secret, now: DateTime<Utc>, expiration: Duration) -> bool {
    let Some(created) = secret.creation_timestamp() else {
        return false;
    };

    match (now - created.0).to_std() {
        Ok(age) => age < expiration,
        // Created in the future, clocks disagree
        Err(_) => true,
    }
}
