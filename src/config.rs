// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{bail, Context, Result};
use kube::core::{Expression, Selector};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{child, DEFAULT_LOGIN_SOURCE_SELECTOR};

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Namespace to watch, all namespaces when unset
    pub namespace: Option<String>,
    /// Image used by child pods
    pub child_image: String,
    /// How long a succeeded child pod is kept before the sweep removes it
    pub child_retention: Duration,
    pub cleanup_interval: Duration,
    pub rotation_interval: Duration,
    /// Maximum age of a managed image pull secret
    pub credential_expiration: Duration,
    /// Equality selector identifying login-source secrets
    pub login_source_selector: Selector,
    pub cache_sync_timeout: Duration,
    pub queue_base_delay: Duration,
    pub queue_max_delay: Duration,
    pub probe_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            namespace: None,
            child_image: child::DEFAULT_IMAGE.to_string(),
            child_retention: Duration::from_secs(180),
            cleanup_interval: Duration::from_secs(10),
            rotation_interval: Duration::from_secs(60),
            credential_expiration: Duration::from_secs(6 * 60 * 60),
            login_source_selector: default_login_source_selector(),
            cache_sync_timeout: Duration::from_secs(120),
            queue_base_delay: Duration::from_millis(5),
            queue_max_delay: Duration::from_secs(1000),
            probe_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let namespace = env::var("WATCH_NAMESPACE").ok().filter(|ns| !ns.is_empty());
        let child_image = env::var("CHILD_IMAGE").unwrap_or(defaults.child_image);

        let login_source_selector = match env::var("LOGIN_SOURCE_SELECTOR") {
            Ok(raw) => parse_selector(&raw).context("Invalid LOGIN_SOURCE_SELECTOR")?,
            Err(_) => defaults.login_source_selector,
        };

        let probe_addr = match env::var("PROBE_ADDR") {
            Ok(raw) => SocketAddr::from_str(&raw).context("Invalid PROBE_ADDR")?,
            Err(_) => defaults.probe_addr,
        };

        Ok(Config {
            namespace,
            child_image,
            child_retention: secs_from_env("CHILD_RETENTION_SECS", defaults.child_retention)?,
            cleanup_interval: secs_from_env("CLEANUP_INTERVAL_SECS", defaults.cleanup_interval)?,
            rotation_interval: secs_from_env("ROTATION_INTERVAL_SECS", defaults.rotation_interval)?,
            credential_expiration: secs_from_env(
                "CREDENTIAL_EXPIRATION_SECS",
                defaults.credential_expiration,
            )?,
            login_source_selector,
            cache_sync_timeout: secs_from_env(
                "CACHE_SYNC_TIMEOUT_SECS",
                defaults.cache_sync_timeout,
            )?,
            queue_base_delay: match env::var("QUEUE_BASE_DELAY_MS") {
                Ok(raw) => Duration::from_millis(
                    parse_positive(&raw).context("Invalid QUEUE_BASE_DELAY_MS")?,
                ),
                Err(_) => defaults.queue_base_delay,
            },
            queue_max_delay: secs_from_env("QUEUE_MAX_DELAY_SECS", defaults.queue_max_delay)?,
            probe_addr,
        })
    }
}

fn default_login_source_selector() -> Selector {
    let (key, value) = DEFAULT_LOGIN_SOURCE_SELECTOR;
    std::iter::once(Expression::Equal(key.to_string(), value.to_string())).collect()
}

fn secs_from_env(name: &str, default: Duration) -> Result<Duration> {
    match env::var(name) {
        Ok(raw) => parse_positive(&raw)
            .map(Duration::from_secs)
            .with_context(|| format!("Invalid {}", name)),
        Err(_) => Ok(default),
    }
}

fn parse_positive(raw: &str) -> Result<u64> {
    let value: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("'{}' is not a number", raw))?;
    if value == 0 {
        bail!("value must be greater than zero");
    }
    Ok(value)
}

/// Parse an equality-based label selector such as `a=b,c=d`
pub fn parse_selector(raw: &str) -> Result<Selector> {
    let mut expressions = Vec::new();

    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((key, value)) = part.split_once('=') else {
            bail!("selector term '{}' is not of the form key=value", part);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("selector term '{}' has an empty key", part);
        }
        expressions.push(Expression::Equal(key.to_string(), value.trim().to_string()));
    }

    if expressions.is_empty() {
        bail!("selector must contain at least one key=value term");
    }

    Ok(expressions.into_iter().collect())
}
