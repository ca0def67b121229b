// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

/// Kubernetes annotation keys read from login-source secrets
pub mod annotations {
    /// Name of the managed image pull secret to maintain
    pub const SECRET_NAME: &str = "tugboat.dev/secret-name";
    /// Email recorded in the docker config entry
    pub const EMAIL: &str = "tugboat.dev/email";
    /// Registry account id (AWS account)
    pub const ACCOUNT_ID: &str = "tugboat.dev/account-id";
    /// Registry region
    pub const REGION: &str = "tugboat.dev/region";
    /// Optional endpoint override for the credential exchange
    pub const ENDPOINT: &str = "tugboat.dev/endpoint";
}

/// Data keys holding the upstream access-key pair
pub mod login_data {
    pub const ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
    pub const SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
}

/// The controller name used as event reporter
pub const CONTROLLER_NAME: &str = "tugboat";

/// Default label (key, value) identifying login-source secrets
pub const DEFAULT_LOGIN_SOURCE_SELECTOR: (&str, &str) = ("tugboat.dev/login-source", "ecr");

/// Upper bound for a single upstream credential exchange
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a created child pod may stay invisible in the pod cache before
/// the echo is allowed another one
pub const CHILD_EXPECTATION_TTL: Duration = Duration::from_secs(5 * 60);

/// Capacity of the channel between a watch bridge and its notifier
pub const WATCH_EVENT_BUFFER: usize = 256;

/// Child pod defaults
pub mod child {
    pub const CONTAINER_NAME: &str = "main";
    pub const DEFAULT_IMAGE: &str = "gcr.io/distroless/static-debian11:debug-amd64";
    pub const SUCCEEDED_PHASE: &str = "Succeeded";
}

/// Event reasons
pub mod reasons {
    pub const SUCCESSFUL_CREATE: &str = "SuccessfulCreate";
    pub const SUCCESSFUL_DELETE: &str = "SuccessfulDelete";
    pub const FAILED_CREATE: &str = "FailedCreate";
    pub const FAILED_DELETE: &str = "FailedDelete";
    pub const INVALID_LOGIN_SOURCE: &str = "InvalidLoginSource";
    pub const ROTATION_FAILED: &str = "RotationFailed";
}

/// CRD polling configuration
pub mod crd {
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}
