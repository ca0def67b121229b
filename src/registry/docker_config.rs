// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! `kubernetes.io/dockerconfigjson` secret encoding

use base64::{engine::general_purpose::STANDARD, Engine};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::RegistryLogin;
use crate::error::Result;

pub const DOCKER_CONFIG_JSON_TYPE: &str = "kubernetes.io/dockerconfigjson";
pub const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";

/// Local docker auth config, keyed by registry server
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DockerConfigJson {
    pub auths: BTreeMap<String, DockerConfigEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct DockerConfigEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub auth: String,
}

impl DockerConfigJson {
    pub fn from_login(login: &RegistryLogin) -> Self {
        let auth = STANDARD.encode(format!("{}:{}", login.username, login.password));
        let entry = DockerConfigEntry {
            username: login.username.clone(),
            password: login.password.clone(),
            email: login.email.clone(),
            auth,
        };

        DockerConfigJson {
            auths: BTreeMap::from([(login.server.clone(), entry)]),
        }
    }
}

/// Build the image pull secret holding `login`
pub fn build_managed_secret(name: &str, namespace: &str, login: &RegistryLogin) -> Result<Secret> {
    let body = serde_json::to_vec(&DockerConfigJson::from_login(login))?;

    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            DOCKER_CONFIG_JSON_KEY.to_string(),
            ByteString(body),
        )])),
        type_: Some(DOCKER_CONFIG_JSON_TYPE.to_string()),
        ..Default::default()
    })
}
