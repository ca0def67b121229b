// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Queue keys of the form `namespace/name` (or `name` for cluster scoped objects).

use crate::error::{Result, TugboatError};
use kube::Resource;

/// Derive the queue key of an object
pub fn object_key<K: Resource>(obj: &K) -> Result<String> {
    let meta = obj.meta();
    let name = meta
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| TugboatError::InvalidKey("object has no name".to_string()))?;

    Ok(match meta.namespace.as_deref().filter(|ns| !ns.is_empty()) {
        Some(namespace) => format!("{}/{}", namespace, name),
        None => name.to_string(),
    })
}

/// Split a queue key into its namespace and name
pub fn split_key(key: &str) -> Result<(Option<&str>, &str)> {
    let parts: Vec<&str> = key.split('/').collect();
    match parts.as_slice() {
        [name] if !name.is_empty() => Ok((None, *name)),
        [namespace, name] if !name.is_empty() => {
            Ok(((!namespace.is_empty()).then_some(*namespace), *name))
        }
        _ => Err(TugboatError::InvalidKey(format!(
            "unexpected key format: '{}'",
            key
        ))),
    }
}
