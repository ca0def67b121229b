// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Structural comparison of two object snapshots.

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// Paths (`metadata.labels.app`, `spec.containers[0].image`, ...) whose values
/// differ between `before` and `after`. Empty when the objects are equal.
pub fn structural_diff<K: Serialize>(before: &K, after: &K) -> Result<Vec<String>> {
    let before = serde_json::to_value(before)?;
    let after = serde_json::to_value(after)?;

    let mut paths = Vec::new();
    collect(&before, &after, String::new(), &mut paths);
    Ok(paths)
}

fn collect(before: &Value, after: &Value, path: String, out: &mut Vec<String>) {
    match (before, after) {
        (Value::Object(a), Value::Object(b)) => {
            for (key, value) in a {
                let child = join(&path, key);
                match b.get(key) {
                    Some(other) => collect(value, other, child, out),
                    None => out.push(child),
                }
            }
            for key in b.keys().filter(|k| !a.contains_key(*k)) {
                out.push(join(&path, key));
            }
        }
        (Value::Array(a), Value::Array(b)) if a.len() == b.len() => {
            for (i, (x, y)) in a.iter().zip(b).enumerate() {
                collect(x, y, format!("{}[{}]", path, i), out);
            }
        }
        (a, b) if a == b => {}
        _ => out.push(if path.is_empty() { ".".to_string() } else { path }),
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}
