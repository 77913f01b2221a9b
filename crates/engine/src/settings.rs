// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent settings materialization.
//!
//! Settings arrive as an ordered list of JSON fragments (global, then rig,
//! then agent). Top-level keys replace wholesale; the `hooks` object merges
//! per hook type with arrays appended in layer order; an explicit `null`
//! suppresses the key at its scope. The merge is a small algebra over
//! `serde_json::Value`, not a schema.

use serde_json::{Map, Value};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings layer {index} is not valid JSON: {detail}")]
    Parse { index: usize, detail: String },
    #[error("settings layer {index} is not a JSON object")]
    NotObject { index: usize },
    #[error("settings write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Merge JSON fragment layers into one settings document.
///
/// Empty and null layers are skipped; a parse error in any layer is fatal:
/// an agent must not start with half its hooks.
pub fn materialize_settings(layers: &[&str]) -> Result<Value, SettingsError> {
    let mut merged: Option<Map<String, Value>> = None;
    for (index, layer) in layers.iter().enumerate() {
        if layer.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(layer)
            .map_err(|e| SettingsError::Parse { index, detail: e.to_string() })?;
        if value.is_null() {
            continue;
        }
        let Value::Object(object) = value else {
            return Err(SettingsError::NotObject { index });
        };
        merged = Some(match merged {
            // First layer is the base, taken verbatim.
            None => object,
            Some(base) => merge_top(base, object),
        });
    }
    Ok(Value::Object(merged.unwrap_or_default()))
}

/// Merge one layer into the accumulated document.
fn merge_top(mut base: Map<String, Value>, layer: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in layer {
        if value.is_null() {
            base.remove(&key);
            continue;
        }
        if key == "hooks" {
            if let (Some(Value::Object(existing)), Value::Object(incoming)) =
                (base.get_mut("hooks"), &value)
            {
                merge_hooks(existing, incoming.clone());
                continue;
            }
        }
        base.insert(key, value);
    }
    base
}

/// Merge a `hooks` object: per hook type, arrays append in layer order,
/// null suppresses, anything else overrides wholesale.
fn merge_hooks(base: &mut Map<String, Value>, layer: Map<String, Value>) {
    for (hook_type, value) in layer {
        if value.is_null() {
            base.remove(&hook_type);
            continue;
        }
        match (base.get_mut(&hook_type), value) {
            (Some(Value::Array(existing)), Value::Array(mut incoming)) => {
                existing.append(&mut incoming);
            }
            (_, value) => {
                base.insert(hook_type, value);
            }
        }
    }
}

/// Write the merged document to `{settings_dir}/settings.json`, mode 0600,
/// with a trailing newline.
pub fn write_settings(settings_dir: &Path, value: &Value) -> Result<(), SettingsError> {
    std::fs::create_dir_all(settings_dir)?;
    let path = settings_dir.join("settings.json");
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    let mut body = serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string());
    body.push('\n');
    file.write_all(body.as_bytes())?;
    Ok(())
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
