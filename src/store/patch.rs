//! Partial control updates.
//!
//! A patch is an ordered list of raw `key = value` pairs. Keys are matched against
//! the built-in control fields (wire or snake_case name) and the configured
//! device-variant fields; everything else is ignored. Matched values are written
//! verbatim and only sanitized on the next load.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use serde_json::Value;

use crate::core::errors::{RdsError, Result};
use crate::store::record::{Anomaly, DeviceRecord, FieldMap, FieldName};

/// Raw, unvalidated control update as supplied by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlPatch {
    entries: Vec<(String, String)>,
}

impl ControlPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry; a later entry for the same field wins.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.push((key.into(), value.into()));
        self
    }

    /// Parse a JSON object body. String values are taken as-is; numbers and
    /// booleans are converted to their JSON text.
    pub fn from_json(body: &str) -> Result<Self> {
        let parsed: Value = serde_json::from_str(body)?;
        let Value::Object(map) = parsed else {
            return Err(RdsError::Serialization {
                context: "control patch",
                details: "body must be a JSON object".to_string(),
            });
        };

        let mut entries = Vec::with_capacity(map.len());
        for (key, value) in map {
            let raw = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(RdsError::Serialization {
                        context: "control patch",
                        details: format!("value for {key:?} must be a string, got {other}"),
                    });
                }
            };
            entries.push((key, raw));
        }
        Ok(Self { entries })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Split the patch into control-field updates and ignored keys.
    #[must_use]
    pub fn resolve(&self, extra_control: &[String]) -> ResolvedPatch {
        let mut updates = BTreeMap::new();
        let mut ignored = Vec::new();
        for (key, value) in &self.entries {
            match control_field_name(key, extra_control) {
                Some(name) => {
                    updates.insert(name, value.clone());
                }
                None => ignored.push(key.clone()),
            }
        }
        ResolvedPatch { updates, ignored }
    }
}

impl From<FieldMap> for ControlPatch {
    fn from(fields: FieldMap) -> Self {
        Self {
            entries: fields.into_iter().collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ControlPatch {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Wire name of the control field `key` refers to, if any.
fn control_field_name(key: &str, extra_control: &[String]) -> Option<String> {
    if let Some(field) = FieldName::from_key(key).filter(|f| f.is_control()) {
        return Some(field.wire_name().to_string());
    }
    extra_control.iter().find(|name| name.as_str() == key).cloned()
}

/// A patch with its keys resolved to wire names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPatch {
    /// Wire name to raw value.
    pub updates: FieldMap,
    /// Keys that matched no control field, in input order.
    pub ignored: Vec<String>,
}

impl ResolvedPatch {
    #[must_use]
    pub fn anomalies(&self) -> Vec<Anomaly> {
        self.ignored
            .iter()
            .map(|key| Anomaly::UnknownPatchKey { key: key.clone() })
            .collect()
    }

    /// Fields whose value was changed by the patch relative to `baseline`.
    #[must_use]
    pub fn changed_fields(&self, baseline: &[(String, String)]) -> Vec<String> {
        self.updates
            .iter()
            .filter(|(name, value)| {
                !baseline
                    .iter()
                    .any(|(k, v)| k == *name && v == *value)
            })
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Control document pairs of `record`: built-in fields, then present extras in
/// configured order.
#[must_use]
pub fn control_baseline(record: &DeviceRecord, extra_control: &[String]) -> Vec<(String, String)> {
    let builtin = FieldName::CONTROL
        .iter()
        .map(|f| (f.wire_name().to_string(), record.field(*f)));
    let extras = extra_control.iter().filter_map(|name| {
        record
            .control
            .extra
            .get(name)
            .map(|value| (name.clone(), value.clone()))
    });
    builtin.chain(extras).collect()
}

/// Overlay `patch` onto `baseline`, returning the complete control document in
/// write order. Baseline fields keep their position; extras introduced by the
/// patch are placed in configured order.
#[must_use]
pub fn merge(
    baseline: &[(String, String)],
    patch: &ResolvedPatch,
    extra_control: &[String],
) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = baseline
        .iter()
        .map(|(key, value)| {
            let value = patch.updates.get(key).unwrap_or(value);
            (key.clone(), value.clone())
        })
        .collect();

    for name in extra_control {
        if merged.iter().any(|(k, _)| k == name) {
            continue;
        }
        if let Some(value) = patch.updates.get(name) {
            merged.push((name.clone(), value.clone()));
        }
    }
    merged
}
