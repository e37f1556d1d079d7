//! Toleration syntax: `key=value:effect`.
//!
//! An empty value or `*` tolerates any value for the key (`Exists`);
//! anything else must match exactly (`Equal`). An empty effect tolerates
//! every taint effect for the key.

use k8s_openapi::api::core::v1::Toleration;

use crate::error::{PolicyError, PolicyResult};

/// Taint effects a toleration may name.
const EFFECTS: &[&str] = &["NoSchedule", "PreferNoSchedule", "NoExecute"];

/// Parse a single `key=value:effect` entry.
pub fn parse_toleration(entry: &str) -> PolicyResult<Toleration> {
    let invalid = |reason| PolicyError::InvalidToleration {
        entry: entry.to_string(),
        reason,
    };

    let (key, rest) = entry.split_once('=').ok_or_else(|| invalid("missing '='"))?;
    let (value, effect) = rest.split_once(':').ok_or_else(|| invalid("missing ':'"))?;

    let key = key.trim();
    let value = value.trim();
    let effect = effect.trim();

    if key.is_empty() {
        return Err(invalid("empty key"));
    }
    if !effect.is_empty() && !EFFECTS.contains(&effect) {
        return Err(invalid("unknown taint effect"));
    }

    let (operator, value) = match value {
        "" | "*" => ("Exists", None),
        v => ("Equal", Some(v.to_string())),
    };

    Ok(Toleration {
        key: Some(key.to_string()),
        operator: Some(operator.to_string()),
        value,
        effect: (!effect.is_empty()).then(|| effect.to_string()),
        toleration_seconds: None,
    })
}

/// Parse every entry, failing on the first malformed one.
pub fn parse_tolerations<S: AsRef<str>>(entries: &[S]) -> PolicyResult<Vec<Toleration>> {
    entries.iter().map(|e| parse_toleration(e.as_ref())).collect()
}
