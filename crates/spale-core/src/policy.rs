//! Per-workload policy resolved from annotations.
//!
//! A workload opts into custom behavior through five annotations on its
//! owning resource. Each absent or empty annotation falls back to the
//! process-wide default. Resolution never fails; syntax problems surface
//! later, when the ratio or tolerations are actually used.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Toleration;

use crate::error::{PolicyError, PolicyResult};
use crate::ratio::Ratio;
use crate::toleration::parse_tolerations;

pub const ANNOTATION_RATIO: &str = "spale/ratio";
pub const ANNOTATION_IGNORE: &str = "spale/ignore";
pub const ANNOTATION_OPT_IN: &str = "spale/opt-in";
pub const ANNOTATION_NODE_LABELS: &str = "spale/node-labels";
pub const ANNOTATION_TOLERATIONS: &str = "spale/tolerations";

/// Process-wide fallbacks for fields a workload does not annotate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDefaults {
    pub ratio: String,
    pub node_labels: Vec<String>,
    pub node_tolerations: Vec<String>,
}

/// Placement policy for one workload, built fresh per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadPolicy {
    pub ratio: String,
    pub ignore: bool,
    pub opt_in: bool,
    pub node_labels: Vec<String>,
    pub node_tolerations: Vec<String>,
}

/// A `key=value` node label requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPair {
    pub key: String,
    pub value: String,
}

impl WorkloadPolicy {
    /// Resolve a policy from a workload's annotation map.
    ///
    /// Returns `None` when the workload has no annotations at all.
    pub fn from_annotations(
        annotations: Option<&BTreeMap<String, String>>,
        defaults: &PolicyDefaults,
    ) -> Option<Self> {
        let annotations = annotations?;
        let get = |key: &str| annotations.get(key).map(String::as_str).unwrap_or("");

        let ratio = match get(ANNOTATION_RATIO).trim() {
            "" => defaults.ratio.clone(),
            r => r.to_string(),
        };

        Some(Self {
            ratio,
            ignore: get(ANNOTATION_IGNORE) == "true",
            opt_in: get(ANNOTATION_OPT_IN) == "true",
            node_labels: split_or(get(ANNOTATION_NODE_LABELS), &defaults.node_labels),
            node_tolerations: split_or(get(ANNOTATION_TOLERATIONS), &defaults.node_tolerations),
        })
    }

    /// The parsed ratio, degrading to 1:1 when malformed.
    pub fn ratio(&self) -> Ratio {
        Ratio::parse_or_even(&self.ratio)
    }

    /// Declared node labels as key/value pairs.
    ///
    /// A bare `key` means `key=true`. Repeated keys keep the last value at
    /// the position of their first occurrence.
    pub fn label_pairs(&self) -> Vec<LabelPair> {
        let mut pairs: Vec<LabelPair> = Vec::with_capacity(self.node_labels.len());
        for label in &self.node_labels {
            let (key, value) = label.split_once('=').unwrap_or((label.as_str(), "true"));
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() {
                continue;
            }
            match pairs.iter_mut().find(|p| p.key == key) {
                Some(existing) => existing.value = value.to_string(),
                None => pairs.push(LabelPair {
                    key: key.to_string(),
                    value: value.to_string(),
                }),
            }
        }
        pairs
    }

    /// Declared node labels, failing when no entry has a usable key.
    pub fn spot_labels(&self) -> PolicyResult<Vec<LabelPair>> {
        let pairs = self.label_pairs();
        if pairs.is_empty() {
            return Err(PolicyError::InvalidLabel(self.node_labels.join(",")));
        }
        Ok(pairs)
    }

    /// Declared tolerations, failing on the first malformed entry.
    pub fn tolerations(&self) -> PolicyResult<Vec<Toleration>> {
        parse_tolerations(&self.node_tolerations)
    }
}

impl PolicyDefaults {
    /// Check that the defaults are usable as a fallback for every workload.
    pub fn validate(&self) -> PolicyResult<()> {
        Ratio::parse(&self.ratio)?;
        for label in &self.node_labels {
            let key = label.split_once('=').map_or(label.as_str(), |(k, _)| k);
            if key.trim().is_empty() {
                return Err(PolicyError::InvalidLabel(label.clone()));
            }
        }
        parse_tolerations(&self.node_tolerations)?;
        Ok(())
    }
}

/// Split a comma-separated annotation, dropping blank entries, falling
/// back to `default` when nothing remains.
fn split_or(raw: &str, default: &[String]) -> Vec<String> {
    let items: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    if items.is_empty() {
        default.to_vec()
    } else {
        items
    }
}
