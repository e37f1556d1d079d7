//! JSON Patch (RFC 6902) operations emitted for an admitted pod.
//!
//! A patch cannot add a member under a missing parent, so every builder
//! here emits the parent object first when the pod lacks it.

use k8s_openapi::api::core::v1::{Affinity, NodeAffinity, Pod, Toleration};
use serde::{Deserialize, Serialize};

/// Annotation the ReplicaSet controller reads to rank pods for scale-down.
pub const DELETION_COST_ANNOTATION: &str = "controller.kubernetes.io/pod-deletion-cost";

/// Cost assigned to pods that may be removed first.
pub const DELETION_COST_LOW: &str = "-1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    pub value: serde_json::Value,
}

impl PatchOperation {
    pub fn add(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            op: PatchOp::Add,
            path: path.into(),
            value,
        }
    }

    pub fn replace(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.into(),
            value,
        }
    }
}

/// Escape one JSON Pointer reference token (`~` → `~0`, `/` → `~1`).
pub fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Tag the pod with a low deletion cost.
pub fn deletion_cost_patches(pod: &Pod) -> Vec<PatchOperation> {
    let mut patches = Vec::with_capacity(2);
    if pod.metadata.annotations.is_none() {
        patches.push(PatchOperation::add("/metadata/annotations", serde_json::json!({})));
    }
    patches.push(PatchOperation::add(
        format!("/metadata/annotations/{}", escape_pointer_token(DELETION_COST_ANNOTATION)),
        serde_json::Value::String(DELETION_COST_LOW.to_string()),
    ));
    patches
}

/// Pin the pod to spot capacity: require the node affinity and replace
/// its tolerations with the spot tolerations.
pub fn spot_patches(
    pod: &Pod,
    node_affinity: &NodeAffinity,
    tolerations: &[Toleration],
) -> serde_json::Result<Vec<PatchOperation>> {
    let spec = pod.spec.as_ref();
    let mut patches = Vec::with_capacity(4);

    if spec.and_then(|s| s.affinity.as_ref()).is_none() {
        patches.push(PatchOperation::add("/spec/affinity", serde_json::to_value(Affinity::default())?));
    }
    if spec.and_then(|s| s.tolerations.as_ref()).is_none() {
        patches.push(PatchOperation::add("/spec/tolerations", serde_json::json!([])));
    }

    patches.push(PatchOperation::add(
        "/spec/affinity/nodeAffinity",
        serde_json::to_value(node_affinity)?,
    ));
    patches.push(PatchOperation::replace(
        "/spec/tolerations",
        serde_json::to_value(tolerations)?,
    ));

    Ok(patches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodSpec;
    use spale_core::{LabelPair, node_affinity_for, parse_toleration};
    use std::collections::BTreeMap;

    fn affinity() -> NodeAffinity {
        node_affinity_for(&[LabelPair {
            key: "nodepool".to_string(),
            value: "spot".to_string(),
        }])
    }

    fn tolerations() -> Vec<Toleration> {
        vec![parse_toleration("type=spot:NoSchedule").unwrap()]
    }

    fn paths(patches: &[PatchOperation]) -> Vec<(PatchOp, &str)> {
        patches.iter().map(|p| (p.op, p.path.as_str())).collect()
    }

    #[test]
    fn escapes_pointer_tokens() {
        assert_eq!(
            escape_pointer_token(DELETION_COST_ANNOTATION),
            "controller.kubernetes.io~1pod-deletion-cost"
        );
        assert_eq!(escape_pointer_token("a~b/c"), "a~0b~1c");
    }

    #[test]
    fn bare_pod_gets_parents_first() {
        let patches = spot_patches(&Pod::default(), &affinity(), &tolerations()).unwrap();
        assert_eq!(
            paths(&patches),
            vec![
                (PatchOp::Add, "/spec/affinity"),
                (PatchOp::Add, "/spec/tolerations"),
                (PatchOp::Add, "/spec/affinity/nodeAffinity"),
                (PatchOp::Replace, "/spec/tolerations"),
            ]
        );
        assert_eq!(patches[0].value, serde_json::json!({}));
        assert_eq!(patches[1].value, serde_json::json!([]));
    }

    #[test]
    fn existing_parents_are_not_re_added() {
        let pod = Pod {
            spec: Some(PodSpec {
                affinity: Some(Affinity::default()),
                tolerations: Some(vec![]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let patches = spot_patches(&pod, &affinity(), &tolerations()).unwrap();
        assert_eq!(
            paths(&patches),
            vec![
                (PatchOp::Add, "/spec/affinity/nodeAffinity"),
                (PatchOp::Replace, "/spec/tolerations"),
            ]
        );
    }

    #[test]
    fn toleration_values_use_api_field_names() {
        let patches = spot_patches(&Pod::default(), &affinity(), &tolerations()).unwrap();
        assert_eq!(
            patches[3].value,
            serde_json::json!([{
                "key": "type",
                "operator": "Equal",
                "value": "spot",
                "effect": "NoSchedule"
            }])
        );
    }

    #[test]
    fn deletion_cost_adds_annotation_map_when_missing() {
        let patches = deletion_cost_patches(&Pod::default());
        assert_eq!(
            paths(&patches),
            vec![
                (PatchOp::Add, "/metadata/annotations"),
                (PatchOp::Add, "/metadata/annotations/controller.kubernetes.io~1pod-deletion-cost"),
            ]
        );
        assert_eq!(patches[1].value, serde_json::json!("-1"));

        let mut pod = Pod::default();
        pod.metadata.annotations = Some(BTreeMap::new());
        assert_eq!(deletion_cost_patches(&pod).len(), 1);
    }

    #[test]
    fn operations_serialize_lowercase() {
        let op = PatchOperation::replace("/spec/tolerations", serde_json::json!([]));
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            serde_json::json!({"op": "replace", "path": "/spec/tolerations", "value": []})
        );
    }
}
