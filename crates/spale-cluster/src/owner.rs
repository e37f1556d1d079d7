//! Owning-workload resolution: Pod → ReplicaSet → Deployment.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use tracing::{debug, warn};

use crate::error::ClusterResult;
use crate::query::ClusterQuery;

/// Which resource supplied the policy annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    Deployment,
    ReplicaSet,
}

/// The workload a pod belongs to.
#[derive(Debug, Clone)]
pub struct OwningWorkload {
    pub kind: WorkloadKind,
    pub name: String,
    /// Annotations of the policy-bearing resource; `None` when it has none.
    pub annotations: Option<BTreeMap<String, String>>,
    /// The ReplicaSet whose selector defines the pod's siblings.
    pub replica_set: ReplicaSet,
}

/// The controller reference if one is marked, else the first reference.
fn controller_ref(meta: &ObjectMeta) -> Option<&OwnerReference> {
    let refs = meta.owner_references.as_deref()?;
    refs.iter()
        .find(|r| r.controller == Some(true))
        .or_else(|| refs.first())
}

/// Resolve the workload owning `pod` in `namespace`.
///
/// Returns `None` when the pod is not controlled by a ReplicaSet or the
/// ReplicaSet no longer exists. A ReplicaSet whose Deployment is gone
/// supplies its own annotations.
pub async fn resolve_owner<C: ClusterQuery>(
    cluster: &C,
    namespace: &str,
    pod: &Pod,
) -> ClusterResult<Option<OwningWorkload>> {
    let Some(owner) = controller_ref(&pod.metadata) else {
        return Ok(None);
    };
    if owner.kind != "ReplicaSet" {
        debug!(kind = %owner.kind, name = %owner.name, "pod owner is not a ReplicaSet");
        return Ok(None);
    }

    let Some(replica_set) = cluster.get_replica_set(namespace, &owner.name).await? else {
        warn!(%namespace, replica_set = %owner.name, "owning ReplicaSet not found");
        return Ok(None);
    };

    if let Some(rs_owner) = controller_ref(&replica_set.metadata)
        && rs_owner.kind == "Deployment"
    {
        match cluster.get_deployment(namespace, &rs_owner.name).await? {
            Some(deployment) => {
                return Ok(Some(OwningWorkload {
                    kind: WorkloadKind::Deployment,
                    name: rs_owner.name.clone(),
                    annotations: deployment.metadata.annotations,
                    replica_set,
                }));
            }
            None => {
                warn!(%namespace, deployment = %rs_owner.name, "owning Deployment not found, using ReplicaSet annotations");
            }
        }
    }

    Ok(Some(OwningWorkload {
        kind: WorkloadKind::ReplicaSet,
        name: replica_set.metadata.name.clone().unwrap_or_default(),
        annotations: replica_set.metadata.annotations.clone(),
        replica_set,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryCluster;
    use crate::ClusterError;
    use k8s_openapi::api::apps::v1::Deployment;

    fn owner_ref(kind: &str, name: &str, controller: bool) -> OwnerReference {
        OwnerReference {
            api_version: "apps/v1".to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            uid: format!("uid-{name}"),
            controller: Some(controller),
            block_owner_deletion: None,
        }
    }

    fn meta(name: &str, owners: Vec<OwnerReference>, annotations: Option<&[(&str, &str)]>) -> ObjectMeta {
        ObjectMeta {
            namespace: Some("default".to_string()),
            name: Some(name.to_string()),
            owner_references: (!owners.is_empty()).then_some(owners),
            annotations: annotations.map(|pairs| {
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            }),
            ..Default::default()
        }
    }

    fn pod_owned_by(kind: &str, name: &str) -> Pod {
        Pod {
            metadata: meta("web-abc", vec![owner_ref(kind, name, true)], None),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn pod_without_owner_has_no_workload() {
        let cluster = InMemoryCluster::new();
        let pod = Pod::default();
        assert!(resolve_owner(&cluster, "default", &pod).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn non_replica_set_owner_is_ignored() {
        let cluster = InMemoryCluster::new();
        let pod = pod_owned_by("StatefulSet", "db");
        assert!(resolve_owner(&cluster, "default", &pod).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_replica_set_has_no_workload() {
        let cluster = InMemoryCluster::new();
        let pod = pod_owned_by("ReplicaSet", "web-rs");
        assert!(resolve_owner(&cluster, "default", &pod).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deployment_supplies_annotations() {
        let cluster = InMemoryCluster::new();
        cluster.put_replica_set(ReplicaSet {
            metadata: meta("web-rs", vec![owner_ref("Deployment", "web", true)], Some(&[("rs", "1")])),
            ..Default::default()
        });
        cluster.put_deployment(Deployment {
            metadata: meta("web", vec![], Some(&[("spale/ratio", "1:1")])),
            ..Default::default()
        });

        let owner = resolve_owner(&cluster, "default", &pod_owned_by("ReplicaSet", "web-rs"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(owner.kind, WorkloadKind::Deployment);
        assert_eq!(owner.name, "web");
        assert_eq!(owner.annotations.unwrap().get("spale/ratio").unwrap(), "1:1");
        assert_eq!(owner.replica_set.metadata.name.as_deref(), Some("web-rs"));
    }

    #[tokio::test]
    async fn orphaned_replica_set_supplies_its_own_annotations() {
        let cluster = InMemoryCluster::new();
        cluster.put_replica_set(ReplicaSet {
            metadata: meta("web-rs", vec![owner_ref("Deployment", "gone", true)], Some(&[("spale/ignore", "true")])),
            ..Default::default()
        });

        let owner = resolve_owner(&cluster, "default", &pod_owned_by("ReplicaSet", "web-rs"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(owner.kind, WorkloadKind::ReplicaSet);
        assert_eq!(owner.annotations.unwrap().get("spale/ignore").unwrap(), "true");
    }

    #[tokio::test]
    async fn controller_reference_is_preferred() {
        let cluster = InMemoryCluster::new();
        cluster.put_replica_set(ReplicaSet {
            metadata: meta("web-rs", vec![], None),
            ..Default::default()
        });
        let pod = Pod {
            metadata: meta(
                "web-abc",
                vec![owner_ref("ConfigMap", "cfg", false), owner_ref("ReplicaSet", "web-rs", true)],
                None,
            ),
            ..Default::default()
        };

        let owner = resolve_owner(&cluster, "default", &pod).await.unwrap().unwrap();
        assert_eq!(owner.kind, WorkloadKind::ReplicaSet);
        assert_eq!(owner.name, "web-rs");
    }

    #[tokio::test]
    async fn query_failures_propagate() {
        let cluster = InMemoryCluster::new();
        cluster.set_unavailable(true);
        let result = resolve_owner(&cluster, "default", &pod_owned_by("ReplicaSet", "web-rs")).await;
        assert!(matches!(result, Err(ClusterError::Unavailable(_))));
    }
}
