//! Sibling census: counts a pod's active siblings by capacity type.

use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::core::v1::Pod;
use spale_core::{WorkloadPolicy, pod_is_spot};
use tracing::{debug, warn};

use crate::error::ClusterResult;
use crate::query::ClusterQuery;
use crate::selector::is_empty_selector;

/// Phases in which a pod still occupies (or will occupy) capacity.
const ACTIVE_PHASES: &[&str] = &["Pending", "Running"];

/// Spot/normal split among a pod's siblings, not counting the pod itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SiblingCensus {
    pub siblings: usize,
    pub spot: usize,
    pub normal: usize,
}

impl SiblingCensus {
    /// Classify a set of sibling pods against `policy`.
    pub fn classify(pods: &[Pod], policy: &WorkloadPolicy) -> Self {
        let spot = pods.iter().filter(|p| pod_is_spot(p, policy)).count();
        Self {
            siblings: pods.len(),
            spot,
            normal: pods.len() - spot,
        }
    }

    /// Siblings plus the pod being admitted.
    pub fn total_with_self(&self) -> usize {
        self.siblings + 1
    }
}

fn is_active(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .is_some_and(|phase| ACTIVE_PHASES.contains(&phase))
}

/// Active pods selected by `replica_set`, excluding the pod named `exclude`.
pub async fn active_siblings<C: ClusterQuery>(
    cluster: &C,
    namespace: &str,
    replica_set: &ReplicaSet,
    exclude: Option<&str>,
) -> ClusterResult<Vec<Pod>> {
    let Some(selector) = replica_set.spec.as_ref().map(|spec| &spec.selector) else {
        warn!(%namespace, replica_set = ?replica_set.metadata.name, "ReplicaSet has no spec, no siblings");
        return Ok(Vec::new());
    };
    // An empty selector would select every pod in the namespace.
    if is_empty_selector(selector) {
        warn!(%namespace, replica_set = ?replica_set.metadata.name, "ReplicaSet has an empty selector, no siblings");
        return Ok(Vec::new());
    }

    let pods = cluster.list_pods(namespace, selector).await?;
    let listed = pods.len();
    let siblings: Vec<Pod> = pods
        .into_iter()
        .filter(|p| exclude.is_none_or(|name| p.metadata.name.as_deref() != Some(name)))
        .filter(is_active)
        .collect();

    debug!(%namespace, listed, active = siblings.len(), "sibling pods collected");
    Ok(siblings)
}

/// Count the spot and normal siblings of a pod owned by `replica_set`.
pub async fn census<C: ClusterQuery>(
    cluster: &C,
    namespace: &str,
    replica_set: &ReplicaSet,
    exclude: Option<&str>,
    policy: &WorkloadPolicy,
) -> ClusterResult<SiblingCensus> {
    let siblings = active_siblings(cluster, namespace, replica_set, exclude).await?;
    Ok(SiblingCensus::classify(&siblings, policy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryCluster;
    use k8s_openapi::api::apps::v1::ReplicaSetSpec;
    use k8s_openapi::api::core::v1::{Affinity, PodSpec, PodStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
    use spale_core::node_affinity_for;
    use std::collections::BTreeMap;

    fn policy() -> WorkloadPolicy {
        WorkloadPolicy {
            ratio: "1:1".to_string(),
            ignore: false,
            opt_in: false,
            node_labels: vec!["nodepool=spot".to_string()],
            node_tolerations: vec![],
        }
    }

    fn web_labels() -> BTreeMap<String, String> {
        BTreeMap::from([("app".to_string(), "web".to_string())])
    }

    fn replica_set() -> ReplicaSet {
        ReplicaSet {
            metadata: ObjectMeta {
                namespace: Some("default".to_string()),
                name: Some("web-rs".to_string()),
                ..Default::default()
            },
            spec: Some(ReplicaSetSpec {
                selector: LabelSelector {
                    match_labels: Some(web_labels()),
                    match_expressions: None,
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn pod(name: &str, phase: &str, spot: bool) -> Pod {
        let affinity = spot.then(|| Affinity {
            node_affinity: Some(node_affinity_for(&policy().label_pairs())),
            ..Default::default()
        });
        Pod {
            metadata: ObjectMeta {
                namespace: Some("default".to_string()),
                name: Some(name.to_string()),
                labels: Some(web_labels()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                affinity,
                ..Default::default()
            }),
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                ..Default::default()
            }),
        }
    }

    #[tokio::test]
    async fn counts_active_siblings_by_type() {
        let cluster = InMemoryCluster::new();
        cluster.put_pod(pod("web-1", "Running", true));
        cluster.put_pod(pod("web-2", "Running", false));
        cluster.put_pod(pod("web-3", "Pending", true));
        cluster.put_pod(pod("web-4", "Succeeded", true));
        cluster.put_pod(pod("web-5", "Failed", false));

        let result = census(&cluster, "default", &replica_set(), Some("web-9"), &policy())
            .await
            .unwrap();
        assert_eq!(result, SiblingCensus { siblings: 3, spot: 2, normal: 1 });
        assert_eq!(result.total_with_self(), 4);
    }

    #[tokio::test]
    async fn requesting_pod_is_excluded() {
        let cluster = InMemoryCluster::new();
        cluster.put_pod(pod("web-1", "Running", false));
        cluster.put_pod(pod("web-2", "Pending", false));

        let result = census(&cluster, "default", &replica_set(), Some("web-2"), &policy())
            .await
            .unwrap();
        assert_eq!(result.siblings, 1);
    }

    #[tokio::test]
    async fn pods_without_phase_are_not_counted() {
        let cluster = InMemoryCluster::new();
        let mut fresh = pod("web-1", "Running", false);
        fresh.status = None;
        cluster.put_pod(fresh);

        let result = census(&cluster, "default", &replica_set(), None, &policy())
            .await
            .unwrap();
        assert_eq!(result, SiblingCensus::default());
    }

    #[tokio::test]
    async fn empty_selector_yields_no_siblings() {
        let cluster = InMemoryCluster::new();
        cluster.put_pod(pod("web-1", "Running", false));

        let mut rs = replica_set();
        rs.spec.as_mut().unwrap().selector = LabelSelector::default();
        let result = census(&cluster, "default", &rs, None, &policy()).await.unwrap();
        assert_eq!(result.siblings, 0);

        rs.spec = None;
        let result = census(&cluster, "default", &rs, None, &policy()).await.unwrap();
        assert_eq!(result.siblings, 0);
    }
}
