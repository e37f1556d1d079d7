//! In-memory cluster backend (for testing).
//!
//! Holds ReplicaSets, Deployments, and Pods in plain maps behind locks so
//! tests can stage a workload, run decisions concurrently, and register
//! newly admitted pods between requests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use tracing::debug;

use crate::error::{ClusterError, ClusterResult};
use crate::query::ClusterQuery;
use crate::selector::selector_matches;

type Key = (String, String);

#[derive(Default)]
pub struct InMemoryCluster {
    replica_sets: RwLock<HashMap<Key, ReplicaSet>>,
    deployments: RwLock<HashMap<Key, Deployment>>,
    pods: RwLock<HashMap<Key, Pod>>,
    unavailable: AtomicBool,
}

fn key_of(meta: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta) -> Key {
    (
        meta.namespace.clone().unwrap_or_default(),
        meta.name.clone().unwrap_or_default(),
    )
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_replica_set(&self, rs: ReplicaSet) {
        let key = key_of(&rs.metadata);
        self.replica_sets.write().expect("replica set lock").insert(key, rs);
    }

    pub fn put_deployment(&self, deployment: Deployment) {
        let key = key_of(&deployment.metadata);
        self.deployments.write().expect("deployment lock").insert(key, deployment);
    }

    /// Insert or replace a pod, keyed by namespace and name.
    pub fn put_pod(&self, pod: Pod) {
        let key = key_of(&pod.metadata);
        debug!(namespace = %key.0, pod = %key.1, "pod stored");
        self.pods.write().expect("pod lock").insert(key, pod);
    }

    pub fn pod_count(&self) -> usize {
        self.pods.read().expect("pod lock").len()
    }

    /// Make every subsequent query fail until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> ClusterResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClusterError::Unavailable("in-memory cluster marked unavailable".to_string()));
        }
        Ok(())
    }
}

impl ClusterQuery for InMemoryCluster {
    async fn get_replica_set(&self, namespace: &str, name: &str) -> ClusterResult<Option<ReplicaSet>> {
        self.check_available()?;
        let key = (namespace.to_string(), name.to_string());
        Ok(self.replica_sets.read().expect("replica set lock").get(&key).cloned())
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> ClusterResult<Option<Deployment>> {
        self.check_available()?;
        let key = (namespace.to_string(), name.to_string());
        Ok(self.deployments.read().expect("deployment lock").get(&key).cloned())
    }

    async fn list_pods(&self, namespace: &str, selector: &LabelSelector) -> ClusterResult<Vec<Pod>> {
        self.check_available()?;
        let pods = self.pods.read().expect("pod lock");
        let mut matched: Vec<Pod> = pods
            .iter()
            .filter(|((ns, _), pod)| ns == namespace && selector_matches(selector, pod.metadata.labels.as_ref()))
            .map(|(_, pod)| pod.clone())
            .collect();
        matched.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn pod(ns: &str, name: &str, app: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                namespace: Some(ns.to_string()),
                name: Some(name.to_string()),
                labels: Some(BTreeMap::from([("app".to_string(), app.to_string())])),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn app_selector(app: &str) -> LabelSelector {
        LabelSelector {
            match_labels: Some(BTreeMap::from([("app".to_string(), app.to_string())])),
            match_expressions: None,
        }
    }

    #[tokio::test]
    async fn list_pods_filters_by_namespace_and_selector() {
        let cluster = InMemoryCluster::new();
        cluster.put_pod(pod("default", "web-1", "web"));
        cluster.put_pod(pod("default", "web-2", "web"));
        cluster.put_pod(pod("default", "db-1", "db"));
        cluster.put_pod(pod("other", "web-3", "web"));

        let pods = cluster.list_pods("default", &app_selector("web")).await.unwrap();
        let names: Vec<_> = pods.iter().map(|p| p.metadata.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["web-1", "web-2"]);
    }

    #[tokio::test]
    async fn missing_objects_are_none() {
        let cluster = InMemoryCluster::new();
        assert!(cluster.get_replica_set("default", "nope").await.unwrap().is_none());
        assert!(cluster.get_deployment("default", "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unavailable_cluster_fails_queries() {
        let cluster = InMemoryCluster::new();
        cluster.set_unavailable(true);
        assert!(matches!(
            cluster.list_pods("default", &app_selector("web")).await,
            Err(ClusterError::Unavailable(_))
        ));
        cluster.set_unavailable(false);
        assert!(cluster.list_pods("default", &app_selector("web")).await.is_ok());
    }

    #[test]
    fn put_pod_replaces_by_name() {
        let cluster = InMemoryCluster::new();
        cluster.put_pod(pod("default", "web-1", "web"));
        cluster.put_pod(pod("default", "web-1", "web"));
        assert_eq!(cluster.pod_count(), 1);
    }
}
