//! Kubernetes API backend.

use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::{Api, ListParams};
use kube::Client;
use tracing::{debug, info};

use crate::error::ClusterResult;
use crate::query::ClusterQuery;
use crate::selector::format_label_selector;

/// Cluster queries served by the Kubernetes API server.
///
/// `Client` is a cheap handle over a shared connection pool, so one
/// `KubeCluster` is built at startup and shared by every request.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect with in-cluster config when running in a pod, else the local kubeconfig.
    pub async fn connect() -> ClusterResult<Self> {
        let client = Client::try_default().await?;
        info!(namespace = client.default_namespace(), "kubernetes client initialized");
        Ok(Self::new(client))
    }
}

impl ClusterQuery for KubeCluster {
    async fn get_replica_set(&self, namespace: &str, name: &str) -> ClusterResult<Option<ReplicaSet>> {
        let api: Api<ReplicaSet> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> ClusterResult<Option<Deployment>> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn list_pods(&self, namespace: &str, selector: &LabelSelector) -> ClusterResult<Vec<Pod>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let selector = format_label_selector(selector);
        let pods = api.list(&ListParams::default().labels(&selector)).await?;
        debug!(%namespace, %selector, count = pods.items.len(), "listed pods");
        Ok(pods.items)
    }
}
