//! The cluster-query seam.
//!
//! The decision engine only needs three reads from the cluster. Backends
//! must be safe to share across concurrent requests; no backend caches,
//! so two requests for the same workload may observe different states.

use std::future::Future;
use std::sync::Arc;

use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

use crate::error::ClusterResult;

/// Read access to the workloads and pods the decision engine inspects.
pub trait ClusterQuery: Send + Sync + 'static {
    /// Fetch a ReplicaSet, `None` if it does not exist.
    fn get_replica_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> impl Future<Output = ClusterResult<Option<ReplicaSet>>> + Send;

    /// Fetch a Deployment, `None` if it does not exist.
    fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> impl Future<Output = ClusterResult<Option<Deployment>>> + Send;

    /// List pods in `namespace` matching `selector`.
    fn list_pods(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> impl Future<Output = ClusterResult<Vec<Pod>>> + Send;
}

impl<C: ClusterQuery> ClusterQuery for Arc<C> {
    fn get_replica_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> impl Future<Output = ClusterResult<Option<ReplicaSet>>> + Send {
        (**self).get_replica_set(namespace, name)
    }

    fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> impl Future<Output = ClusterResult<Option<Deployment>>> + Send {
        (**self).get_deployment(namespace, name)
    }

    fn list_pods(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> impl Future<Output = ClusterResult<Vec<Pod>>> + Send {
        (**self).list_pods(namespace, selector)
    }
}
