//! spale-cluster — read-only cluster queries for the admission webhook.
//!
//! Provides the `ClusterQuery` seam and two backends:
//!
//! - **`KubeCluster`** — live Kubernetes API, built once at startup
//! - **`InMemoryCluster`** — lock-protected maps, for tests
//!
//! On top of the seam sit owner resolution (Pod → ReplicaSet → Deployment)
//! and the sibling census used to measure a workload's current split.

pub mod census;
pub mod error;
pub mod live;
pub mod memory;
pub mod owner;
pub mod query;
pub mod selector;

pub use census::{SiblingCensus, active_siblings, census};
pub use error::{ClusterError, ClusterResult};
pub use live::KubeCluster;
pub use memory::InMemoryCluster;
pub use owner::{OwningWorkload, WorkloadKind, resolve_owner};
pub use query::ClusterQuery;
pub use selector::{format_label_selector, selector_matches};
