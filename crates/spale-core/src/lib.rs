//! spale-core — policy logic for the spot/normal admission webhook.
//!
//! Everything in this crate is pure: no cluster access, no I/O beyond
//! reading a config file. The webhook crate wires these pieces together
//! with a cluster-query backend.
//!
//! # Components
//!
//! - **`ratio`** — `N:M` spot-to-normal ratio and the expected split for a total
//! - **`policy`** — per-workload policy resolved from annotations with process defaults
//! - **`toleration`** — `key=value:effect` toleration syntax
//! - **`affinity`** — required node affinity construction and spot classification
//! - **`config`** — process-wide configuration and namespace filtering

pub mod affinity;
pub mod config;
pub mod error;
pub mod policy;
pub mod ratio;
pub mod toleration;

pub use affinity::{node_affinity_for, pod_is_spot};
pub use config::{LogFormat, NamespaceFilter, NamespaceVerdict, WebhookConfig};
pub use error::{ConfigError, PolicyError, PolicyResult};
pub use policy::{LabelPair, PolicyDefaults, WorkloadPolicy};
pub use ratio::{ExpectedCounts, Ratio};
pub use toleration::{parse_toleration, parse_tolerations};
