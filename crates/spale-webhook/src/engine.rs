//! Decides spot or normal capacity for an admitted pod.
//!
//! Each request walks a fixed sequence of checks and stops at the first
//! terminal outcome:
//!
//! ```text
//! owner? ─no─► NoOwner
//! policy? ─no─► NoPolicy
//! ignore ─yes─► Ignored
//! namespace filtered (and not opted in) ─► Excluded
//! tolerations or node labels malformed ─► InvalidPolicy
//! no active siblings ─► NoSiblings
//! normal below target ─► KeepNormal
//! otherwise ─► AssignSpot
//! ```
//!
//! Nothing is remembered between requests. Concurrent requests for the
//! same workload read the census independently, so they can briefly
//! overshoot the target split; later admissions correct it.

use k8s_openapi::api::core::v1::Pod;
use spale_cluster::{ClusterQuery, SiblingCensus, census, resolve_owner};
use spale_core::{
    ExpectedCounts, NamespaceFilter, NamespaceVerdict, PolicyDefaults, PolicyError, WebhookConfig,
    WorkloadPolicy, node_affinity_for,
};
use tracing::{debug, error};

use crate::error::EngineResult;
use crate::patch::{PatchOperation, deletion_cost_patches, spot_patches};

/// Share of the total above which normal pods may be deleted first.
const DELETION_COST_NORMAL_SHARE: f64 = 0.2;

/// Read-only settings shared by every decision.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub defaults: PolicyDefaults,
    pub namespaces: NamespaceFilter,
    /// Emit the deletion-cost hint alongside placement patches.
    pub deletion_cost: bool,
}

impl EngineSettings {
    pub fn from_config(config: &WebhookConfig) -> Self {
        Self {
            defaults: config.policy_defaults(),
            namespaces: config.namespace_filter(),
            deletion_cost: config.deletion_cost,
        }
    }
}

/// Terminal state of a single decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    NoOwner,
    NoPolicy,
    Ignored,
    Excluded(NamespaceVerdict),
    InvalidPolicy(PolicyError),
    NoSiblings,
    KeepNormal,
    AssignSpot,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::NoOwner => "no-owner",
            Outcome::NoPolicy => "no-policy",
            Outcome::Ignored => "ignored",
            Outcome::Excluded(_) => "excluded",
            Outcome::InvalidPolicy(_) => "invalid-policy",
            Outcome::NoSiblings => "no-siblings",
            Outcome::KeepNormal => "keep-normal",
            Outcome::AssignSpot => "assign-spot",
        }
    }
}

/// The result of deciding one pod.
#[derive(Debug, Clone)]
pub struct Decision {
    pub outcome: Outcome,
    pub census: Option<SiblingCensus>,
    pub expected: Option<ExpectedCounts>,
    /// Always empty for dry-run requests.
    pub patches: Vec<PatchOperation>,
}

impl Decision {
    fn pass(outcome: Outcome) -> Self {
        Self {
            outcome,
            census: None,
            expected: None,
            patches: Vec::new(),
        }
    }
}

/// Decides placement for pods, reading live state through `C`.
pub struct DecisionEngine<C> {
    cluster: C,
    settings: EngineSettings,
}

impl<C: ClusterQuery> DecisionEngine<C> {
    pub fn new(cluster: C, settings: EngineSettings) -> Self {
        Self { cluster, settings }
    }

    pub fn cluster(&self) -> &C {
        &self.cluster
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Decide placement for `pod` being created in `namespace`.
    ///
    /// The full decision is computed even for dry-run requests, but their
    /// patch list is always empty. Cluster query failures abort the whole
    /// decision; no partial patch list is ever returned.
    pub async fn decide(&self, pod: &Pod, namespace: &str, dry_run: bool) -> EngineResult<Decision> {
        let pod_name = pod.metadata.name.as_deref().filter(|n| !n.is_empty());
        let pod_label = pod_name
            .or(pod.metadata.generate_name.as_deref())
            .unwrap_or("<unnamed>");

        let Some(owner) = resolve_owner(&self.cluster, namespace, pod).await? else {
            debug!(pod = pod_label, %namespace, "pod has no owning workload");
            return Ok(Decision::pass(Outcome::NoOwner));
        };

        let Some(policy) =
            WorkloadPolicy::from_annotations(owner.annotations.as_ref(), &self.settings.defaults)
        else {
            debug!(pod = pod_label, %namespace, workload = %owner.name, "workload has no annotations");
            return Ok(Decision::pass(Outcome::NoPolicy));
        };

        if policy.ignore {
            debug!(pod = pod_label, %namespace, workload = %owner.name, "ignoring pod");
            return Ok(Decision::pass(Outcome::Ignored));
        }

        match self.settings.namespaces.check(namespace, policy.opt_in) {
            NamespaceVerdict::Allowed => {}
            NamespaceVerdict::OptedIn => {
                debug!(pod = pod_label, %namespace, "namespace filtered, but workload opted in");
            }
            verdict => {
                debug!(pod = pod_label, %namespace, ?verdict, "namespace filtered, ignoring pod");
                return Ok(Decision::pass(Outcome::Excluded(verdict)));
            }
        }

        let placement = policy
            .tolerations()
            .and_then(|tolerations| Ok((tolerations, policy.spot_labels()?)));
        let (tolerations, labels) = match placement {
            Ok(placement) => placement,
            Err(e) => {
                error!(pod = pod_label, %namespace, workload = %owner.name, error = %e, "invalid workload policy, leaving pod untouched");
                return Ok(Decision::pass(Outcome::InvalidPolicy(e)));
            }
        };

        let siblings = census(&self.cluster, namespace, &owner.replica_set, pod_name, &policy).await?;
        if siblings.siblings == 0 {
            debug!(pod = pod_label, %namespace, "no siblings found for pod");
            return Ok(Decision {
                census: Some(siblings),
                ..Decision::pass(Outcome::NoSiblings)
            });
        }

        let total = siblings.total_with_self();
        let expected = policy.ratio().expected_counts(total);
        debug!(
            pod = pod_label,
            %namespace,
            total,
            current_normal = siblings.normal,
            current_spot = siblings.spot,
            expected_normal = expected.normal,
            ratio = %policy.ratio,
            "pod siblings counted"
        );

        let mut patches = Vec::new();
        if self.settings.deletion_cost && deletion_cost_applies(&siblings, total, expected) {
            debug!(pod = pod_label, %namespace, "setting low pod deletion cost");
            patches.extend(deletion_cost_patches(pod));
        }

        let outcome = if siblings.normal < expected.normal {
            debug!(pod = pod_label, %namespace, "fewer normal pods than expected, keeping normal");
            Outcome::KeepNormal
        } else {
            let affinity = node_affinity_for(&labels);
            patches.extend(spot_patches(pod, &affinity, &tolerations)?);
            debug!(pod = pod_label, %namespace, "assigning pod to spot");
            Outcome::AssignSpot
        };

        if dry_run {
            debug!(pod = pod_label, %namespace, outcome = outcome.as_str(), discarded = patches.len(), "dry run, discarding patches");
            patches.clear();
        }

        Ok(Decision {
            outcome,
            census: Some(siblings),
            expected: Some(expected),
            patches,
        })
    }
}

/// Normal pods may go first on scale-down once they are plentiful or the
/// normal target is already met.
fn deletion_cost_applies(census: &SiblingCensus, total: usize, expected: ExpectedCounts) -> bool {
    census.normal as f64 > total as f64 * DELETION_COST_NORMAL_SHARE || census.normal >= expected.normal
}
