//! Required node affinity for spot placement, and spot classification.
//!
//! Classification is structural: a pod counts as spot when its required
//! node affinity already carries every label pair the policy would assign.
//! The node a pod actually landed on is never inspected, so switching to a
//! live node-label check would change which pods count as spot.

use k8s_openapi::api::core::v1::{
    NodeAffinity, NodeSelector, NodeSelectorRequirement, NodeSelectorTerm, Pod,
};

use crate::policy::{LabelPair, WorkloadPolicy};

const OPERATOR_IN: &str = "In";

/// Build a required node affinity whose single term ANDs every label pair.
pub fn node_affinity_for(pairs: &[LabelPair]) -> NodeAffinity {
    let match_expressions = pairs
        .iter()
        .map(|pair| NodeSelectorRequirement {
            key: pair.key.clone(),
            operator: OPERATOR_IN.to_string(),
            values: Some(vec![pair.value.clone()]),
        })
        .collect();

    NodeAffinity {
        required_during_scheduling_ignored_during_execution: Some(NodeSelector {
            node_selector_terms: vec![NodeSelectorTerm {
                match_expressions: Some(match_expressions),
                match_fields: None,
            }],
        }),
        preferred_during_scheduling_ignored_during_execution: None,
    }
}

/// Whether `pod` already requires every node label `policy` declares.
///
/// Matches are counted across all required terms combined; one unmatched
/// label pair disqualifies the pod. A policy with no labels never matches.
pub fn pod_is_spot(pod: &Pod, policy: &WorkloadPolicy) -> bool {
    let pairs = policy.label_pairs();
    if pairs.is_empty() {
        return false;
    }

    let Some(terms) = pod
        .spec
        .as_ref()
        .and_then(|spec| spec.affinity.as_ref())
        .and_then(|affinity| affinity.node_affinity.as_ref())
        .and_then(|na| na.required_during_scheduling_ignored_during_execution.as_ref())
        .map(|selector| &selector.node_selector_terms)
    else {
        return false;
    };

    let requirements: Vec<&NodeSelectorRequirement> = terms
        .iter()
        .filter_map(|term| term.match_expressions.as_ref())
        .flatten()
        .collect();

    let matched = pairs
        .iter()
        .filter(|pair| {
            requirements.iter().any(|req| {
                req.key == pair.key
                    && req.operator == OPERATOR_IN
                    && req
                        .values
                        .as_ref()
                        .is_some_and(|values| values.contains(&pair.value))
            })
        })
        .count();

    matched == pairs.len()
}
