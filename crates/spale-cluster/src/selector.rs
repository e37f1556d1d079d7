//! Label selector rendering and local evaluation.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};

/// Render a selector in the API's query-string form,
/// e.g. `app=web,tier in (a,b),!legacy`.
pub fn format_label_selector(selector: &LabelSelector) -> String {
    let mut parts: Vec<String> = selector
        .match_labels
        .iter()
        .flatten()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();

    for req in selector.match_expressions.iter().flatten() {
        let values = || req.values.as_deref().unwrap_or_default().join(",");
        match req.operator.as_str() {
            "In" => parts.push(format!("{} in ({})", req.key, values())),
            "NotIn" => parts.push(format!("{} notin ({})", req.key, values())),
            "Exists" => parts.push(req.key.clone()),
            "DoesNotExist" => parts.push(format!("!{}", req.key)),
            _ => {}
        }
    }

    parts.join(",")
}

/// Whether `selector` has no requirements at all (and so matches everything).
pub fn is_empty_selector(selector: &LabelSelector) -> bool {
    selector.match_labels.as_ref().is_none_or(BTreeMap::is_empty)
        && selector.match_expressions.as_ref().is_none_or(Vec::is_empty)
}

/// Evaluate `selector` against a label set.
pub fn selector_matches(selector: &LabelSelector, labels: Option<&BTreeMap<String, String>>) -> bool {
    let empty = BTreeMap::new();
    let labels = labels.unwrap_or(&empty);

    let labels_ok = selector
        .match_labels
        .iter()
        .flatten()
        .all(|(k, v)| labels.get(k) == Some(v));

    labels_ok
        && selector
            .match_expressions
            .iter()
            .flatten()
            .all(|req| requirement_matches(req, labels))
}

fn requirement_matches(req: &LabelSelectorRequirement, labels: &BTreeMap<String, String>) -> bool {
    let values = req.values.as_deref().unwrap_or_default();
    match req.operator.as_str() {
        "In" => labels.get(&req.key).is_some_and(|v| values.contains(v)),
        "NotIn" => labels.get(&req.key).is_none_or(|v| !values.contains(v)),
        "Exists" => labels.contains_key(&req.key),
        "DoesNotExist" => !labels.contains_key(&req.key),
        _ => false,
    }
}
