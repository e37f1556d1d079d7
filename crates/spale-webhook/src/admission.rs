//! AdmissionReview envelope codec.
//!
//! Decodes the inbound review into the pod being created and encodes the
//! outbound review carrying a base64 JSON Patch. Every response allows
//! the request; the webhook only ever mutates.

use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Pod;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DecodeError;
use crate::patch::PatchOperation;

const DEFAULT_API_VERSION: &str = "admission.k8s.io/v1";
const DEFAULT_KIND: &str = "AdmissionReview";
const PATCH_TYPE_JSON_PATCH: &str = "JSONPatch";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdmissionReviewRequest {
    api_version: Option<String>,
    kind: Option<String>,
    request: Option<AdmissionRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdmissionRequest {
    uid: String,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    dry_run: Option<bool>,
    #[serde(default)]
    object: Option<serde_json::Value>,
}

/// A decoded pod admission request.
#[derive(Debug, Clone)]
pub struct PodAdmission {
    pub uid: String,
    pub api_version: String,
    pub kind: String,
    pub namespace: String,
    pub dry_run: bool,
    pub pod: Pod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewResponse {
    pub api_version: String,
    pub kind: String,
    pub response: AdmissionResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    /// JSON Patch document; serialized as base64.
    pub patch: ByteString,
    pub patch_type: String,
}

/// Decode an AdmissionReview body into the pod under admission.
///
/// Pods created through `generateName` often carry no namespace yet; the
/// request's namespace fills it in. A review with no namespace anywhere is
/// rejected: owner and sibling lookups are namespaced and cannot run
/// without one.
pub fn decode(body: &[u8]) -> Result<PodAdmission, DecodeError> {
    let review: AdmissionReviewRequest =
        serde_json::from_slice(body).map_err(DecodeError::Envelope)?;
    let request = review.request.ok_or(DecodeError::MissingRequest)?;
    let object = request.object.ok_or(DecodeError::MissingObject)?;
    let mut pod: Pod = serde_json::from_value(object).map_err(DecodeError::Pod)?;

    let namespace = pod
        .metadata
        .namespace
        .clone()
        .filter(|ns| !ns.is_empty())
        .or(request.namespace.filter(|ns| !ns.is_empty()))
        .ok_or(DecodeError::MissingNamespace)?;
    pod.metadata.namespace = Some(namespace.clone());

    debug!(uid = %request.uid, %namespace, "admission review decoded");

    Ok(PodAdmission {
        uid: request.uid,
        api_version: review.api_version.unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
        kind: review.kind.unwrap_or_else(|| DEFAULT_KIND.to_string()),
        namespace,
        dry_run: request.dry_run.unwrap_or(false),
        pod,
    })
}

/// Encode an allowing AdmissionReview response carrying `patches`.
pub fn encode(
    admission: &PodAdmission,
    patches: &[PatchOperation],
) -> serde_json::Result<AdmissionReviewResponse> {
    let patch = serde_json::to_vec(patches)?;
    Ok(AdmissionReviewResponse {
        api_version: admission.api_version.clone(),
        kind: admission.kind.clone(),
        response: AdmissionResponse {
            uid: admission.uid.clone(),
            allowed: true,
            patch: ByteString(patch),
            patch_type: PATCH_TYPE_JSON_PATCH.to_string(),
        },
    })
}
