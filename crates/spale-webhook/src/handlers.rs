//! Webhook HTTP handlers.
//!
//! `mutate` decodes the AdmissionReview, runs the decision engine under the
//! configured timeout, and answers with the patch. Failures never produce a
//! partial patch: the API server sees a non-2xx status and applies its
//! failure policy.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use spale_cluster::ClusterQuery;
use tracing::{error, info, warn};

use crate::WebhookState;
use crate::admission;

/// Error body, shaped like the rest of the daemon's JSON responses.
#[derive(serde::Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: msg.to_string(),
        }),
    )
}

/// POST /mutate
pub async fn mutate<C: ClusterQuery>(
    State(state): State<WebhookState<C>>,
    body: Bytes,
) -> impl IntoResponse {
    let review = match admission::decode(&body) {
        Ok(review) => review,
        Err(e) => {
            warn!(error = %e, "rejecting malformed admission review");
            return error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response();
        }
    };

    let decision = tokio::time::timeout(
        state.timeout,
        state.engine.decide(&review.pod, &review.namespace, review.dry_run),
    )
    .await;

    let decision = match decision {
        Ok(Ok(decision)) => decision,
        Ok(Err(e)) => {
            error!(uid = %review.uid, namespace = %review.namespace, error = %e, "decision failed");
            return error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response();
        }
        Err(_) => {
            error!(uid = %review.uid, namespace = %review.namespace, timeout = ?state.timeout, "decision timed out");
            return error_response("decision timed out", StatusCode::INTERNAL_SERVER_ERROR).into_response();
        }
    };

    match admission::encode(&review, &decision.patches) {
        Ok(response) => {
            info!(
                uid = %review.uid,
                namespace = %review.namespace,
                outcome = decision.outcome.as_str(),
                patches = decision.patches.len(),
                dry_run = review.dry_run,
                "admission reviewed"
            );
            Json(response).into_response()
        }
        Err(e) => {
            error!(uid = %review.uid, error = %e, "failed to encode admission response");
            error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}

/// GET /healthz
pub async fn healthz() -> &'static str {
    "ok"
}
