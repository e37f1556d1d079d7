//! spale-webhook — mutating admission webhook for spot/normal placement.
//!
//! Decodes AdmissionReview requests, asks the decision engine whether the
//! pod should be pinned to spot capacity, and answers with a JSON Patch.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/mutate` | AdmissionReview in, AdmissionReview with patch out |
//! | GET | `/healthz` | Liveness check |

pub mod admission;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod patch;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use spale_cluster::ClusterQuery;

pub use admission::{AdmissionReviewResponse, PodAdmission};
pub use engine::{Decision, DecisionEngine, EngineSettings, Outcome};
pub use error::{DecodeError, EngineError, EngineResult};
pub use patch::{PatchOp, PatchOperation};

/// Shared state for webhook handlers.
pub struct WebhookState<C> {
    pub engine: Arc<DecisionEngine<C>>,
    /// Upper bound on a single decision.
    pub timeout: Duration,
}

impl<C> Clone for WebhookState<C> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            timeout: self.timeout,
        }
    }
}

/// Build the webhook router.
pub fn build_router<C: ClusterQuery>(engine: DecisionEngine<C>, timeout: Duration) -> Router {
    let state = WebhookState {
        engine: Arc::new(engine),
        timeout,
    };

    Router::new()
        .route("/mutate", post(handlers::mutate::<C>))
        .route("/healthz", get(handlers::healthz))
        .with_state(state)
}
