//! Webhook error types.

use spale_cluster::ClusterError;
use thiserror::Error;

/// Result type alias for decision engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// The inbound admission envelope could not be understood.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed admission review: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("admission review has no request")]
    MissingRequest,

    #[error("admission request has no object")]
    MissingObject,

    #[error("admission object is not a pod: {0}")]
    Pod(#[source] serde_json::Error),

    #[error("admission request has no namespace")]
    MissingNamespace,
}

/// A decision could not be completed; no patch is returned.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cluster query failed: {0}")]
    Cluster(#[from] ClusterError),

    #[error("failed to serialize patch: {0}")]
    Serialize(#[from] serde_json::Error),
}
