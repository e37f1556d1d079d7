//! Cluster query error types.

use thiserror::Error;

/// Result type alias for cluster queries.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors raised while reading live cluster state.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),

    #[error("cluster unavailable: {0}")]
    Unavailable(String),
}
