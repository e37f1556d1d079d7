//! Error types for policy parsing and configuration.

use thiserror::Error;

/// Result type alias for policy parsing.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Syntax errors in ratio, label, or toleration strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("invalid ratio {0:?}: expected two positive numbers as N:M")]
    InvalidRatio(String),

    #[error("invalid toleration {entry:?}: {reason}")]
    InvalidToleration { entry: String, reason: &'static str },

    #[error("invalid node label {0:?}: empty key")]
    InvalidLabel(String),
}

/// Errors found while validating the process configuration at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("default spot ratio: {0}")]
    Ratio(PolicyError),

    #[error("default spot tolerations: {0}")]
    Toleration(PolicyError),

    #[error("default spot node labels: {0}")]
    Label(PolicyError),

    #[error("at least one default spot node label is required")]
    NoNodeLabels,

    #[error("request timeout must be greater than zero")]
    ZeroTimeout,
}
