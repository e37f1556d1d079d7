//! Process-wide webhook configuration.
//!
//! Loaded once at startup (TOML file, then CLI/env overrides in the
//! daemon) and shared read-only by every request afterwards.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, PolicyError};
use crate::policy::PolicyDefaults;

/// Wildcard entry in the namespace selector.
pub const ALL_NAMESPACES: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Plain HTTP port.
    pub port: u16,
    /// HTTPS port.
    pub tls_port: u16,
    pub tls_cert: PathBuf,
    pub tls_key: PathBuf,
    /// Serve HTTPS on `tls_port` in addition to plain HTTP.
    pub tls_enabled: bool,
    /// One of `debug`, `info`, `warn`, `error`.
    pub log_level: String,
    pub log_format: LogFormat,
    /// Namespaces the webhook acts on; `*` means all.
    pub namespace_selector: Vec<String>,
    /// Namespaces skipped unless the workload opts in.
    pub except_namespaces: Vec<String>,
    pub spot_node_labels: Vec<String>,
    pub spot_node_tolerations: Vec<String>,
    pub spot_ratio: String,
    /// Tag pods with a negative `pod-deletion-cost` so normal pods go first on scale-down.
    pub deletion_cost: bool,
    /// Upper bound on a single admission decision, in seconds.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            tls_port: 8443,
            tls_cert: PathBuf::from("/etc/ssl/cert.pem"),
            tls_key: PathBuf::from("/etc/ssl/cert.key"),
            tls_enabled: true,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            namespace_selector: vec![ALL_NAMESPACES.to_string()],
            except_namespaces: vec!["kube-system".to_string()],
            spot_node_labels: vec!["nodepool=spot".to_string()],
            spot_node_tolerations: vec!["type=spot:NoSchedule".to_string()],
            spot_ratio: "3:1".to_string(),
            deletion_cost: false,
            request_timeout_secs: 10,
        }
    }
}

impl WebhookConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Policy fallbacks for workloads that leave a field unannotated.
    pub fn policy_defaults(&self) -> PolicyDefaults {
        PolicyDefaults {
            ratio: self.spot_ratio.clone(),
            node_labels: self.spot_node_labels.clone(),
            node_tolerations: self.spot_node_tolerations.clone(),
        }
    }

    pub fn namespace_filter(&self) -> NamespaceFilter {
        NamespaceFilter {
            selector: self.namespace_selector.clone(),
            except: self.except_namespaces.clone(),
        }
    }

    /// Reject defaults that would break every workload relying on them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.spot_node_labels.iter().all(|l| l.trim().is_empty()) {
            return Err(ConfigError::NoNodeLabels);
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        self.policy_defaults().validate().map_err(|e| match e {
            PolicyError::InvalidRatio(_) => ConfigError::Ratio(e),
            PolicyError::InvalidToleration { .. } => ConfigError::Toleration(e),
            PolicyError::InvalidLabel(_) => ConfigError::Label(e),
        })
    }

    /// Verbosity for the tracing filter; unknown levels mean `info`.
    pub fn tracing_level(&self) -> &'static str {
        match self.log_level.trim().to_ascii_lowercase().as_str() {
            "debug" => "debug",
            "warn" => "warn",
            "error" => "error",
            _ => "info",
        }
    }
}

/// Namespace allow/deny lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceFilter {
    pub selector: Vec<String>,
    pub except: Vec<String>,
}

/// Outcome of checking a namespace against the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceVerdict {
    Allowed,
    /// Outside the filter, but the workload opted in.
    OptedIn,
    NotSelected,
    Excepted,
}

impl NamespaceVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, NamespaceVerdict::Allowed | NamespaceVerdict::OptedIn)
    }
}

impl NamespaceFilter {
    pub fn check(&self, namespace: &str, opt_in: bool) -> NamespaceVerdict {
        let selected = self
            .selector
            .iter()
            .any(|s| s == ALL_NAMESPACES || s == namespace);
        let excepted = self.except.iter().any(|s| s == namespace);

        match (selected && !excepted, opt_in) {
            (true, _) => NamespaceVerdict::Allowed,
            (false, true) => NamespaceVerdict::OptedIn,
            (false, false) if !selected => NamespaceVerdict::NotSelected,
            (false, false) => NamespaceVerdict::Excepted,
        }
    }
}
