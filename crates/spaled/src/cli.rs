//! Command line and environment overrides.
//!
//! Every setting can come from a TOML file, an environment variable, or a
//! flag. Flags and environment win over the file; the file wins over the
//! built-in defaults.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use spale_core::{LogFormat, WebhookConfig};

#[derive(Parser)]
#[command(name = "spaled", about = "Spale admission webhook daemon", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve the mutating webhook.
    Serve(ConfigArgs),
    /// Print the effective configuration as TOML and exit.
    Config(ConfigArgs),
}

#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// TOML configuration file.
    #[arg(long, env = "SPALE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Plain HTTP port.
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// HTTPS port.
    #[arg(long, env = "TLS_PORT")]
    pub tls_port: Option<u16>,

    /// PEM certificate chain for HTTPS.
    #[arg(long, env = "TLS_CERT")]
    pub tls_cert: Option<PathBuf>,

    /// PEM private key for HTTPS.
    #[arg(long, env = "TLS_KEY")]
    pub tls_key: Option<PathBuf>,

    /// Serve plain HTTP only.
    #[arg(long)]
    pub no_tls: bool,

    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// `text` or `json`.
    #[arg(long, env = "LOG_FORMAT", value_parser = ["text", "json"])]
    pub log_format: Option<String>,

    /// Namespaces to act on; `*` for all.
    #[arg(long, env = "NAMESPACE_SELECTOR", value_delimiter = ',')]
    pub namespace_selector: Option<Vec<String>>,

    /// Namespaces to skip unless a workload opts in.
    #[arg(long, env = "EXCEPT_NAMESPACES", value_delimiter = ',')]
    pub except_namespaces: Option<Vec<String>>,

    /// Default spot node labels, `key=value`.
    #[arg(long, env = "SPOT_NODE_LABELS", value_delimiter = ',')]
    pub spot_node_labels: Option<Vec<String>>,

    /// Default spot tolerations, `key=value:effect`.
    #[arg(long, env = "SPOT_NODE_TOLERATIONS", value_delimiter = ',')]
    pub spot_node_tolerations: Option<Vec<String>>,

    /// Default `spot:normal` ratio.
    #[arg(long, env = "SPOT_RATIO")]
    pub spot_ratio: Option<String>,

    /// Tag pods with a low pod-deletion-cost.
    #[arg(long, env = "DELETION_COST")]
    pub deletion_cost: Option<bool>,

    /// Upper bound on a single decision, in seconds.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,
}

/// Trim list entries and drop empty ones.
fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

impl ConfigArgs {
    /// Load the file (if any), overlay flags and environment, and validate.
    pub fn resolve(self) -> anyhow::Result<WebhookConfig> {
        let mut config = match &self.config {
            Some(path) => WebhookConfig::from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => WebhookConfig::default(),
        };
        self.apply(&mut config);
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn apply(self, config: &mut WebhookConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(port) = self.tls_port {
            config.tls_port = port;
        }
        if let Some(cert) = self.tls_cert {
            config.tls_cert = cert;
        }
        if let Some(key) = self.tls_key {
            config.tls_key = key;
        }
        if self.no_tls {
            config.tls_enabled = false;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.log_format = match format.as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Text,
            };
        }
        if let Some(selector) = self.namespace_selector {
            config.namespace_selector = clean_list(selector);
        }
        if let Some(except) = self.except_namespaces {
            config.except_namespaces = clean_list(except);
        }
        if let Some(labels) = self.spot_node_labels {
            config.spot_node_labels = clean_list(labels);
        }
        if let Some(tolerations) = self.spot_node_tolerations {
            config.spot_node_tolerations = clean_list(tolerations);
        }
        if let Some(ratio) = self.spot_ratio {
            config.spot_ratio = ratio.trim().to_string();
        }
        if let Some(enabled) = self.deletion_cost {
            config.deletion_cost = enabled;
        }
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout_secs = secs;
        }
    }
}
