//! spaled — the Spale admission webhook daemon.
//!
//! Spreads the pods of each Deployment across spot and normal capacity by
//! mutating pods at admission time.
//!
//! # Usage
//!
//! ```text
//! spaled serve --port 8080 --tls-port 8443 --spot-ratio 3:1
//! spaled config --config /etc/spale/spale.toml
//! ```

mod cli;
mod server;
mod tls;

use clap::Parser;
use spale_core::{LogFormat, WebhookConfig};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

/// Crates whose logs follow the configured level.
const LOG_TARGETS: &[&str] = &["spaled", "spale_core", "spale_cluster", "spale_webhook"];

fn init_tracing(config: &WebhookConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = config.tracing_level();
        let directives: Vec<String> = LOG_TARGETS.iter().map(|t| format!("{t}={level}")).collect();
        EnvFilter::new(format!("warn,{}", directives.join(",")))
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => {
            let config = args.resolve()?;
            init_tracing(&config);
            server::run(config).await
        }
        Command::Config(args) => {
            let config = args.resolve()?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}
