//! UAP server binary.
//!
//! Binds one UDP endpoint and runs the dispatch engine until terminated.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use uap_protocol::config::{ServerConfig, UapConfig, DEFAULT_PORT};
use uap_protocol::error::ProtocolError;
use uap_protocol::transport::udp;

#[derive(Parser)]
#[command(name = "uap-server")]
#[command(about = "UAP session protocol server", long_about = None)]
struct Args {
    /// UDP port to listen on
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Session inactivity timeout in seconds
    #[arg(long, default_value_t = 10)]
    inactivity_timeout: u64,

    /// Optional TOML config file; command-line flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> uap_protocol::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => UapConfig::from_file(path)?.server,
        None => ServerConfig::default(),
    };
    config.address = format!("0.0.0.0:{}", args.port);
    config.inactivity_timeout = Duration::from_secs(args.inactivity_timeout);

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ProtocolError::ConfigError(errors.join("; ")));
    }

    udp::serve(config).await
}
