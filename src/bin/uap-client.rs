//! UAP client binary.
//!
//! Runs one session against a server, feeding it lines from stdin or from
//! a file. A lone `q` line or end-of-input closes the session gracefully.

use std::path::PathBuf;
use std::pin::Pin;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::Parser;
use futures::Stream;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use uap_protocol::config::ClientConfig;
use uap_protocol::error::ProtocolError;
use uap_protocol::protocol::client::Client;

#[derive(Parser)]
#[command(name = "uap-client")]
#[command(about = "UAP session protocol client", long_about = None)]
struct Args {
    /// Server host
    host: String,

    /// Server port
    port: u16,

    /// Read lines from this file instead of stdin
    #[arg(long)]
    file: Option<PathBuf>,

    /// Response timeout in seconds
    #[arg(long, default_value_t = 5)]
    response_timeout: u64,

    /// Retries before the session is abandoned
    #[arg(long, default_value_t = 3)]
    max_retries: u32,
}

type LineStream = Pin<Box<dyn Stream<Item = std::io::Result<String>> + Send>>;

#[tokio::main]
async fn main() -> uap_protocol::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = ClientConfig {
        address: format!("{}:{}", args.host, args.port),
        response_timeout: Duration::from_secs(args.response_timeout),
        max_retries: args.max_retries,
    };
    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ProtocolError::ConfigError(errors.join("; ")));
    }

    // Session id from the current time, truncated to the 32-bit wire field.
    let session_id = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .map_err(|_| ProtocolError::ConfigError("system clock before UNIX epoch".to_string()))?;

    let input: LineStream = match &args.file {
        Some(path) => {
            let file = tokio::fs::File::open(path).await?;
            Box::pin(LinesStream::new(BufReader::new(file).lines()))
        }
        None => Box::pin(LinesStream::new(BufReader::new(tokio::io::stdin()).lines())),
    };

    let client = Client::connect(session_id, input, config).await?;
    client.run().await
}
