use std::net::SocketAddr;
use std::process;
use std::time::Duration;

use clap::Parser;

use qr_watermark::server::{self, ServerConfig};

#[derive(Parser)]
#[command(
    name = "qr-watermark-server",
    about = "Serve the QR watermark generator over HTTP",
    version
)]
struct Args {
    /// Address to listen on
    #[arg(short, long, env = "QR_WATERMARK_BIND", default_value = "0.0.0.0:5000")]
    bind: SocketAddr,

    /// Largest accepted upload in bytes
    #[arg(long, env = "QR_WATERMARK_MAX_BODY", default_value = "10485760")]
    max_body_bytes: usize,

    /// Per-request timeout in seconds
    #[arg(long, env = "QR_WATERMARK_TIMEOUT_SECS", default_value = "30")]
    timeout_secs: u64,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    qr_watermark::logging::init(if args.verbose { "debug" } else { "info" });

    if args.timeout_secs == 0 {
        eprintln!("Error: Timeout must be at least 1 second");
        process::exit(1);
    }

    let config = ServerConfig {
        bind: args.bind,
        max_body_bytes: args.max_body_bytes,
        request_timeout: Duration::from_secs(args.timeout_secs),
    };
    tracing::info!(
        bind = %config.bind,
        max_body_bytes = config.max_body_bytes,
        timeout_secs = args.timeout_secs,
        "starting qr-watermark server"
    );

    if let Err(e) = server::serve(config).await {
        eprintln!("Fatal: {e}");
        process::exit(1);
    }
}
