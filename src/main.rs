use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use jobd::config::{Config, TlsConfig};
use jobd::grpc::GrpcServer;
use jobd::shutdown;
use jobd::tls::TlsIdentity;
use jobd::worker::JobEngine;

#[derive(Parser, Debug)]
#[command(name = "jobd")]
#[command(about = "Remote job execution server")]
struct Args {
    /// Address to listen on for gRPC
    #[arg(long, default_value = "127.0.0.1:50051")]
    listen: SocketAddr,

    /// Directory where per-job log files are written (defaults to the
    /// system temp directory)
    #[arg(long)]
    log_folder: Option<PathBuf>,

    /// Read size in bytes for each log chunk served to stream subscribers
    #[arg(long, default_value = "1024")]
    log_chunk_size: usize,

    /// CA certificate used to verify client certificates
    #[arg(long)]
    ca_cert: Option<PathBuf>,

    /// Server certificate (PEM)
    #[arg(long)]
    cert: Option<PathBuf>,

    /// Server private key (PEM)
    #[arg(long)]
    key: Option<PathBuf>,

    /// Serve plaintext without role checks. Local development only.
    #[arg(long)]
    allow_insecure: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = Config {
        listen_addr: args.listen,
        log_folder: args.log_folder.unwrap_or_else(std::env::temp_dir),
        log_chunk_size: args.log_chunk_size,
        tls: TlsConfig {
            enabled: !args.allow_insecure,
            ca_cert_path: args.ca_cert,
            cert_path: args.cert,
            key_path: args.key,
            allow_insecure: args.allow_insecure,
        },
    };

    let identity = if config.tls.allow_insecure {
        tracing::warn!("TLS disabled; serving without authentication");
        None
    } else if config.tls.is_complete() {
        Some(TlsIdentity::load(&config.tls).await?)
    } else {
        return Err("TLS requires --ca-cert, --cert and --key (or pass --allow-insecure)".into());
    };

    tracing::info!(
        listen = %config.listen_addr,
        log_folder = %config.log_folder.display(),
        chunk_size = config.log_chunk_size,
        "Starting jobd"
    );

    let engine = Arc::new(JobEngine::new(&config));
    let server = GrpcServer::new(config.listen_addr, engine, identity);
    let token = shutdown::install_shutdown_handler();

    server.run(token).await?;

    Ok(())
}
