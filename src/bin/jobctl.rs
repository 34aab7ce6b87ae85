use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tonic::transport::Channel;
use tonic::Request;

use jobd::config::TlsConfig;
use jobd::proto::job_service_client::JobServiceClient;
use jobd::proto::{QueryRequest, StartRequest, StopRequest, StreamRequest};
use jobd::tls::TlsIdentity;

#[derive(Parser, Debug)]
#[command(name = "jobctl")]
#[command(about = "Client for the jobd remote job execution service")]
struct Args {
    /// Server endpoint
    #[arg(long, default_value = "https://127.0.0.1:50051")]
    server: String,

    /// Domain name the server certificate was issued for
    #[arg(long, default_value = "localhost")]
    domain: String,

    /// CA certificate used to verify the server
    #[arg(long)]
    ca_cert: Option<PathBuf>,

    /// Client certificate (PEM) carrying the role extension
    #[arg(long)]
    cert: Option<PathBuf>,

    /// Client private key (PEM)
    #[arg(long)]
    key: Option<PathBuf>,

    /// Connect without TLS (the server must allow it)
    #[arg(long)]
    allow_insecure: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Start a process on the server
    Start {
        /// Program name or path
        name: String,
        /// Program arguments
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Send SIGTERM to a running job
    Stop { job_id: String },
    /// Show the status of a job
    Query { job_id: String },
    /// Replay a job's output from the beginning and follow it live
    Stream { job_id: String },
}

async fn connect(args: &Args) -> Result<JobServiceClient<Channel>, Box<dyn std::error::Error>> {
    let mut endpoint = Channel::from_shared(args.server.clone())?;

    if !args.allow_insecure {
        let tls = TlsConfig {
            enabled: true,
            ca_cert_path: args.ca_cert.clone(),
            cert_path: args.cert.clone(),
            key_path: args.key.clone(),
            allow_insecure: false,
        };
        let identity = TlsIdentity::load(&tls).await?;
        endpoint = endpoint.tls_config(identity.client_tls_config(&args.domain))?;
    }

    let channel = endpoint.connect().await?;
    Ok(JobServiceClient::new(channel))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut client = connect(&args).await?;

    match &args.command {
        Cmd::Start { name, args: cmd_args } => {
            let response = client
                .start(Request::new(StartRequest {
                    name: name.clone(),
                    args: cmd_args.clone(),
                }))
                .await?;
            println!("{}", response.into_inner().job_id);
        }
        Cmd::Stop { job_id } => {
            client
                .stop(Request::new(StopRequest {
                    job_id: job_id.clone(),
                }))
                .await?;
            println!("stopped {}", job_id);
        }
        Cmd::Query { job_id } => {
            let status = client
                .query(Request::new(QueryRequest {
                    job_id: job_id.clone(),
                }))
                .await?
                .into_inner();
            println!(
                "pid: {}  exit_code: {}  exited: {}",
                status.pid, status.exit_code, status.exited
            );
        }
        Cmd::Stream { job_id } => {
            let mut stream = client
                .stream(Request::new(StreamRequest {
                    job_id: job_id.clone(),
                }))
                .await?
                .into_inner();

            let mut stdout = tokio::io::stdout();
            while let Some(chunk) = stream.message().await? {
                stdout.write_all(&chunk.output).await?;
                stdout.flush().await?;
            }
        }
    }

    Ok(())
}
