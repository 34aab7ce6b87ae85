use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

use crate::auth::Policy;
use crate::grpc::service::WorkerService;
use crate::proto::job_service_server::JobServiceServer;
use crate::tls::TlsIdentity;
use crate::worker::JobEngine;

pub struct GrpcServer {
    addr: SocketAddr,
    engine: Arc<JobEngine>,
    tls: Option<TlsIdentity>,
}

impl GrpcServer {
    pub fn new(addr: SocketAddr, engine: Arc<JobEngine>, tls: Option<TlsIdentity>) -> Self {
        Self { addr, engine, tls }
    }

    /// Serve until `shutdown` fires, draining in-flight requests.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), tonic::transport::Error> {
        let mut builder = Server::builder();

        // Role checks need peer certificates, so the policy only exists
        // alongside TLS; without it the server runs open (dev mode).
        let policy = self.tls.as_ref().map(|_| Policy::default());
        if let Some(tls) = &self.tls {
            builder = builder.tls_config(tls.server_tls_config())?;
        }

        let service = WorkerService::new(self.engine, policy);

        tracing::info!(addr = %self.addr, tls = self.tls.is_some(), "Starting gRPC server");

        builder
            .add_service(JobServiceServer::new(service))
            .serve_with_shutdown(self.addr, shutdown.cancelled_owned())
            .await
    }
}
