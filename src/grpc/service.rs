use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::{CancellationToken, DropGuard};
use tonic::{Request, Response, Status};
use uuid::Uuid;

use crate::auth::{self, method, Policy};
use crate::error::JobError;
use crate::proto::job_service_server::JobService;
use crate::proto::{
    QueryRequest, QueryResponse, StartRequest, StartResponse, StopRequest, StopResponse,
    StreamRequest, StreamResponse,
};
use crate::worker::{Command, JobEngine};

/// gRPC surface over the job engine.
pub struct WorkerService {
    engine: Arc<JobEngine>,
    /// `None` when the server runs without TLS: there are no client
    /// certificates to read roles from, so the surface is open.
    policy: Option<Policy>,
}

impl WorkerService {
    pub fn new(engine: Arc<JobEngine>, policy: Option<Policy>) -> Self {
        Self { engine, policy }
    }

    fn authorize<T>(&self, request: &Request<T>, method: &str) -> Result<(), Status> {
        match &self.policy {
            Some(policy) => auth::authorize(request, method, policy),
            None => Ok(()),
        }
    }
}

fn parse_job_id(raw: &str) -> Result<Uuid, Status> {
    Uuid::parse_str(raw).map_err(|_| Status::invalid_argument("Invalid job ID"))
}

/// Engine errors all surface as a generic internal status with a readable
/// message; only authorization produces permission errors.
fn into_status(err: JobError) -> Status {
    Status::internal(err.to_string())
}

#[tonic::async_trait]
impl JobService for WorkerService {
    async fn start(
        &self,
        request: Request<StartRequest>,
    ) -> Result<Response<StartResponse>, Status> {
        self.authorize(&request, method::START)?;
        let req = request.into_inner();

        if req.name.trim().is_empty() {
            return Err(Status::invalid_argument("Command name cannot be empty"));
        }

        let id = self
            .engine
            .start(Command {
                name: req.name,
                args: req.args,
            })
            .await
            .map_err(into_status)?;

        Ok(Response::new(StartResponse {
            job_id: id.to_string(),
        }))
    }

    async fn stop(&self, request: Request<StopRequest>) -> Result<Response<StopResponse>, Status> {
        self.authorize(&request, method::STOP)?;
        let id = parse_job_id(&request.get_ref().job_id)?;

        self.engine.stop(&id).map_err(into_status)?;
        Ok(Response::new(StopResponse {}))
    }

    async fn query(
        &self,
        request: Request<QueryRequest>,
    ) -> Result<Response<QueryResponse>, Status> {
        self.authorize(&request, method::QUERY)?;
        let id = parse_job_id(&request.get_ref().job_id)?;

        let status = self.engine.query(&id).map_err(into_status)?;
        Ok(Response::new(QueryResponse {
            pid: status.pid,
            exit_code: status.exit_code,
            exited: status.exited,
        }))
    }

    type StreamStream = Pin<Box<dyn Stream<Item = Result<StreamResponse, Status>> + Send>>;

    async fn stream(
        &self,
        request: Request<StreamRequest>,
    ) -> Result<Response<Self::StreamStream>, Status> {
        self.authorize(&request, method::STREAM)?;
        let id = parse_job_id(&request.get_ref().job_id)?;

        // Cancelled when the response stream is dropped; this is how a
        // client disconnect reaches the tailer and the file watch.
        let token = CancellationToken::new();
        let chunks = self
            .engine
            .stream(token.clone(), &id)
            .await
            .map_err(into_status)?;

        let stream = CancelOnDrop {
            inner: ReceiverStream::new(chunks)
                .map(|output| Ok::<_, Status>(StreamResponse { output })),
            _guard: token.drop_guard(),
        };

        Ok(Response::new(Box::pin(stream)))
    }
}

/// Response stream that cancels its tail when the transport drops it.
struct CancelOnDrop<S> {
    inner: S,
    _guard: DropGuard,
}

impl<S: Stream + Unpin> Stream for CancelOnDrop<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}
