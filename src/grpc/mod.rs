pub mod server;
pub mod service;

pub use server::GrpcServer;
pub use service::WorkerService;
