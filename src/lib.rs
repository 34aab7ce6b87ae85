pub mod auth;
pub mod config;
pub mod error;
pub mod grpc;
pub mod logs;
pub mod shutdown;
pub mod tls;
pub mod worker;

// Re-export generated protobuf types
pub mod proto {
    tonic::include_proto!("jobd");
}
