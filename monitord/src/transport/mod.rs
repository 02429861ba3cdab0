//! Wire adapters over [`crate::endpoints::Endpoints`].

pub mod grpc;
pub mod http;
pub mod pb;
