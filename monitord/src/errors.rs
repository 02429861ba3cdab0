use thiserror::Error;

/// Process-level failures raised while wiring the monitor up.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Redis pool error: {0}")]
    RedisPool(#[from] deadpool_redis::CreatePoolError),

    #[error("gRPC transport error: {0}")]
    Grpc(#[from] tonic::transport::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by a [`crate::store::Store`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("redis error: {0}")]
    Redis(#[from] deadpool_redis::redis::RedisError),
}

impl From<deadpool_redis::PoolError> for StoreError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Business failures returned by a [`crate::service::MonitorService`].
///
/// These travel inside reply payloads as strings, so the client side only ever
/// sees [`ServiceError::Remote`] for failures that happened on the server.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("call cancelled")]
    Cancelled,

    #[error("{0}")]
    Remote(String),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

/// Faults of an endpoint invocation itself, as opposed to business errors
/// carried in the reply.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("call cancelled before dispatch")]
    Cancelled,

    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("transport error: {0}")]
    Transport(#[from] tonic::Status),
}
