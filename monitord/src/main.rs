use anyhow::Context;
use clap::Parser;
use monitord::config::Config;
use monitord::endpoints::Endpoints;
use monitord::metrics::Metrics;
use monitord::middleware::{InstrumentingLayer, LoggingLayer};
use monitord::service::{Monitor, MonitorService};
use monitord::store::{MemoryStore, RedisStore};
use monitord::transport::{grpc::GrpcServer, http};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("Starting fleet monitor");
    info!("HTTP server: {}", config.http_addr);
    info!("gRPC server: {}", config.grpc_addr);
    info!("Debug server: {}", config.debug_addr);

    let metrics = Metrics::new().context("failed to register metrics")?;

    let svc: Arc<dyn MonitorService> = match &config.redis_url {
        Some(url) => {
            info!("Store: redis at {}", config.redis_display().unwrap_or("***"));
            let store = RedisStore::connect(url, config.redis_pool_size)
                .context("failed to create Redis pool")?;
            Arc::new(
                ServiceBuilder::new()
                    .layer(LoggingLayer)
                    .layer(InstrumentingLayer::new(metrics.service_counters()))
                    .service(Monitor::new(store)),
            )
        }
        None => {
            warn!("REDIS_URL not set, using the in-memory store; data is lost on exit");
            Arc::new(
                ServiceBuilder::new()
                    .layer(LoggingLayer)
                    .layer(InstrumentingLayer::new(metrics.service_counters()))
                    .service(Monitor::new(MemoryStore::new())),
            )
        }
    };

    let endpoints = Endpoints::new(svc).instrumented(&metrics.request_duration);

    let debug_listener = tokio::net::TcpListener::bind(config.debug_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.debug_addr))?;
    let debug_app = http::create_debug_router(metrics.clone());
    let debug_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(debug_listener, debug_app).await {
            error!("Debug server error: {}", e);
        }
    });

    let http_listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.http_addr))?;
    let http_app = http::create_router(endpoints.clone());
    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(http_listener, http_app).await {
            error!("HTTP server error: {}", e);
        }
    });

    let grpc_addr = config.grpc_addr;
    let grpc_service = GrpcServer::new(endpoints).into_service();
    let grpc_handle = tokio::spawn(async move {
        if let Err(e) = tonic::transport::Server::builder()
            .add_service(grpc_service)
            .serve(grpc_addr)
            .await
        {
            error!("gRPC server error: {}", e);
        }
    });

    info!("Listening");

    tokio::select! {
        _ = debug_handle => {
            error!("Debug server terminated");
        }
        _ = http_handle => {
            error!("HTTP server terminated");
        }
        _ = grpc_handle => {
            error!("gRPC server terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
    Ok(())
}
