use crate::endpoints::{
    Call, Endpoints, RegisterReply, RegisterRequest, TelemetryReply, TelemetryRequest,
    UpdateReply, UpdateRequest,
};
use crate::errors::EndpointError;
use crate::metrics::Metrics;
use crate::service::CallContext;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use tracing::error;

/// JSON routes of the monitor. Malformed bodies and non-numeric ids are
/// rejected by the extractors before anything is dispatched.
pub fn create_router(endpoints: Endpoints) -> Router {
    Router::new()
        .route("/v1/devices", post(register_device))
        .route("/v1/devices/:id/status", put(update_status))
        .route("/v1/devices/:id/telemetry", put(submit_telemetry))
        .route("/health", get(health))
        .with_state(endpoints)
}

/// Debug listener routes.
pub fn create_debug_router(metrics: Metrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

async fn register_device(
    State(endpoints): State<Endpoints>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterReply>, AppError> {
    let reply = endpoints.register(Call::new(CallContext::new(), req)).await?;
    Ok(Json(reply))
}

async fn update_status(
    State(endpoints): State<Endpoints>,
    Path(id): Path<u64>,
    Json(mut req): Json<UpdateRequest>,
) -> Result<Json<UpdateReply>, AppError> {
    req.device_id = id;
    let reply = endpoints.update(Call::new(CallContext::new(), req)).await?;
    Ok(Json(reply))
}

async fn submit_telemetry(
    State(endpoints): State<Endpoints>,
    Path(id): Path<u64>,
    Json(mut req): Json<TelemetryRequest>,
) -> Result<Json<TelemetryReply>, AppError> {
    req.device_id = id;
    let reply = endpoints
        .telemetry(Call::new(CallContext::new(), req))
        .await?;
    Ok(Json(reply))
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics_handler(State(metrics): State<Metrics>) -> Response {
    match metrics.gather() {
        Ok(body) => body.into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// An endpoint fault. Business errors never get here; they are in the reply.
struct AppError(EndpointError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("API error: {}", self.0);
        let status = match self.0 {
            EndpointError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.0.to_string()).into_response()
    }
}

impl From<EndpointError> for AppError {
    fn from(err: EndpointError) -> Self {
        Self(err)
    }
}
