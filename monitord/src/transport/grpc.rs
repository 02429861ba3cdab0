//! gRPC transport: `iotmonitor.Monitor` served from, and proxied into, an
//! [`Endpoints`] set.

use super::pb;
use super::pb::monitor_client::MonitorClient;
use super::pb::monitor_server::{Monitor, MonitorServer};
use crate::endpoints::{
    Call, Endpoint, Endpoints, RegisterReply, RegisterRequest, TelemetryReply, TelemetryRequest,
    UpdateReply, UpdateRequest,
};
use crate::errors::{self, EndpointError};
use crate::model::{DeviceType, Location};
use crate::service::CallContext;
use std::future::Future;
use tonic::transport::Channel;
use tonic::{Request, Response, Status};
use tower::service_fn;
use tracing::{debug, info};

impl From<DeviceType> for pb::DeviceType {
    fn from(value: DeviceType) -> Self {
        match value {
            DeviceType::Drone => pb::DeviceType::Drone,
            DeviceType::Sensor => pb::DeviceType::Sensor,
        }
    }
}

impl From<pb::DeviceType> for DeviceType {
    fn from(value: pb::DeviceType) -> Self {
        match value {
            pb::DeviceType::Drone => DeviceType::Drone,
            pb::DeviceType::Sensor => DeviceType::Sensor,
        }
    }
}

impl From<pb::Location> for Location {
    fn from(value: pb::Location) -> Self {
        Location {
            latitude: value.latitude,
            longitude: value.longitude,
            altitude: value.altitude,
        }
    }
}

impl From<Location> for pb::Location {
    fn from(value: Location) -> Self {
        pb::Location {
            latitude: value.latitude,
            longitude: value.longitude,
            altitude: value.altitude,
        }
    }
}

pub fn encode_register_request(
    req: RegisterRequest,
) -> Result<pb::RegisterDeviceRequest, EndpointError> {
    let device_type: DeviceType = req.device_type.parse().map_err(EndpointError::Encode)?;
    Ok(pb::RegisterDeviceRequest {
        name: req.name,
        owner: req.owner,
        device_type: pb::DeviceType::from(device_type).into(),
        serial_number: req.serial_number,
    })
}

pub fn decode_register_request(
    req: pb::RegisterDeviceRequest,
) -> Result<RegisterRequest, EndpointError> {
    let device_type = pb::DeviceType::try_from(req.device_type)
        .map_err(|_| EndpointError::Decode(format!("unknown device type {}", req.device_type)))?;
    Ok(RegisterRequest {
        name: req.name,
        serial_number: req.serial_number,
        owner: req.owner,
        device_type: DeviceType::from(device_type).to_string(),
    })
}

pub fn encode_register_reply(reply: RegisterReply) -> pb::RegisterDeviceReply {
    pb::RegisterDeviceReply {
        registered: reply.registered,
        device_id: reply.device_id,
        err: reply.err,
    }
}

pub fn decode_register_reply(reply: pb::RegisterDeviceReply) -> RegisterReply {
    RegisterReply {
        registered: reply.registered,
        device_id: reply.device_id,
        err: reply.err,
    }
}

pub fn encode_update_request(req: UpdateRequest) -> pb::StatusUpdateRequest {
    pb::StatusUpdateRequest {
        device_id: req.device_id,
        location: Some(req.location.into()),
        battery_remaining: req.battery_remaining,
    }
}

pub fn decode_update_request(
    req: pb::StatusUpdateRequest,
) -> Result<UpdateRequest, EndpointError> {
    let location = req
        .location
        .ok_or_else(|| EndpointError::Decode("status update without location".to_string()))?;
    Ok(UpdateRequest {
        device_id: req.device_id,
        location: location.into(),
        battery_remaining: req.battery_remaining,
    })
}

pub fn encode_update_reply(reply: UpdateReply) -> pb::StatusUpdateReply {
    pb::StatusUpdateReply {
        acknowledged: reply.acknowledged,
        err: reply.err,
    }
}

pub fn decode_update_reply(reply: pb::StatusUpdateReply) -> UpdateReply {
    UpdateReply {
        acknowledged: reply.acknowledged,
        err: reply.err,
    }
}

pub fn encode_telemetry_request(req: TelemetryRequest) -> pb::TelemetrySubmitRequest {
    pb::TelemetrySubmitRequest {
        device_id: req.device_id,
        readings: req.readings,
    }
}

pub fn decode_telemetry_request(req: pb::TelemetrySubmitRequest) -> TelemetryRequest {
    TelemetryRequest {
        device_id: req.device_id,
        readings: req.readings,
    }
}

pub fn encode_telemetry_reply(reply: TelemetryReply) -> pb::TelemetrySubmitReply {
    pb::TelemetrySubmitReply {
        acknowledged: reply.acknowledged,
        err: reply.err,
    }
}

pub fn decode_telemetry_reply(reply: pb::TelemetrySubmitReply) -> TelemetryReply {
    TelemetryReply {
        acknowledged: reply.acknowledged,
        err: reply.err,
    }
}

fn status_from(err: EndpointError) -> Status {
    let message = err.to_string();
    match err {
        EndpointError::Cancelled => Status::cancelled(message),
        EndpointError::Decode(_) => Status::invalid_argument(message),
        EndpointError::Encode(_) => Status::internal(message),
        EndpointError::Transport(status) => status,
    }
}

/// Server side of the gRPC transport.
#[derive(Clone)]
pub struct GrpcServer {
    endpoints: Endpoints,
}

impl GrpcServer {
    pub fn new(endpoints: Endpoints) -> Self {
        Self { endpoints }
    }

    pub fn into_service(self) -> MonitorServer<Self> {
        MonitorServer::new(self)
    }
}

#[tonic::async_trait]
impl Monitor for GrpcServer {
    async fn register_device(
        &self,
        request: Request<pb::RegisterDeviceRequest>,
    ) -> Result<Response<pb::RegisterDeviceReply>, Status> {
        let req = decode_register_request(request.into_inner()).map_err(status_from)?;
        debug!("gRPC register device name {}, type {}", req.name, req.device_type);

        let reply = self
            .endpoints
            .register(Call::new(CallContext::new(), req))
            .await
            .map_err(status_from)?;
        Ok(Response::new(encode_register_reply(reply)))
    }

    async fn update_device_status(
        &self,
        request: Request<pb::StatusUpdateRequest>,
    ) -> Result<Response<pb::StatusUpdateReply>, Status> {
        let req = decode_update_request(request.into_inner()).map_err(status_from)?;

        let reply = self
            .endpoints
            .update(Call::new(CallContext::new(), req))
            .await
            .map_err(status_from)?;
        Ok(Response::new(encode_update_reply(reply)))
    }

    async fn submit_telemetry(
        &self,
        request: Request<pb::TelemetrySubmitRequest>,
    ) -> Result<Response<pb::TelemetrySubmitReply>, Status> {
        let req = decode_telemetry_request(request.into_inner());

        let reply = self
            .endpoints
            .telemetry(Call::new(CallContext::new(), req))
            .await
            .map_err(status_from)?;
        Ok(Response::new(encode_telemetry_reply(reply)))
    }
}

/// Awaits a unary call unless `ctx` is cancelled first.
async fn unary<T, F>(ctx: &CallContext, fut: F) -> Result<T, EndpointError>
where
    F: Future<Output = Result<Response<T>, Status>>,
{
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(EndpointError::Cancelled),
        result = fut => Ok(result?.into_inner()),
    }
}

/// Builds an [`Endpoints`] set whose calls go to a remote monitor.
pub fn client_endpoints(channel: Channel) -> Endpoints {
    let client = MonitorClient::new(channel);

    let register = {
        let client = client.clone();
        Endpoint::new(service_fn(move |call: Call<RegisterRequest>| {
            let mut client = client.clone();
            async move {
                let request = encode_register_request(call.request)?;
                let reply = unary(&call.ctx, client.register_device(request)).await?;
                Ok(decode_register_reply(reply))
            }
        }))
    };

    let update = {
        let client = client.clone();
        Endpoint::new(service_fn(move |call: Call<UpdateRequest>| {
            let mut client = client.clone();
            async move {
                let request = encode_update_request(call.request);
                let reply = unary(&call.ctx, client.update_device_status(request)).await?;
                Ok(decode_update_reply(reply))
            }
        }))
    };

    let telemetry = Endpoint::new(service_fn(move |call: Call<TelemetryRequest>| {
        let mut client = client.clone();
        async move {
            let request = encode_telemetry_request(call.request);
            let reply = unary(&call.ctx, client.submit_telemetry(request)).await?;
            Ok(decode_telemetry_reply(reply))
        }
    }));

    Endpoints {
        register,
        update,
        telemetry,
    }
}

/// Connects to a monitor at `addr` (e.g. `http://localhost:8081`).
pub async fn connect(addr: &str) -> errors::Result<Endpoints> {
    let channel = Channel::from_shared(addr.to_string())
        .map_err(|e| errors::Error::Config(format!("invalid monitor address {addr}: {e}")))?
        .connect()
        .await?;
    info!("Connected to monitor at {}", addr);
    Ok(client_endpoints(channel))
}
