//! Uniform request-in/reply-out invocables over a [`MonitorService`].
//!
//! Business failures never surface as an endpoint error: they are folded into
//! the reply's `err` field so every transport encodes them identically. An
//! [`EndpointError`] is reserved for calls that fail outside the business
//! logic, such as a context cancelled before dispatch or a remote transport
//! fault.

pub mod shapes;
pub mod timing;

pub use shapes::{
    Failer, RegisterReply, RegisterRequest, TelemetryReply, TelemetryRequest, UpdateReply,
    UpdateRequest,
};

use crate::errors::{EndpointError, ServiceError};
use crate::model::Location;
use crate::service::{CallContext, MonitorService};
use prometheus::HistogramVec;
use std::collections::HashMap;
use std::sync::Arc;
use tower::util::BoxCloneSyncService;
use tower::{service_fn, Layer, ServiceExt};

/// A request value paired with the context it is invoked under.
#[derive(Debug, Clone)]
pub struct Call<R> {
    pub ctx: CallContext,
    pub request: R,
}

impl<R> Call<R> {
    pub fn new(ctx: CallContext, request: R) -> Self {
        Self { ctx, request }
    }
}

pub type Endpoint<Req, Resp> = BoxCloneSyncService<Call<Req>, Resp, EndpointError>;

pub fn make_register_endpoint<S>(svc: Arc<S>) -> Endpoint<RegisterRequest, RegisterReply>
where
    S: MonitorService + ?Sized + 'static,
{
    Endpoint::new(service_fn(move |call: Call<RegisterRequest>| {
        let svc = svc.clone();
        async move {
            if call.ctx.is_cancelled() {
                return Err(EndpointError::Cancelled);
            }
            let req = &call.request;
            let reply = match svc
                .register_device(&call.ctx, &req.name, &req.owner, &req.device_type)
                .await
            {
                Ok(id) => RegisterReply::registered(id),
                Err(e) => RegisterReply::failure(e),
            };
            Ok(reply)
        }
    }))
}

pub fn make_update_endpoint<S>(svc: Arc<S>) -> Endpoint<UpdateRequest, UpdateReply>
where
    S: MonitorService + ?Sized + 'static,
{
    Endpoint::new(service_fn(move |call: Call<UpdateRequest>| {
        let svc = svc.clone();
        async move {
            if call.ctx.is_cancelled() {
                return Err(EndpointError::Cancelled);
            }
            let req = &call.request;
            let reply = match svc
                .update_status(&call.ctx, req.device_id, req.location, req.battery_remaining)
                .await
            {
                Ok(ack) => UpdateReply::acknowledged(ack),
                Err(e) => UpdateReply::failure(e),
            };
            Ok(reply)
        }
    }))
}

pub fn make_telemetry_endpoint<S>(svc: Arc<S>) -> Endpoint<TelemetryRequest, TelemetryReply>
where
    S: MonitorService + ?Sized + 'static,
{
    Endpoint::new(service_fn(move |call: Call<TelemetryRequest>| {
        let svc = svc.clone();
        async move {
            if call.ctx.is_cancelled() {
                return Err(EndpointError::Cancelled);
            }
            let Call { ctx, request } = call;
            let reply = match svc
                .submit_telemetry(&ctx, request.device_id, request.readings)
                .await
            {
                Ok(ack) => TelemetryReply::acknowledged(ack),
                Err(e) => TelemetryReply::failure(e),
            };
            Ok(reply)
        }
    }))
}

/// The three endpoints of the monitor.
///
/// On the server side transports dispatch into it; on the client side it is
/// itself a [`MonitorService`] proxying to whatever the endpoints reach.
#[derive(Clone)]
pub struct Endpoints {
    pub register: Endpoint<RegisterRequest, RegisterReply>,
    pub update: Endpoint<UpdateRequest, UpdateReply>,
    pub telemetry: Endpoint<TelemetryRequest, TelemetryReply>,
}

impl Endpoints {
    pub fn new<S>(svc: Arc<S>) -> Self
    where
        S: MonitorService + ?Sized + 'static,
    {
        Self {
            register: make_register_endpoint(svc.clone()),
            update: make_update_endpoint(svc.clone()),
            telemetry: make_telemetry_endpoint(svc),
        }
    }

    /// Wraps every endpoint in [`timing::InstrumentingLayer`], labelled
    /// `register`, `update` and `telemetry`.
    pub fn instrumented(self, duration: &HistogramVec) -> Self {
        Self {
            register: Endpoint::new(
                timing::InstrumentingLayer::new("register", duration.clone()).layer(self.register),
            ),
            update: Endpoint::new(
                timing::InstrumentingLayer::new("update", duration.clone()).layer(self.update),
            ),
            telemetry: Endpoint::new(
                timing::InstrumentingLayer::new("telemetry", duration.clone())
                    .layer(self.telemetry),
            ),
        }
    }

    pub async fn register(
        &self,
        call: Call<RegisterRequest>,
    ) -> Result<RegisterReply, EndpointError> {
        self.register.clone().oneshot(call).await
    }

    pub async fn update(&self, call: Call<UpdateRequest>) -> Result<UpdateReply, EndpointError> {
        self.update.clone().oneshot(call).await
    }

    pub async fn telemetry(
        &self,
        call: Call<TelemetryRequest>,
    ) -> Result<TelemetryReply, EndpointError> {
        self.telemetry.clone().oneshot(call).await
    }
}

fn remote_error(err: &str) -> ServiceError {
    ServiceError::Remote(err.to_string())
}

#[async_trait::async_trait]
impl MonitorService for Endpoints {
    async fn register_device(
        &self,
        ctx: &CallContext,
        name: &str,
        owner: &str,
        device_type: &str,
    ) -> Result<u64, ServiceError> {
        let request = RegisterRequest {
            name: name.to_string(),
            serial_number: String::new(),
            owner: owner.to_string(),
            device_type: device_type.to_string(),
        };
        let reply = self.register(Call::new(ctx.clone(), request)).await?;
        if let Some(err) = reply.failed() {
            return Err(remote_error(err));
        }
        Ok(reply.device_id)
    }

    async fn update_status(
        &self,
        ctx: &CallContext,
        device_id: u64,
        location: Location,
        battery: u32,
    ) -> Result<bool, ServiceError> {
        let request = UpdateRequest {
            device_id,
            location,
            battery_remaining: battery,
        };
        let reply = self.update(Call::new(ctx.clone(), request)).await?;
        if let Some(err) = reply.failed() {
            return Err(remote_error(err));
        }
        Ok(reply.acknowledged)
    }

    async fn submit_telemetry(
        &self,
        ctx: &CallContext,
        device_id: u64,
        readings: HashMap<String, f32>,
    ) -> Result<bool, ServiceError> {
        let request = TelemetryRequest {
            device_id,
            readings,
        };
        let reply = self.telemetry(Call::new(ctx.clone(), request)).await?;
        if let Some(err) = reply.failed() {
            return Err(remote_error(err));
        }
        Ok(reply.acknowledged)
    }
}
